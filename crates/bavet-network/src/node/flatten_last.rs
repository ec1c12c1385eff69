//! Flatten-last node: expands the last fact of a tuple into many tuples.
//!
//! Output tuples keep every fact of the input except the last, which is
//! replaced by one item of the expansion. On update, existing outputs are
//! matched to the new items by reference identity (`Arc::ptr_eq`), never by
//! value: two equal items are still two distinct outputs.

use std::sync::Arc;

use bavet_core::{BavetError, Result, Score};

use super::{double_insert, unexpected_store};
use crate::fact::{Fact, Facts, FlattenFn};
use crate::guard;
use crate::lifecycle::{InputSide, Node, NodeContext, Propagation, Propagator, TupleLifecycle};
use crate::queue::PropagationQueue;
use crate::tuple::{Store, StoreIndex, TupleArena, TupleId};

pub struct FlattenLastNode<V: Fact> {
    label: String,
    flatten: FlattenFn<V>,
    input_store: StoreIndex,
    queue: PropagationQueue,
    out_store_size: usize,
}

impl<V: Fact> FlattenLastNode<V> {
    pub fn new(
        label: impl Into<String>,
        flatten: FlattenFn<V>,
        input_store: StoreIndex,
        out_store_size: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            label: label.into(),
            flatten,
            input_store,
            queue: PropagationQueue::with_capacity(queue_capacity),
            out_store_size,
        }
    }

    /// Returns the facts before the last one and the expanded items.
    fn expand(&self, id: TupleId, tuples: &TupleArena<V>) -> Result<(Facts<V>, Vec<Arc<V>>)> {
        let facts: &[Arc<V>] = tuples.get(id)?.facts();
        let (last, prefix) = facts.split_last().ok_or_else(|| {
            BavetError::impossible(format!("node ({}) received an empty tuple", self.label))
        })?;
        let items = guard::call(&self.label, facts, || (self.flatten)(last))?;
        Ok((prefix.iter().cloned().collect(), items))
    }

    fn create_out(&mut self, prefix: &Facts<V>, item: Arc<V>, tuples: &mut TupleArena<V>) -> Result<TupleId> {
        let mut facts = prefix.clone();
        facts.push(item);
        let out = tuples.alloc(facts, self.out_store_size);
        self.queue.insert(tuples, out)?;
        Ok(out)
    }
}

impl<V: Fact, Sc: Score> TupleLifecycle<V, Sc> for FlattenLastNode<V> {
    fn insert(&mut self, _: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        if !ctx.tuples.get(tuple)?.store(self.input_store).is_empty() {
            return Err(double_insert(&self.label, tuple));
        }
        let (prefix, items) = self.expand(tuple, ctx.tuples)?;
        let mut outs = Vec::with_capacity(items.len());
        for item in items {
            outs.push(self.create_out(&prefix, item, ctx.tuples)?);
        }
        ctx.tuples
            .get_mut(tuple)?
            .set_store(self.input_store, Store::Tuples(outs));
        Ok(())
    }

    fn update(&mut self, side: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        let previous = match ctx.tuples.get_mut(tuple)?.take_store(self.input_store) {
            Store::Empty => return self.insert(side, tuple, ctx),
            Store::Tuples(outs) => outs,
            other => return Err(unexpected_store(&self.label, tuple, &other)),
        };
        let (prefix, mut remaining) = self.expand(tuple, ctx.tuples)?;
        if remaining.is_empty() {
            for out in previous {
                self.queue.retract(ctx.tuples, out)?;
            }
            return Ok(());
        }

        let mut kept = Vec::with_capacity(remaining.len());
        for out in previous {
            let out_tuple = ctx.tuples.get_mut(out)?;
            let item = match out_tuple.facts().last() {
                Some(item) => Arc::clone(item),
                None => return Err(BavetError::impossible(format!(
                    "node ({}) produced an empty tuple {:?}",
                    self.label, out
                ))),
            };
            match remaining.iter().position(|candidate| Arc::ptr_eq(candidate, &item)) {
                Some(pos) => {
                    // Claim this instance so an identical duplicate maps to its own output.
                    remaining.remove(pos);
                    let mut facts = prefix.clone();
                    facts.push(item);
                    out_tuple.set_facts(facts);
                    self.queue.update(ctx.tuples, out)?;
                    kept.push(out);
                }
                None => self.queue.retract(ctx.tuples, out)?,
            }
        }
        for item in remaining {
            kept.push(self.create_out(&prefix, item, ctx.tuples)?);
        }
        ctx.tuples
            .get_mut(tuple)?
            .set_store(self.input_store, Store::Tuples(kept));
        Ok(())
    }

    fn retract(&mut self, _: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        match ctx.tuples.get_mut(tuple)?.take_store(self.input_store) {
            Store::Empty => Ok(()),
            Store::Tuples(outs) => {
                for out in outs {
                    self.queue.retract(ctx.tuples, out)?;
                }
                Ok(())
            }
            other => Err(unexpected_store(&self.label, tuple, &other)),
        }
    }
}

impl<V: Fact, Sc: Score> Propagator<V, Sc> for FlattenLastNode<V> {
    fn propagate(&mut self, ctx: &mut NodeContext<'_, V, Sc>, out: &mut Vec<Propagation>) -> Result<()> {
        self.queue.propagate(ctx.tuples, |_, _| Ok(true), out)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<V: Fact, Sc: Score> Node<V, Sc> for FlattenLastNode<V> {
    fn label(&self) -> &str {
        &self.label
    }
}
