//! Map node: one output tuple per input, facts computed by mapping functions.

use std::sync::Arc;

use bavet_core::{Result, Score};

use super::{double_insert, unexpected_store};
use crate::fact::{Fact, Facts, TupleMapper};
use crate::guard;
use crate::lifecycle::{InputSide, Node, NodeContext, Propagation, Propagator, TupleLifecycle};
use crate::queue::PropagationQueue;
use crate::tuple::{Store, StoreIndex, TupleArena, TupleId};

pub struct MapNode<V: Fact> {
    label: String,
    mappers: Vec<TupleMapper<V>>,
    input_store: StoreIndex,
    queue: PropagationQueue,
    out_store_size: usize,
}

impl<V: Fact> MapNode<V> {
    pub fn new(
        label: impl Into<String>,
        mappers: Vec<TupleMapper<V>>,
        input_store: StoreIndex,
        out_store_size: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            label: label.into(),
            mappers,
            input_store,
            queue: PropagationQueue::with_capacity(queue_capacity),
            out_store_size,
        }
    }

    fn map(&self, id: TupleId, tuples: &TupleArena<V>) -> Result<Facts<V>> {
        let facts: &[Arc<V>] = tuples.get(id)?.facts();
        guard::call(&self.label, facts, || {
            self.mappers.iter().map(|m| Arc::new(m(facts))).collect()
        })
    }
}

impl<V: Fact, Sc: Score> TupleLifecycle<V, Sc> for MapNode<V> {
    fn insert(&mut self, _: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        if !ctx.tuples.get(tuple)?.store(self.input_store).is_empty() {
            return Err(double_insert(&self.label, tuple));
        }
        let facts = self.map(tuple, ctx.tuples)?;
        let out = ctx.tuples.alloc(facts, self.out_store_size);
        self.queue.insert(ctx.tuples, out)?;
        ctx.tuples
            .get_mut(tuple)?
            .set_store(self.input_store, Store::Tuple(out));
        Ok(())
    }

    fn update(&mut self, side: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        let out = match ctx.tuples.get(tuple)?.store(self.input_store) {
            Store::Empty => return self.insert(side, tuple, ctx),
            Store::Tuple(out) => *out,
            other => return Err(unexpected_store(&self.label, tuple, other)),
        };
        let facts = self.map(tuple, ctx.tuples)?;
        // Mapped values that did not change stop the propagation here.
        if ctx.tuples.get_mut(out)?.refresh_facts(facts) {
            self.queue.update(ctx.tuples, out)?;
        }
        Ok(())
    }

    fn retract(&mut self, _: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        match ctx.tuples.get_mut(tuple)?.take_store(self.input_store) {
            Store::Empty => Ok(()),
            Store::Tuple(out) => self.queue.retract(ctx.tuples, out),
            other => Err(unexpected_store(&self.label, tuple, &other)),
        }
    }
}

impl<V: Fact, Sc: Score> Propagator<V, Sc> for MapNode<V> {
    fn propagate(&mut self, ctx: &mut NodeContext<'_, V, Sc>, out: &mut Vec<Propagation>) -> Result<()> {
        self.queue.propagate(ctx.tuples, |_, _| Ok(true), out)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<V: Fact, Sc: Score> Node<V, Sc> for MapNode<V> {
    fn label(&self) -> &str {
        &self.label
    }
}
