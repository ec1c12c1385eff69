//! Concat node: the union of two streams of equal arity.

use bavet_core::{Result, Score};

use super::{double_insert, side_index, unexpected_store};
use crate::fact::Fact;
use crate::lifecycle::{InputSide, Node, NodeContext, Propagation, Propagator, TupleLifecycle};
use crate::queue::PropagationQueue;
use crate::tuple::{Store, StoreIndex, TupleId};

/// Re-emits every tuple of either parent as its own output tuple.
pub struct ConcatNode {
    label: String,
    input_stores: [StoreIndex; 2],
    queue: PropagationQueue,
    out_store_size: usize,
}

impl ConcatNode {
    pub fn new(
        label: impl Into<String>,
        input_stores: [StoreIndex; 2],
        out_store_size: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            label: label.into(),
            input_stores,
            queue: PropagationQueue::with_capacity(queue_capacity),
            out_store_size,
        }
    }
}

impl<V: Fact, Sc: Score> TupleLifecycle<V, Sc> for ConcatNode {
    fn insert(&mut self, side: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        let store = self.input_stores[side_index(&self.label, side)?];
        let parent = ctx.tuples.get(tuple)?;
        if !parent.store(store).is_empty() {
            return Err(double_insert(&self.label, tuple));
        }
        let facts = parent.facts().clone();
        let out = ctx.tuples.alloc(facts, self.out_store_size);
        self.queue.insert(ctx.tuples, out)?;
        ctx.tuples.get_mut(tuple)?.set_store(store, Store::Tuple(out));
        Ok(())
    }

    fn update(&mut self, side: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        let store = self.input_stores[side_index(&self.label, side)?];
        let parent = ctx.tuples.get(tuple)?;
        let out = match parent.store(store) {
            Store::Empty => return self.insert(side, tuple, ctx),
            Store::Tuple(out) => *out,
            other => return Err(unexpected_store(&self.label, tuple, other)),
        };
        let facts = parent.facts().clone();
        ctx.tuples.get_mut(out)?.set_facts(facts);
        self.queue.update(ctx.tuples, out)
    }

    fn retract(&mut self, side: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        let store = self.input_stores[side_index(&self.label, side)?];
        match ctx.tuples.get_mut(tuple)?.take_store(store) {
            Store::Empty => Ok(()),
            Store::Tuple(out) => self.queue.retract(ctx.tuples, out),
            other => Err(unexpected_store(&self.label, tuple, &other)),
        }
    }
}

impl<V: Fact, Sc: Score> Propagator<V, Sc> for ConcatNode {
    fn propagate(&mut self, ctx: &mut NodeContext<'_, V, Sc>, out: &mut Vec<Propagation>) -> Result<()> {
        self.queue.propagate(ctx.tuples, |_, _| Ok(true), out)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<V: Fact, Sc: Score> Node<V, Sc> for ConcatNode {
    fn label(&self) -> &str {
        &self.label
    }
}
