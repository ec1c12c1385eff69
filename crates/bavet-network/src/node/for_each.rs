//! Source node: turns external facts into single-fact tuples.

use std::collections::HashMap;
use std::sync::Arc;

use bavet_core::{BavetError, Result, Score};
use smallvec::smallvec;

use crate::fact::{ClassPredicate, Fact, FactHandle};
use crate::guard;
use crate::lifecycle::{InputSide, Node, NodeContext, Propagation, Propagator, TupleLifecycle};
use crate::queue::PropagationQueue;
use crate::tuple::{TupleArena, TupleId};

/// Emits one tuple per accepted fact.
pub struct ForEachNode<V: Fact> {
    label: String,
    accepts: ClassPredicate<V>,
    tuples_by_handle: HashMap<FactHandle, TupleId>,
    queue: PropagationQueue,
    out_store_size: usize,
}

impl<V: Fact> ForEachNode<V> {
    pub fn new(
        label: impl Into<String>,
        accepts: ClassPredicate<V>,
        out_store_size: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            label: label.into(),
            accepts,
            tuples_by_handle: HashMap::new(),
            queue: PropagationQueue::with_capacity(queue_capacity),
            out_store_size,
        }
    }

    /// Evaluates the class predicate.
    pub fn accepts(&self, fact: &V) -> Result<bool> {
        guard::call_on_fact(&self.label, fact, || (self.accepts)(fact))
    }

    pub fn contains(&self, handle: FactHandle) -> bool {
        self.tuples_by_handle.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.tuples_by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples_by_handle.is_empty()
    }

    pub fn insert_fact(
        &mut self,
        handle: FactHandle,
        fact: Arc<V>,
        tuples: &mut TupleArena<V>,
    ) -> Result<()> {
        if self.tuples_by_handle.contains_key(&handle) {
            return Err(BavetError::impossible(format!(
                "fact {} was already inserted into source ({})",
                handle.id(),
                self.label
            )));
        }
        let id = tuples.alloc(smallvec![fact], self.out_store_size);
        self.queue.insert(tuples, id)?;
        self.tuples_by_handle.insert(handle, id);
        Ok(())
    }

    pub fn update_fact(
        &mut self,
        handle: FactHandle,
        fact: Arc<V>,
        tuples: &mut TupleArena<V>,
    ) -> Result<()> {
        let id = *self
            .tuples_by_handle
            .get(&handle)
            .ok_or(BavetError::UnknownFact(handle.id()))?;
        tuples.get_mut(id)?.set_facts(smallvec![fact]);
        self.queue.update(tuples, id)
    }

    /// Retracts the tuple of `handle`; a fact this source never accepted is ignored.
    pub fn retract_fact(&mut self, handle: FactHandle, tuples: &mut TupleArena<V>) -> Result<()> {
        match self.tuples_by_handle.remove(&handle) {
            Some(id) => self.queue.retract(tuples, id),
            None => Ok(()),
        }
    }
}

impl<V: Fact, Sc: Score> TupleLifecycle<V, Sc> for ForEachNode<V> {
    fn insert(&mut self, _: InputSide, tuple: TupleId, _: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        Err(no_parent(&self.label, tuple))
    }

    fn update(&mut self, _: InputSide, tuple: TupleId, _: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        Err(no_parent(&self.label, tuple))
    }

    fn retract(&mut self, _: InputSide, tuple: TupleId, _: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        Err(no_parent(&self.label, tuple))
    }
}

fn no_parent(label: &str, tuple: TupleId) -> BavetError {
    BavetError::impossible(format!(
        "source ({}) has no parent but received tuple {:?}",
        label, tuple
    ))
}

impl<V: Fact, Sc: Score> Propagator<V, Sc> for ForEachNode<V> {
    fn propagate(&mut self, ctx: &mut NodeContext<'_, V, Sc>, out: &mut Vec<Propagation>) -> Result<()> {
        self.queue.propagate(ctx.tuples, |_, _| Ok(true), out)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<V: Fact, Sc: Score> Node<V, Sc> for ForEachNode<V> {
    fn label(&self) -> &str {
        &self.label
    }

    fn as_source_mut(&mut self) -> Option<&mut ForEachNode<V>> {
        Some(self)
    }

    fn as_source(&self) -> Option<&ForEachNode<V>> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::testing::Harness;
    use crate::tuple::TupleState;

    fn evens() -> ForEachNode<i64> {
        ForEachNode::new("forEach(even)", Arc::new(|v: &i64| v % 2 == 0), 1, 4)
    }

    #[test]
    fn test_insert_update_retract_cycle() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = evens();
        let handle = FactHandle(1);

        node.insert_fact(handle, Arc::new(2), &mut h.tuples).unwrap();
        let inserted = h.flush(&mut node);
        assert_eq!(inserted.len(), 1);
        let id = inserted[0].tuple();
        assert_eq!(h.tuples.state(id).unwrap(), TupleState::Ok);

        node.update_fact(handle, Arc::new(4), &mut h.tuples).unwrap();
        assert_eq!(h.flush(&mut node), vec![Propagation::Update(id)]);
        assert_eq!(*h.tuples.get(id).unwrap().facts()[0], 4);

        node.retract_fact(handle, &mut h.tuples).unwrap();
        assert_eq!(h.flush(&mut node), vec![Propagation::Retract(id)]);
        assert!(!node.contains(handle));
    }

    #[test]
    fn test_double_insert_is_rejected() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = evens();
        node.insert_fact(FactHandle(1), Arc::new(2), &mut h.tuples)
            .unwrap();
        assert!(node
            .insert_fact(FactHandle(1), Arc::new(2), &mut h.tuples)
            .is_err());
    }

    #[test]
    fn test_accepts_is_guarded() {
        let node: ForEachNode<i64> =
            ForEachNode::new("forEach(bad)", Arc::new(|_: &i64| -> bool { panic!("no") }), 0, 0);
        let err = node.accepts(&3).unwrap_err();
        assert!(err.to_string().contains("forEach(bad) on fact 3"));
    }
}
