//! If-exists node: passes a left tuple on while matching right tuples exist
//! (or, for if-not-exists, while none do).
//!
//! Matches are kept in both directions so that a change on either side only
//! touches the left tuples it actually affects.

use std::collections::HashMap;
use std::sync::Arc;

use bavet_core::{Result, Score};
use indexmap::IndexSet;

use super::{double_insert, side_index, unexpected_store, LEFT, RIGHT};
use crate::fact::Fact;
use crate::guard;
use crate::index::{IndexKey, IndexedSide, Indexer};
use crate::joiner::Joiners;
use crate::lifecycle::{InputSide, Node, NodeContext, Propagation, Propagator, TupleLifecycle};
use crate::queue::PropagationQueue;
use crate::tuple::{Store, StoreIndex, TupleArena, TupleId};

pub struct IfExistsNode<V: Fact> {
    label: String,
    should_exist: bool,
    joiners: Joiners<V>,
    indexers: [Indexer<V>; 2],
    key_stores: [StoreIndex; 2],
    /// Slot on left tuples holding the output tuple.
    out_store: StoreIndex,
    /// `matches[LEFT][l]` holds the rights matching `l`, and the reverse.
    matches: [HashMap<TupleId, IndexSet<TupleId>>; 2],
    queue: PropagationQueue,
    out_store_size: usize,
}

impl<V: Fact> IfExistsNode<V> {
    pub fn new(
        label: impl Into<String>,
        should_exist: bool,
        joiners: Joiners<V>,
        key_stores: [StoreIndex; 2],
        out_store: StoreIndex,
        out_store_size: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            label: label.into(),
            should_exist,
            indexers: [
                Indexer::for_joiners(&joiners, IndexedSide::Left),
                Indexer::for_joiners(&joiners, IndexedSide::Right),
            ],
            joiners,
            key_stores,
            out_store,
            matches: [HashMap::new(), HashMap::new()],
            queue: PropagationQueue::with_capacity(queue_capacity),
            out_store_size,
        }
    }

    /// Number of right tuples currently matching `left`.
    pub fn match_count(&self, left: TupleId) -> usize {
        self.matches[LEFT].get(&left).map_or(0, IndexSet::len)
    }

    fn key_of(&self, side: usize, tuple: TupleId, tuples: &TupleArena<V>) -> Result<IndexKey<V>> {
        let facts: &[Arc<V>] = tuples.get(tuple)?.facts();
        guard::call(&self.label, facts, || {
            if side == LEFT {
                self.joiners.left_key(facts)
            } else {
                self.joiners.right_key(facts)
            }
        })
    }

    /// Partners of `tuple` under `key` that pass the filters.
    fn partners(&self, side: usize, tuple: TupleId, key: &IndexKey<V>, tuples: &TupleArena<V>) -> Result<IndexSet<TupleId>> {
        let candidates = self.indexers[1 - side].matches(key);
        if !self.joiners.has_filters() {
            return Ok(candidates.into_iter().collect());
        }
        let mut passing = IndexSet::with_capacity(candidates.len());
        for other in candidates {
            let (left, right) = if side == LEFT { (tuple, other) } else { (other, tuple) };
            let l: &[Arc<V>] = tuples.get(left)?.facts();
            let r: &[Arc<V>] = tuples.get(right)?.facts();
            if guard::call_pair(&self.label, l, r, || self.joiners.test(l, r))? {
                passing.insert(other);
            }
        }
        Ok(passing)
    }

    fn link(&mut self, side: usize, tuple: TupleId, other: TupleId) {
        self.matches[side].entry(tuple).or_default().insert(other);
        self.matches[1 - side].entry(other).or_default().insert(tuple);
    }

    fn unlink(&mut self, side: usize, tuple: TupleId, other: TupleId) {
        for (map, from, to) in [(side, tuple, other), (1 - side, other, tuple)] {
            if let Some(set) = self.matches[map].get_mut(&from) {
                set.swap_remove(&to);
            }
        }
    }

    /// Brings the output of `left` in line with its match count.
    fn reconcile(&mut self, left: TupleId, refresh: bool, tuples: &mut TupleArena<V>) -> Result<()> {
        let wanted = (self.match_count(left) > 0) == self.should_exist;
        let current = match tuples.get(left)?.store(self.out_store) {
            Store::Empty => None,
            Store::Tuple(out) => Some(*out),
            other => return Err(unexpected_store(&self.label, left, other)),
        };
        match (wanted, current) {
            (true, None) => {
                let facts = tuples.get(left)?.facts().clone();
                let out = tuples.alloc(facts, self.out_store_size);
                self.queue.insert(tuples, out)?;
                tuples
                    .get_mut(left)?
                    .set_store(self.out_store, Store::Tuple(out));
            }
            (false, Some(out)) => {
                tuples.get_mut(left)?.take_store(self.out_store);
                self.queue.retract(tuples, out)?;
            }
            (true, Some(out)) if refresh => {
                let facts = tuples.get(left)?.facts().clone();
                tuples.get_mut(out)?.set_facts(facts);
                self.queue.update(tuples, out)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn insert_side(&mut self, side: usize, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        if !tuples.get(tuple)?.store(self.key_stores[side]).is_empty() {
            return Err(double_insert(&self.label, tuple));
        }
        let key = self.key_of(side, tuple, tuples)?;
        let partners = self.partners(side, tuple, &key, tuples)?;
        self.indexers[side].put(key.clone(), tuple)?;
        tuples
            .get_mut(tuple)?
            .set_store(self.key_stores[side], Store::Key(key));
        self.matches[side].insert(tuple, IndexSet::with_capacity(partners.len()));
        for &other in &partners {
            self.link(side, tuple, other);
        }

        if side == LEFT {
            self.reconcile(tuple, false, tuples)
        } else {
            for left in partners {
                self.reconcile(left, false, tuples)?;
            }
            Ok(())
        }
    }

    fn retract_side(&mut self, side: usize, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let key = match tuples.get_mut(tuple)?.take_store(self.key_stores[side]) {
            Store::Empty => return Ok(()),
            Store::Key(key) => key,
            other => return Err(unexpected_store(&self.label, tuple, &other)),
        };
        self.indexers[side].remove(&key, tuple)?;
        let partners = self.matches[side].remove(&tuple).unwrap_or_default();
        for other in &partners {
            if let Some(set) = self.matches[1 - side].get_mut(other) {
                set.swap_remove(&tuple);
            }
        }

        if side == LEFT {
            match tuples.get_mut(tuple)?.take_store(self.out_store) {
                Store::Empty => Ok(()),
                Store::Tuple(out) => self.queue.retract(tuples, out),
                other => Err(unexpected_store(&self.label, tuple, &other)),
            }
        } else {
            for left in partners {
                self.reconcile(left, false, tuples)?;
            }
            Ok(())
        }
    }

    fn update_side(&mut self, side: usize, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let old_key = match tuples.get(tuple)?.store(self.key_stores[side]) {
            Store::Empty => return self.insert_side(side, tuple, tuples),
            Store::Key(key) => key.clone(),
            other => return Err(unexpected_store(&self.label, tuple, other)),
        };
        let key = self.key_of(side, tuple, tuples)?;
        let moved = key != old_key;
        if moved {
            self.indexers[side].remove(&old_key, tuple)?;
            self.indexers[side].put(key.clone(), tuple)?;
            tuples
                .get_mut(tuple)?
                .set_store(self.key_stores[side], Store::Key(key.clone()));
        }

        let old = self.matches[side].get(&tuple).cloned().unwrap_or_default();
        let new = if moved || self.joiners.has_filters() {
            self.partners(side, tuple, &key, tuples)?
        } else {
            old.clone()
        };
        for &other in old.iter().filter(|o| !new.contains(*o)) {
            self.unlink(side, tuple, other);
        }
        for &other in new.iter().filter(|n| !old.contains(*n)) {
            self.link(side, tuple, other);
        }

        if side == LEFT {
            return self.reconcile(tuple, true, tuples);
        }
        let mut affected = old;
        affected.extend(new);
        for left in affected {
            self.reconcile(left, false, tuples)?;
        }
        Ok(())
    }
}

impl<V: Fact, Sc: Score> TupleLifecycle<V, Sc> for IfExistsNode<V> {
    fn insert(&mut self, side: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        let side = side_index(&self.label, side)?;
        self.insert_side(side, tuple, ctx.tuples)
    }

    fn update(&mut self, side: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        let side = side_index(&self.label, side)?;
        self.update_side(side, tuple, ctx.tuples)
    }

    fn retract(&mut self, side: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        let side = side_index(&self.label, side)?;
        self.retract_side(side, tuple, ctx.tuples)
    }
}

impl<V: Fact, Sc: Score> Propagator<V, Sc> for IfExistsNode<V> {
    fn propagate(&mut self, ctx: &mut NodeContext<'_, V, Sc>, out: &mut Vec<Propagation>) -> Result<()> {
        self.queue.propagate(ctx.tuples, |_, _| Ok(true), out)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<V: Fact, Sc: Score> Node<V, Sc> for IfExistsNode<V> {
    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joiner::{equal_by, less_than};
    use crate::node::testing::Harness;
    use crate::tuple::TupleState;
    use bavet_core::SimpleScore;
    use smallvec::smallvec;

    fn node(should_exist: bool, key: fn(&[Arc<i64>]) -> i64) -> IfExistsNode<i64> {
        IfExistsNode::new(
            if should_exist { "ifExists" } else { "ifNotExists" },
            should_exist,
            Joiners::from(vec![equal_by(key)]),
            [StoreIndex(0), StoreIndex(0)],
            StoreIndex(1),
            0,
            4,
        )
    }

    fn value(t: &[Arc<i64>]) -> i64 {
        *t[0]
    }

    fn parity(t: &[Arc<i64>]) -> i64 {
        *t[0] % 2
    }

    fn insert(node: &mut IfExistsNode<i64>, h: &mut Harness<i64>, side: InputSide, id: TupleId) {
        TupleLifecycle::<i64, SimpleScore>::insert(node, side, id, &mut h.ctx()).unwrap();
    }

    #[test]
    fn test_exists_follows_right_side() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = node(true, value);
        let left = h.parent(vec![1], 2);
        let right = h.parent(vec![1], 2);

        insert(&mut node, &mut h, InputSide::Left, left);
        assert!(h.flush(&mut node).is_empty());

        insert(&mut node, &mut h, InputSide::Right, right);
        let settled = h.flush(&mut node);
        assert_eq!(settled.len(), 1);
        let out = settled[0].tuple();
        assert_eq!(*h.tuples.get(out).unwrap().facts()[0], 1);

        node.retract(InputSide::Right, right, &mut h.ctx()).unwrap();
        assert_eq!(h.flush(&mut node), vec![Propagation::Retract(out)]);
    }

    #[test]
    fn test_not_exists_waits_for_last_match_to_leave() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = node(false, value);
        let left = h.parent(vec![4], 2);
        let r1 = h.parent(vec![4], 2);
        let r2 = h.parent(vec![4], 2);

        insert(&mut node, &mut h, InputSide::Left, left);
        let first = h.flush(&mut node)[0].tuple();

        insert(&mut node, &mut h, InputSide::Right, r1);
        assert_eq!(h.flush(&mut node), vec![Propagation::Retract(first)]);

        insert(&mut node, &mut h, InputSide::Right, r2);
        node.retract(InputSide::Right, r1, &mut h.ctx()).unwrap();
        assert_eq!(node.match_count(left), 1);
        assert!(h.flush(&mut node).is_empty());

        node.retract(InputSide::Right, r2, &mut h.ctx()).unwrap();
        let settled = h.flush(&mut node);
        assert!(matches!(settled.as_slice(), [Propagation::Insert(_)]));
    }

    #[test]
    fn test_right_key_change_moves_the_match() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = node(true, value);
        let l1 = h.parent(vec![1], 2);
        let l2 = h.parent(vec![2], 2);
        let right = h.parent(vec![1], 2);
        insert(&mut node, &mut h, InputSide::Left, l1);
        insert(&mut node, &mut h, InputSide::Left, l2);
        insert(&mut node, &mut h, InputSide::Right, right);
        let out1 = h.flush(&mut node)[0].tuple();

        h.tuples.get_mut(right).unwrap().set_facts(smallvec![Arc::new(2)]);
        node.update(InputSide::Right, right, &mut h.ctx()).unwrap();
        assert_eq!(h.tuples.state(out1).unwrap(), TupleState::Dying);
        assert_eq!(node.match_count(l1), 0);
        assert_eq!(node.match_count(l2), 1);

        let settled = h.flush(&mut node);
        assert_eq!(settled.len(), 2);
        assert!(settled.contains(&Propagation::Retract(out1)));
    }

    #[test]
    fn test_left_update_refreshes_existing_output() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = node(true, parity);
        let left = h.parent(vec![1], 2);
        let right = h.parent(vec![3], 2);
        insert(&mut node, &mut h, InputSide::Left, left);
        insert(&mut node, &mut h, InputSide::Right, right);
        let out = h.flush(&mut node)[0].tuple();

        h.tuples.get_mut(left).unwrap().set_facts(smallvec![Arc::new(5)]);
        node.update(InputSide::Left, left, &mut h.ctx()).unwrap();
        assert_eq!(h.flush(&mut node), vec![Propagation::Update(out)]);
        assert_eq!(*h.tuples.get(out).unwrap().facts()[0], 5);
    }

    #[test]
    fn test_not_exists_with_comparison_tracks_later_rights() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = IfExistsNode::new(
            "ifNotExists",
            false,
            Joiners::from(vec![less_than(|l: &[Arc<i64>]| *l[0], |r: &[Arc<i64>]| *r[0])]),
            [StoreIndex(0), StoreIndex(0)],
            StoreIndex(1),
            0,
            4,
        );
        let early = h.parent(vec![1], 2);
        let late = h.parent(vec![9], 2);
        let right = h.parent(vec![5], 2);
        insert(&mut node, &mut h, InputSide::Left, early);
        insert(&mut node, &mut h, InputSide::Left, late);
        assert_eq!(h.flush(&mut node).len(), 2);

        insert(&mut node, &mut h, InputSide::Right, right);
        assert_eq!(node.match_count(early), 1);
        assert_eq!(node.match_count(late), 0);
        assert!(matches!(h.flush(&mut node).as_slice(), [Propagation::Retract(_)]));

        h.tuples.get_mut(right).unwrap().set_facts(smallvec![Arc::new(10)]);
        node.update(InputSide::Right, right, &mut h.ctx()).unwrap();
        assert_eq!(node.match_count(early), 1);
        assert_eq!(node.match_count(late), 1);
        assert!(matches!(h.flush(&mut node).as_slice(), [Propagation::Retract(_)]));

        node.retract(InputSide::Right, right, &mut h.ctx()).unwrap();
        assert_eq!(h.flush(&mut node).len(), 2);
    }
}
