//! Join node: combines every matching left/right pair into one tuple.
//!
//! Each input tuple gets two slots from this node per side: the index key it
//! is registered under and its combined tuples, keyed by partner. Keying by
//! partner lets a retract unlink each pair from the other side in O(1).
//! A self-join reserves separate slots for the left and the right input, so
//! the same tuple can sit on both sides at once.

use std::collections::HashMap;
use std::sync::Arc;

use bavet_core::{BavetError, Result, Score};
use indexmap::IndexMap;

use super::{double_insert, side_index, unexpected_store, LEFT, RIGHT};
use crate::fact::{Fact, Facts};
use crate::guard;
use crate::index::{IndexKey, IndexedSide, Indexer};
use crate::joiner::Joiners;
use crate::lifecycle::{InputSide, Node, NodeContext, Propagation, Propagator, TupleLifecycle};
use crate::queue::PropagationQueue;
use crate::tuple::{Store, StoreIndex, TupleArena, TupleId};

pub struct JoinNode<V: Fact> {
    label: String,
    joiners: Joiners<V>,
    indexers: [Indexer<V>; 2],
    key_stores: [StoreIndex; 2],
    out_stores: [StoreIndex; 2],
    /// Combined tuple -> (left, right).
    pairs: HashMap<TupleId, (TupleId, TupleId)>,
    queue: PropagationQueue,
    out_store_size: usize,
}

fn orient(side: usize, tuple: TupleId, other: TupleId) -> (TupleId, TupleId) {
    if side == LEFT {
        (tuple, other)
    } else {
        (other, tuple)
    }
}

impl<V: Fact> JoinNode<V> {
    pub fn new(
        label: impl Into<String>,
        joiners: Joiners<V>,
        key_stores: [StoreIndex; 2],
        out_stores: [StoreIndex; 2],
        out_store_size: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            label: label.into(),
            indexers: [
                Indexer::for_joiners(&joiners, IndexedSide::Left),
                Indexer::for_joiners(&joiners, IndexedSide::Right),
            ],
            joiners,
            key_stores,
            out_stores,
            pairs: HashMap::new(),
            queue: PropagationQueue::with_capacity(queue_capacity),
            out_store_size,
        }
    }

    /// Number of combined tuples currently alive.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
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

    fn passes(&self, left: TupleId, right: TupleId, tuples: &TupleArena<V>) -> Result<bool> {
        if !self.joiners.has_filters() {
            return Ok(true);
        }
        let l: &[Arc<V>] = tuples.get(left)?.facts();
        let r: &[Arc<V>] = tuples.get(right)?.facts();
        guard::call_pair(&self.label, l, r, || self.joiners.test(l, r))
    }

    fn combined(left: TupleId, right: TupleId, tuples: &TupleArena<V>) -> Result<Facts<V>> {
        let mut facts = tuples.get(left)?.facts().clone();
        facts.extend(tuples.get(right)?.facts().iter().cloned());
        Ok(facts)
    }

    fn partners_mut<'a>(
        &self,
        tuples: &'a mut TupleArena<V>,
        tuple: TupleId,
        side: usize,
    ) -> Result<&'a mut IndexMap<TupleId, TupleId>> {
        match tuples.get_mut(tuple)?.store_mut(self.out_stores[side]) {
            Store::Partners(outs) => Ok(outs),
            other => Err(unexpected_store(&self.label, tuple, other)),
        }
    }

    fn push_out(&self, tuples: &mut TupleArena<V>, tuple: TupleId, side: usize, partner: TupleId, out: TupleId) -> Result<()> {
        self.partners_mut(tuples, tuple, side)?.insert(partner, out);
        Ok(())
    }

    fn unlink_out(&self, tuples: &mut TupleArena<V>, tuple: TupleId, side: usize, partner: TupleId, out: TupleId) -> Result<()> {
        match self.partners_mut(tuples, tuple, side)?.swap_remove(&partner) {
            Some(linked) if linked == out => Ok(()),
            _ => Err(BavetError::impossible(format!(
                "node ({}) lost track of {:?} on tuple {:?}",
                self.label, out, tuple
            ))),
        }
    }

    fn insert_out(&mut self, left: TupleId, right: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let facts = Self::combined(left, right, tuples)?;
        let out = tuples.alloc(facts, self.out_store_size);
        self.queue.insert(tuples, out)?;
        self.pairs.insert(out, (left, right));
        self.push_out(tuples, left, LEFT, right, out)?;
        self.push_out(tuples, right, RIGHT, left, out)
    }

    fn refresh_out(&mut self, out: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let (left, right) = self.pair(out)?;
        let facts = Self::combined(left, right, tuples)?;
        tuples.get_mut(out)?.set_facts(facts);
        self.queue.update(tuples, out)
    }

    /// Retracts a combined tuple seen from `side`; the caller owns that side's list.
    fn detach(&mut self, side: usize, out: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let (left, right) = self.pair(out)?;
        self.pairs.remove(&out);
        if side == LEFT {
            self.unlink_out(tuples, right, RIGHT, left, out)?;
        } else {
            self.unlink_out(tuples, left, LEFT, right, out)?;
        }
        self.queue.retract(tuples, out)
    }

    fn pair(&self, out: TupleId) -> Result<(TupleId, TupleId)> {
        self.pairs.get(&out).copied().ok_or_else(|| {
            BavetError::impossible(format!(
                "node ({}) has no pair for combined tuple {:?}",
                self.label, out
            ))
        })
    }

    fn take_outs(&self, tuples: &mut TupleArena<V>, tuple: TupleId, side: usize) -> Result<IndexMap<TupleId, TupleId>> {
        match tuples.get_mut(tuple)?.take_store(self.out_stores[side]) {
            Store::Partners(outs) => Ok(outs),
            other => Err(unexpected_store(&self.label, tuple, &other)),
        }
    }

    fn insert_side(&mut self, side: usize, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        if !tuples.get(tuple)?.store(self.key_stores[side]).is_empty() {
            return Err(double_insert(&self.label, tuple));
        }
        let key = self.key_of(side, tuple, tuples)?;
        let candidates = self.indexers[1 - side].matches(&key);
        self.indexers[side].put(key.clone(), tuple)?;
        let input = tuples.get_mut(tuple)?;
        input.set_store(self.key_stores[side], Store::Key(key));
        input.set_store(self.out_stores[side], Store::Partners(IndexMap::with_capacity(candidates.len())));

        for other in candidates {
            let (left, right) = orient(side, tuple, other);
            if self.passes(left, right, tuples)? {
                self.insert_out(left, right, tuples)?;
            }
        }
        Ok(())
    }

    fn retract_side(&mut self, side: usize, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let key = match tuples.get_mut(tuple)?.take_store(self.key_stores[side]) {
            Store::Empty => return Ok(()),
            Store::Key(key) => key,
            other => return Err(unexpected_store(&self.label, tuple, &other)),
        };
        self.indexers[side].remove(&key, tuple)?;
        for out in self.take_outs(tuples, tuple, side)?.into_values() {
            self.detach(side, out, tuples)?;
        }
        Ok(())
    }

    fn update_side(&mut self, side: usize, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let old_key = match tuples.get(tuple)?.store(self.key_stores[side]) {
            Store::Empty => return self.insert_side(side, tuple, tuples),
            Store::Key(key) => key.clone(),
            other => return Err(unexpected_store(&self.label, tuple, other)),
        };
        let key = self.key_of(side, tuple, tuples)?;
        if key != old_key {
            self.retract_side(side, tuple, tuples)?;
            return self.insert_side(side, tuple, tuples);
        }

        if !self.joiners.has_filters() {
            let outs: Vec<TupleId> = self.partners_mut(tuples, tuple, side)?.values().copied().collect();
            for out in outs {
                self.refresh_out(out, tuples)?;
            }
            return Ok(());
        }

        // Same key with filters: every candidate pair is tested again.
        let mut existing = self.take_outs(tuples, tuple, side)?;
        tuples
            .get_mut(tuple)?
            .set_store(self.out_stores[side], Store::Partners(IndexMap::with_capacity(existing.len())));
        for other in self.indexers[1 - side].matches(&key) {
            let (left, right) = orient(side, tuple, other);
            let pass = self.passes(left, right, tuples)?;
            match (existing.swap_remove(&other), pass) {
                (Some(out), true) => {
                    self.refresh_out(out, tuples)?;
                    self.push_out(tuples, tuple, side, other, out)?;
                }
                (Some(out), false) => self.detach(side, out, tuples)?,
                (None, true) => self.insert_out(left, right, tuples)?,
                (None, false) => {}
            }
        }
        for out in existing.into_values() {
            self.detach(side, out, tuples)?;
        }
        Ok(())
    }
}

impl<V: Fact, Sc: Score> TupleLifecycle<V, Sc> for JoinNode<V> {
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

impl<V: Fact, Sc: Score> Propagator<V, Sc> for JoinNode<V> {
    fn propagate(&mut self, ctx: &mut NodeContext<'_, V, Sc>, out: &mut Vec<Propagation>) -> Result<()> {
        self.queue.propagate(ctx.tuples, |_, _| Ok(true), out)
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl<V: Fact, Sc: Score> Node<V, Sc> for JoinNode<V> {
    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joiner::{equal_by, filtering, less_than};
    use crate::node::testing::Harness;
    use crate::tuple::TupleState;
    use bavet_core::SimpleScore;
    use smallvec::smallvec;

    type Ctx<'a> = NodeContext<'a, i64, SimpleScore>;

    fn by_value() -> JoinNode<i64> {
        JoinNode::new(
            "join(equal)",
            Joiners::from(vec![equal_by(|t: &[Arc<i64>]| *t[0])]),
            [StoreIndex(0), StoreIndex(0)],
            [StoreIndex(1), StoreIndex(1)],
            0,
            4,
        )
    }

    fn set(h: &mut Harness<i64>, id: TupleId, value: i64) {
        h.tuples.get_mut(id).unwrap().set_facts(smallvec![Arc::new(value)]);
    }

    fn insert(node: &mut JoinNode<i64>, side: InputSide, id: TupleId, ctx: &mut Ctx<'_>) {
        TupleLifecycle::insert(node, side, id, ctx).unwrap();
    }

    fn counts(props: &[Propagation]) -> (usize, usize, usize) {
        let mut c = (0, 0, 0);
        for p in props {
            match p {
                Propagation::Insert(_) => c.0 += 1,
                Propagation::Update(_) => c.1 += 1,
                Propagation::Retract(_) => c.2 += 1,
            }
        }
        c
    }

    // ==========================================================================
    // Indexed
    // ==========================================================================

    #[test]
    fn test_key_change_retracts_without_new_match() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = by_value();
        let left = h.parent(vec![1], 2);
        let right = h.parent(vec![1], 2);
        insert(&mut node, InputSide::Left, left, &mut h.ctx());
        insert(&mut node, InputSide::Right, right, &mut h.ctx());
        assert_eq!(node.pair_count(), 1);
        let settled = h.flush(&mut node);
        assert_eq!(counts(&settled), (1, 0, 0));
        let out = settled[0].tuple();
        let facts: Vec<i64> = h.tuples.get(out).unwrap().facts().iter().map(|f| **f).collect();
        assert_eq!(facts, vec![1, 1]);

        set(&mut h, left, 2);
        node.update(InputSide::Left, left, &mut h.ctx()).unwrap();
        assert_eq!(node.pair_count(), 0);
        assert_eq!(h.tuples.state(out).unwrap(), TupleState::Dying);
        assert_eq!(counts(&h.flush(&mut node)), (0, 0, 1));
    }

    #[test]
    fn test_same_key_update_refreshes_in_place() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = JoinNode::new(
            "join(parity)",
            Joiners::from(vec![equal_by(|t: &[Arc<i64>]| *t[0] % 2)]),
            [StoreIndex(0), StoreIndex(0)],
            [StoreIndex(1), StoreIndex(1)],
            0,
            4,
        );
        let left = h.parent(vec![1], 2);
        let right = h.parent(vec![3], 2);
        insert(&mut node, InputSide::Left, left, &mut h.ctx());
        insert(&mut node, InputSide::Right, right, &mut h.ctx());
        let out = h.flush(&mut node)[0].tuple();

        set(&mut h, right, 5);
        node.update(InputSide::Right, right, &mut h.ctx()).unwrap();
        assert_eq!(h.flush(&mut node), vec![Propagation::Update(out)]);
        assert_eq!(*h.tuples.get(out).unwrap().facts()[1], 5);
    }

    #[test]
    fn test_retract_of_unknown_tuple_is_ignored() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = by_value();
        let stranger = h.parent(vec![1], 2);
        node.retract(InputSide::Right, stranger, &mut h.ctx()).unwrap();
        assert!(h.flush(&mut node).is_empty());
    }

    #[test]
    fn test_single_side_is_rejected() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = by_value();
        let parent = h.parent(vec![1], 2);
        let err = TupleLifecycle::insert(&mut node, InputSide::Single, parent, &mut h.ctx())
            .unwrap_err();
        assert!(err.to_string().contains("without a side"));
    }

    // ==========================================================================
    // Filters and self-joins
    // ==========================================================================

    #[test]
    fn test_filter_is_reevaluated_on_same_key_update() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = JoinNode::new(
            "join(lessThan)",
            Joiners::from(vec![filtering(|l: &[Arc<i64>], r: &[Arc<i64>]| *l[0] < *r[0])]),
            [StoreIndex(0), StoreIndex(0)],
            [StoreIndex(1), StoreIndex(1)],
            0,
            4,
        );
        let l = h.parent(vec![1], 2);
        let r1 = h.parent(vec![5], 2);
        let r2 = h.parent(vec![0], 2);
        insert(&mut node, InputSide::Left, l, &mut h.ctx());
        insert(&mut node, InputSide::Right, r1, &mut h.ctx());
        insert(&mut node, InputSide::Right, r2, &mut h.ctx());
        assert_eq!(counts(&h.flush(&mut node)), (1, 0, 0));

        set(&mut h, r2, 9);
        node.update(InputSide::Right, r2, &mut h.ctx()).unwrap();
        set(&mut h, l, 6);
        node.update(InputSide::Left, l, &mut h.ctx()).unwrap();
        assert_eq!(node.pair_count(), 1);

        let settled = h.flush(&mut node);
        assert_eq!(counts(&settled), (1, 0, 1));
        let inserted = settled
            .iter()
            .find(|p| matches!(p, Propagation::Insert(_)))
            .unwrap()
            .tuple();
        let facts: Vec<i64> = h.tuples.get(inserted).unwrap().facts().iter().map(|f| **f).collect();
        assert_eq!(facts, vec![6, 9]);
    }

    #[test]
    fn test_self_join_pairs_each_tuple_with_itself() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = JoinNode::new(
            "join(parity)",
            Joiners::from(vec![equal_by(|t: &[Arc<i64>]| *t[0] % 2)]),
            [StoreIndex(0), StoreIndex(1)],
            [StoreIndex(2), StoreIndex(3)],
            0,
            8,
        );
        let a = h.parent(vec![1], 4);
        let b = h.parent(vec![3], 4);
        let c = h.parent(vec![2], 4);
        for id in [a, b, c] {
            insert(&mut node, InputSide::Left, id, &mut h.ctx());
            insert(&mut node, InputSide::Right, id, &mut h.ctx());
        }
        assert_eq!(node.pair_count(), 5);

        node.retract(InputSide::Left, a, &mut h.ctx()).unwrap();
        node.retract(InputSide::Right, a, &mut h.ctx()).unwrap();
        assert_eq!(node.pair_count(), 2);
        // The retracted pairs were never propagated and are dropped silently.
        assert_eq!(counts(&h.flush(&mut node)), (2, 0, 0));
        assert_eq!(h.tuples.len(), 5);
    }

    // ==========================================================================
    // Comparison index and partner bookkeeping
    // ==========================================================================

    fn facts_of(h: &Harness<i64>, id: TupleId) -> Vec<i64> {
        h.tuples.get(id).unwrap().facts().iter().map(|f| **f).collect()
    }

    #[test]
    fn test_comparison_joiner_follows_key_moves() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = JoinNode::new(
            "join(lessThan)",
            Joiners::from(vec![less_than(|l: &[Arc<i64>]| *l[0], |r: &[Arc<i64>]| *r[0])]),
            [StoreIndex(0), StoreIndex(0)],
            [StoreIndex(1), StoreIndex(1)],
            0,
            8,
        );
        let rights: Vec<TupleId> = [1, 5, 9].iter().map(|v| h.parent(vec![*v], 2)).collect();
        for &r in &rights {
            insert(&mut node, InputSide::Right, r, &mut h.ctx());
        }
        let l = h.parent(vec![4], 2);
        insert(&mut node, InputSide::Left, l, &mut h.ctx());
        assert_eq!(node.pair_count(), 2);

        set(&mut h, l, 8);
        node.update(InputSide::Left, l, &mut h.ctx()).unwrap();
        assert_eq!(node.pair_count(), 1);

        set(&mut h, rights[0], 10);
        node.update(InputSide::Right, rights[0], &mut h.ctx()).unwrap();
        assert_eq!(node.pair_count(), 2);

        let settled = h.flush(&mut node);
        assert_eq!(counts(&settled), (2, 0, 0));
        let mut pairs: Vec<Vec<i64>> = settled.iter().map(|p| facts_of(&h, p.tuple())).collect();
        pairs.sort();
        assert_eq!(pairs, vec![vec![8, 9], vec![8, 10]]);
    }

    #[test]
    fn test_retract_unlinks_every_partner() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = by_value();
        let left = h.parent(vec![7], 2);
        let rights: Vec<TupleId> = (0..4).map(|_| h.parent(vec![7], 2)).collect();
        insert(&mut node, InputSide::Left, left, &mut h.ctx());
        for &r in &rights {
            insert(&mut node, InputSide::Right, r, &mut h.ctx());
        }
        assert_eq!(node.pair_count(), 4);
        assert_eq!(counts(&h.flush(&mut node)), (4, 0, 0));

        node.retract(InputSide::Right, rights[1], &mut h.ctx()).unwrap();
        match h.tuples.get(left).unwrap().store(StoreIndex(1)) {
            Store::Partners(outs) => {
                assert_eq!(outs.len(), 3);
                assert!(!outs.contains_key(&rights[1]));
            }
            other => panic!("unexpected store {}", other.kind()),
        }

        node.retract(InputSide::Left, left, &mut h.ctx()).unwrap();
        assert_eq!(node.pair_count(), 0);
        for r in [rights[0], rights[2], rights[3]] {
            match h.tuples.get(r).unwrap().store(StoreIndex(1)) {
                Store::Partners(outs) => assert!(outs.is_empty()),
                other => panic!("unexpected store {}", other.kind()),
            }
        }
        assert_eq!(counts(&h.flush(&mut node)), (0, 0, 4));
    }
}
