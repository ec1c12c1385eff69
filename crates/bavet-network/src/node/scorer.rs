//! Terminal node: turns every tuple that reaches it into a score impact.

use std::sync::Arc;

use bavet_core::{Result, Score};

use super::{double_insert, unexpected_store};
use crate::fact::{Fact, MatchWeigher};
use crate::guard;
use crate::lifecycle::{InputSide, Node, NodeContext, Propagation, Propagator, TupleLifecycle};
use crate::tuple::{Store, StoreIndex, TupleId};

pub struct ScorerNode<V: Fact> {
    /// Full constraint name, used in logs and impact errors.
    label: String,
    constraint: usize,
    undo_store: StoreIndex,
    /// `None` weighs every match 1.
    weigher: Option<MatchWeigher<V>>,
}

impl<V: Fact> ScorerNode<V> {
    pub fn new(
        label: impl Into<String>,
        constraint: usize,
        undo_store: StoreIndex,
        weigher: Option<MatchWeigher<V>>,
    ) -> Self {
        Self {
            label: label.into(),
            constraint,
            undo_store,
            weigher,
        }
    }

    /// Ledger index of the constraint this scorer feeds.
    pub fn constraint(&self) -> usize {
        self.constraint
    }
}

impl<V: Fact, Sc: Score> TupleLifecycle<V, Sc> for ScorerNode<V> {
    fn insert(&mut self, _: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        let input = ctx.tuples.get(tuple)?;
        if !input.store(self.undo_store).is_empty() {
            return Err(double_insert(&self.label, tuple));
        }
        let facts: &[Arc<V>] = input.facts();
        let match_weight = match &self.weigher {
            Some(weigher) => guard::impact(&self.label, facts, || weigher(facts))?,
            None => 1,
        };
        let undo = ctx.scores.impact(self.constraint, match_weight, facts)?;
        ctx.tuples
            .get_mut(tuple)?
            .set_store(self.undo_store, Store::Undo(undo));
        Ok(())
    }

    fn update(&mut self, side: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        match ctx.tuples.get_mut(tuple)?.take_store(self.undo_store) {
            Store::Empty => {}
            Store::Undo(undo) => ctx.scores.undo(undo)?,
            other => return Err(unexpected_store(&self.label, tuple, &other)),
        }
        self.insert(side, tuple, ctx)
    }

    fn retract(&mut self, _: InputSide, tuple: TupleId, ctx: &mut NodeContext<'_, V, Sc>) -> Result<()> {
        match ctx.tuples.get_mut(tuple)?.take_store(self.undo_store) {
            Store::Empty => Ok(()),
            Store::Undo(undo) => ctx.scores.undo(undo),
            other => Err(unexpected_store(&self.label, tuple, &other)),
        }
    }
}

impl<V: Fact, Sc: Score> Propagator<V, Sc> for ScorerNode<V> {
    fn propagate(&mut self, _: &mut NodeContext<'_, V, Sc>, _: &mut Vec<Propagation>) -> Result<()> {
        Ok(())
    }

    fn pending(&self) -> usize {
        0
    }
}

impl<V: Fact, Sc: Score> Node<V, Sc> for ScorerNode<V> {
    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::testing::Harness;
    use bavet_core::{BavetError, ConstraintRef, ImpactType, SimpleScore};
    use smallvec::smallvec;

    fn scorer(h: &mut Harness<i64>, weigher: Option<MatchWeigher<i64>>) -> ScorerNode<i64> {
        let index = h.scores.register(
            ConstraintRef::new("test", "Big values"),
            ImpactType::Penalty,
            SimpleScore::of(2),
        );
        ScorerNode::new("test/Big values", index, StoreIndex(0), weigher)
    }

    #[test]
    fn test_insert_update_retract_balance() {
        let mut h: Harness<i64> = Harness::new();
        let weigher: MatchWeigher<i64> = Arc::new(|t: &[Arc<i64>]| *t[0]);
        let mut node = scorer(&mut h, Some(weigher));
        let tuple = h.parent(vec![3], 1);

        node.insert(InputSide::Single, tuple, &mut h.ctx()).unwrap();
        assert_eq!(h.scores.total(), SimpleScore::of(-6));

        h.tuples.get_mut(tuple).unwrap().set_facts(smallvec![Arc::new(5)]);
        node.update(InputSide::Single, tuple, &mut h.ctx()).unwrap();
        assert_eq!(h.scores.total(), SimpleScore::of(-10));
        assert_eq!(h.scores.ledgers()[0].match_count(), 1);

        node.retract(InputSide::Single, tuple, &mut h.ctx()).unwrap();
        assert_eq!(h.scores.total(), SimpleScore::ZERO);
        assert!(h.tuples.get(tuple).unwrap().store(StoreIndex(0)).is_empty());

        // A second retract finds nothing to undo.
        node.retract(InputSide::Single, tuple, &mut h.ctx()).unwrap();
        assert_eq!(h.scores.total(), SimpleScore::ZERO);
    }

    #[test]
    fn test_occupied_slot_fails_fast() {
        let mut h: Harness<i64> = Harness::new();
        let mut node = scorer(&mut h, None);
        let tuple = h.parent(vec![1], 1);
        node.insert(InputSide::Single, tuple, &mut h.ctx()).unwrap();
        let err = node.insert(InputSide::Single, tuple, &mut h.ctx()).unwrap_err();
        assert!(matches!(err, BavetError::InvariantViolation(_)));
        assert_eq!(h.scores.total(), SimpleScore::of(-2));
    }

    #[test]
    fn test_impact_panic_names_constraint_and_tuple() {
        let mut h: Harness<i64> = Harness::new();
        let weigher: MatchWeigher<i64> = Arc::new(|_: &[Arc<i64>]| -> i64 { panic!("overflow") });
        let mut node = scorer(&mut h, Some(weigher));
        let tuple = h.parent(vec![7], 1);
        let err = node.insert(InputSide::Single, tuple, &mut h.ctx()).unwrap_err();
        match err {
            BavetError::Impact { constraint, tuple, message } => {
                assert_eq!(constraint, "test/Big values");
                assert_eq!(tuple, "[7]");
                assert_eq!(message, "overflow");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(h.scores.total(), SimpleScore::ZERO);
    }
}
