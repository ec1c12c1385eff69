//! Per-constraint score ledger fed by scorer nodes.

use std::collections::HashMap;
use std::sync::Arc;

use bavet_core::{BavetError, ConstraintRef, ImpactType, Result, Score};

use super::analysis::{ConstraintAnalysis, ConstraintMatch, ScoreExplanation};
use crate::fact::{Fact, Facts};
use crate::tuple::{describe_facts, UndoImpact};

/// Running totals of one constraint.
pub struct ConstraintLedger<V: Fact, Sc: Score> {
    constraint_ref: ConstraintRef,
    impact_type: ImpactType,
    weight: Sc,
    score: Sc,
    match_count: usize,
    /// Tracked matches with the score each one contributed.
    matches: HashMap<u64, (Facts<V>, Sc)>,
}

impl<V: Fact, Sc: Score> ConstraintLedger<V, Sc> {
    pub fn constraint_ref(&self) -> &ConstraintRef {
        &self.constraint_ref
    }

    pub fn impact_type(&self) -> ImpactType {
        self.impact_type
    }

    /// Configured weight, before the penalty/reward sign.
    pub fn weight(&self) -> Sc {
        self.weight
    }

    pub fn score(&self) -> Sc {
        self.score
    }

    pub fn match_count(&self) -> usize {
        self.match_count
    }

    /// Signed contribution of one match, `None` when it leaves the `i64` range.
    fn delta(&self, match_weight: i64) -> Option<Sc> {
        self.impact_type.impact(self.weight, match_weight)
    }

    fn overflow(&self, tuple: String, match_weight: i64) -> BavetError {
        BavetError::Impact {
            constraint: self.constraint_ref.to_string(),
            tuple,
            message: format!(
                "match weight {} times constraint weight {} overflows the score",
                match_weight, self.weight
            ),
        }
    }
}

/// Collects the impacts of every scorer node of one network instance.
///
/// Each impact is matched by an [`UndoImpact`] that the scorer keeps in the
/// tuple's store; undoing subtracts exactly what the impact added.
pub struct ScoreInliner<V: Fact, Sc: Score> {
    ledgers: Vec<ConstraintLedger<V, Sc>>,
    total: Sc,
    constraint_match_enabled: bool,
    next_match_id: u64,
}

impl<V: Fact, Sc: Score> ScoreInliner<V, Sc> {
    pub fn new(constraint_match_enabled: bool) -> Self {
        Self {
            ledgers: Vec::new(),
            total: Sc::zero(),
            constraint_match_enabled,
            next_match_id: 0,
        }
    }

    /// Registers a constraint and returns its ledger index.
    pub fn register(
        &mut self,
        constraint_ref: ConstraintRef,
        impact_type: ImpactType,
        weight: Sc,
    ) -> usize {
        self.ledgers.push(ConstraintLedger {
            constraint_ref,
            impact_type,
            weight,
            score: Sc::zero(),
            match_count: 0,
            matches: HashMap::new(),
        });
        self.ledgers.len() - 1
    }

    /// Adds one match of `constraint` to the score.
    ///
    /// An impact that overflows any score level fails with
    /// [`BavetError::Impact`] and leaves every total untouched.
    pub fn impact(
        &mut self,
        constraint: usize,
        match_weight: i64,
        facts: &[Arc<V>],
    ) -> Result<UndoImpact> {
        let match_id = self.next_match_id;
        let enabled = self.constraint_match_enabled;
        let total = self.total;
        let ledger = self.ledger_mut(constraint)?;
        let applied = ledger.delta(match_weight).and_then(|delta| {
            Some((delta, ledger.score.checked_add(delta)?, total.checked_add(delta)?))
        });
        let Some((delta, score, total)) = applied else {
            return Err(ledger.overflow(describe_facts(facts), match_weight));
        };
        ledger.score = score;
        ledger.match_count += 1;
        if enabled {
            ledger
                .matches
                .insert(match_id, (facts.iter().cloned().collect(), delta));
        }
        self.total = total;
        self.next_match_id += 1;

        Ok(UndoImpact {
            constraint,
            match_weight,
            match_id,
        })
    }

    /// Reverses an impact. Each undo record must be applied exactly once.
    pub fn undo(&mut self, undo: UndoImpact) -> Result<()> {
        let enabled = self.constraint_match_enabled;
        let total = self.total;
        let ledger = self.ledger_mut(undo.constraint)?;
        if ledger.match_count == 0 {
            return Err(BavetError::impossible(format!(
                "constraint ({}) has no match left to undo",
                ledger.constraint_ref
            )));
        }
        if enabled && !ledger.matches.contains_key(&undo.match_id) {
            return Err(BavetError::impossible(format!(
                "constraint ({}) undo record {} was already applied",
                ledger.constraint_ref, undo.match_id
            )));
        }
        let reverted = ledger.delta(undo.match_weight).and_then(|delta| {
            Some((ledger.score.checked_sub(delta)?, total.checked_sub(delta)?))
        });
        let Some((score, total)) = reverted else {
            let tuple = match ledger.matches.get(&undo.match_id) {
                Some((facts, _)) => describe_facts(&facts[..]),
                None => format!("of match #{}", undo.match_id),
            };
            return Err(ledger.overflow(tuple, undo.match_weight));
        };
        ledger.matches.remove(&undo.match_id);
        ledger.score = score;
        ledger.match_count -= 1;
        self.total = total;
        Ok(())
    }

    fn ledger_mut(&mut self, constraint: usize) -> Result<&mut ConstraintLedger<V, Sc>> {
        self.ledgers.get_mut(constraint).ok_or_else(|| {
            BavetError::impossible(format!("no constraint registered at index {}", constraint))
        })
    }

    pub fn total(&self) -> Sc {
        self.total
    }

    pub fn ledgers(&self) -> &[ConstraintLedger<V, Sc>] {
        &self.ledgers
    }

    pub fn is_constraint_match_enabled(&self) -> bool {
        self.constraint_match_enabled
    }

    /// Checks that the per-constraint scores add up to the total.
    pub fn assert_consistent(&self) -> Result<()> {
        let sum = self
            .ledgers
            .iter()
            .try_fold(Sc::zero(), |acc, ledger| acc.checked_add(ledger.score));
        if sum != Some(self.total) {
            return Err(BavetError::impossible(format!(
                "constraint scores add up to {:?} but the total is {}",
                sum, self.total
            )));
        }
        if self.constraint_match_enabled {
            for ledger in &self.ledgers {
                let tracked = ledger
                    .matches
                    .values()
                    .try_fold(Sc::zero(), |acc, (_, delta)| acc.checked_add(*delta));
                if tracked != Some(ledger.score) || ledger.matches.len() != ledger.match_count {
                    return Err(BavetError::impossible(format!(
                        "constraint ({}) tracks {} matches worth {:?} but reports {} worth {}",
                        ledger.constraint_ref,
                        ledger.matches.len(),
                        tracked,
                        ledger.match_count,
                        ledger.score
                    )));
                }
            }
        }
        Ok(())
    }

    /// Builds the score explanation. Matches are listed only when tracked.
    pub fn explain(&self) -> ScoreExplanation<V, Sc> {
        let analyses = self
            .ledgers
            .iter()
            .map(|ledger| {
                let mut ids: Vec<&u64> = ledger.matches.keys().collect();
                ids.sort();
                let matches = ids
                    .into_iter()
                    .map(|id| {
                        let (facts, delta) = &ledger.matches[id];
                        ConstraintMatch {
                            constraint_ref: ledger.constraint_ref.clone(),
                            score: *delta,
                            facts: facts.iter().cloned().collect(),
                        }
                    })
                    .collect();
                ConstraintAnalysis {
                    constraint_ref: ledger.constraint_ref.clone(),
                    weight: ledger.weight,
                    score: ledger.score,
                    match_count: ledger.match_count,
                    matches,
                }
            })
            .collect();
        ScoreExplanation::new(self.total, analyses)
    }
}
