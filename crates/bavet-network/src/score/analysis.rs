//! Score explanation and indictments.

use std::collections::HashMap;
use std::sync::Arc;

use bavet_core::{ConstraintRef, Score};

use crate::fact::Fact;

/// One tuple matched by a constraint, with its score contribution.
#[derive(Debug, Clone)]
pub struct ConstraintMatch<V: Fact, Sc: Score> {
    pub constraint_ref: ConstraintRef,
    pub score: Sc,
    pub facts: Vec<Arc<V>>,
}

/// Per-constraint breakdown in a score explanation.
#[derive(Debug, Clone)]
pub struct ConstraintAnalysis<V: Fact, Sc: Score> {
    pub constraint_ref: ConstraintRef,
    /// Constraint weight (score per unit of match weight).
    pub weight: Sc,
    pub score: Sc,
    pub match_count: usize,
    /// Empty unless constraint match tracking is enabled.
    pub matches: Vec<ConstraintMatch<V, Sc>>,
}

impl<V: Fact, Sc: Score> ConstraintAnalysis<V, Sc> {
    pub fn name(&self) -> &str {
        &self.constraint_ref.name
    }

    pub fn is_hard(&self) -> bool {
        self.weight.is_hard()
    }
}

/// Complete score explanation with per-constraint breakdown.
#[derive(Debug, Clone)]
pub struct ScoreExplanation<V: Fact, Sc: Score> {
    pub score: Sc,
    pub constraint_analyses: Vec<ConstraintAnalysis<V, Sc>>,
}

impl<V: Fact, Sc: Score> ScoreExplanation<V, Sc> {
    pub fn new(score: Sc, constraint_analyses: Vec<ConstraintAnalysis<V, Sc>>) -> Self {
        Self {
            score,
            constraint_analyses,
        }
    }

    pub fn total_match_count(&self) -> usize {
        self.constraint_analyses.iter().map(|a| a.match_count).sum()
    }

    /// Returns constraints with non-zero scores.
    pub fn non_zero_constraints(&self) -> Vec<&ConstraintAnalysis<V, Sc>> {
        self.constraint_analyses
            .iter()
            .filter(|a| a.score != Sc::zero())
            .collect()
    }

    pub fn analysis(&self, constraint: &ConstraintRef) -> Option<&ConstraintAnalysis<V, Sc>> {
        self.constraint_analyses
            .iter()
            .find(|a| &a.constraint_ref == constraint)
    }

    /// Indictments per fact, built from the tracked matches.
    pub fn indictments(&self) -> HashMap<Arc<V>, Indictment<V, Sc>> {
        let mut map: HashMap<Arc<V>, Indictment<V, Sc>> = HashMap::new();
        for analysis in &self.constraint_analyses {
            for m in &analysis.matches {
                let mut seen: Vec<&Arc<V>> = Vec::with_capacity(m.facts.len());
                for fact in &m.facts {
                    // A fact appearing twice in one match is indicted once.
                    if seen.contains(&fact) {
                        continue;
                    }
                    seen.push(fact);
                    map.entry(Arc::clone(fact))
                        .or_insert_with(|| Indictment::new(Arc::clone(fact)))
                        .add_match(m.clone());
                }
            }
        }
        map
    }
}

/// Analysis of how a single fact impacts the score.
#[derive(Debug, Clone)]
pub struct Indictment<V: Fact, Sc: Score> {
    pub fact: Arc<V>,
    pub score: Sc,
    pub matches: Vec<ConstraintMatch<V, Sc>>,
}

impl<V: Fact, Sc: Score> Indictment<V, Sc> {
    pub fn new(fact: Arc<V>) -> Self {
        Self {
            fact,
            score: Sc::zero(),
            matches: Vec::new(),
        }
    }

    pub fn add_match(&mut self, constraint_match: ConstraintMatch<V, Sc>) {
        self.score = self.score.saturating_add(constraint_match.score);
        self.matches.push(constraint_match);
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Distinct constraints this fact takes part in.
    pub fn violated_constraints(&self) -> Vec<&ConstraintRef> {
        let mut refs: Vec<&ConstraintRef> = self.matches.iter().map(|m| &m.constraint_ref).collect();
        refs.sort();
        refs.dedup();
        refs
    }
}
