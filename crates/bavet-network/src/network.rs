//! A working network instance: facts in, score out.

use std::collections::BTreeMap;
use std::sync::Arc;

use bavet_config::EnvironmentMode;
use bavet_core::{BavetError, ConstraintRef, Result, Score};
use tracing::{debug, error, trace};

use crate::definition::NetworkDefinition;
use crate::fact::{Fact, FactHandle};
use crate::lifecycle::{LinkAction, Node, NodeContext, Propagation};
use crate::node::ForEachNode;
use crate::score::{ScoreExplanation, ScoreInliner};
use crate::tuple::TupleArena;

/// Downstream calls made by the last [`NodeNetwork::calculate_score`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub inserts: usize,
    pub updates: usize,
    pub retracts: usize,
}

impl FlushStats {
    pub fn total(&self) -> usize {
        self.inserts + self.updates + self.retracts
    }
}

/// One independent instance of a [`NetworkDefinition`].
///
/// Mutations only mark tuples dirty; nothing reaches the scorers until
/// [`calculate_score`](Self::calculate_score) flushes the network layer by
/// layer. Any error leaves the instance poisoned, after which every
/// operation fails with [`BavetError::Poisoned`].
///
/// # Example
///
/// ```
/// use bavet_core::SimpleScore;
/// use bavet_network::builder::NetworkBuilder;
///
/// let mut builder = NetworkBuilder::<i64, SimpleScore>::new();
/// let negatives = builder.for_each("i64", |v: &i64| *v < 0);
/// builder.penalize(negatives, "Negative", SimpleScore::of(1)).unwrap();
/// let mut network = builder.build().unwrap().instantiate();
///
/// let handle = network.insert(-3).unwrap();
/// assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(-1));
///
/// network.update(handle, 3).unwrap();
/// assert_eq!(network.calculate_score().unwrap(), SimpleScore::ZERO);
/// assert_eq!(*network.retract(handle).unwrap(), 3);
/// ```
pub struct NodeNetwork<V: Fact, Sc: Score> {
    definition: Arc<NetworkDefinition<V, Sc>>,
    mode: EnvironmentMode,
    nodes: Vec<Box<dyn Node<V, Sc>>>,
    tuples: TupleArena<V>,
    scores: ScoreInliner<V, Sc>,
    facts: BTreeMap<FactHandle, Arc<V>>,
    next_handle: u64,
    poisoned: bool,
    last_flush: FlushStats,
}

impl<V: Fact, Sc: Score> NodeNetwork<V, Sc> {
    pub(crate) fn new(definition: Arc<NetworkDefinition<V, Sc>>, mode: EnvironmentMode) -> Self {
        let nodes = definition.create_nodes();
        let mut scores = ScoreInliner::new(definition.config.constraint_match_enabled);
        for decl in &definition.constraints {
            scores.register(decl.constraint_ref.clone(), decl.impact_type, decl.weight);
        }
        debug!(
            event = "network_instantiated",
            nodes = nodes.len(),
            constraints = definition.constraints.len(),
            environment_mode = ?mode,
        );
        Self {
            definition,
            mode,
            nodes,
            tuples: TupleArena::new(),
            scores,
            facts: BTreeMap::new(),
            next_handle: 0,
            poisoned: false,
            last_flush: FlushStats::default(),
        }
    }

    // ==========================================================================
    // Fact operations
    // ==========================================================================

    /// Adds a fact to every source that accepts it.
    pub fn insert(&mut self, fact: V) -> Result<FactHandle> {
        self.check_poisoned()?;
        let handle = FactHandle(self.next_handle);
        self.next_handle += 1;
        let fact = Arc::new(fact);
        let result = self.route_insert(handle, &fact);
        self.poison_on_error(result)?;
        self.facts.insert(handle, fact);
        Ok(handle)
    }

    /// Replaces the fact behind `handle`.
    ///
    /// Sources that stop accepting the fact retract it; sources that start
    /// accepting it insert it.
    pub fn update(&mut self, handle: FactHandle, fact: V) -> Result<()> {
        self.check_poisoned()?;
        let fact = Arc::new(fact);
        let result = self.route_update(handle, &fact);
        self.poison_on_error(result)?;
        self.facts.insert(handle, fact);
        Ok(())
    }

    /// Removes the fact behind `handle` and returns it.
    pub fn retract(&mut self, handle: FactHandle) -> Result<Arc<V>> {
        self.check_poisoned()?;
        let result = self.route_retract(handle);
        self.poison_on_error(result)
    }

    fn route_insert(&mut self, handle: FactHandle, fact: &Arc<V>) -> Result<()> {
        for &source in &self.definition.sources {
            let node = source_mut(&mut self.nodes, source)?;
            if node.accepts(fact)? {
                node.insert_fact(handle, Arc::clone(fact), &mut self.tuples)?;
            }
        }
        Ok(())
    }

    fn route_update(&mut self, handle: FactHandle, fact: &Arc<V>) -> Result<()> {
        if !self.facts.contains_key(&handle) {
            return Err(BavetError::UnknownFact(handle.id()));
        }
        for &source in &self.definition.sources {
            let node = source_mut(&mut self.nodes, source)?;
            match (node.contains(handle), node.accepts(fact)?) {
                (true, true) => node.update_fact(handle, Arc::clone(fact), &mut self.tuples)?,
                (true, false) => node.retract_fact(handle, &mut self.tuples)?,
                (false, true) => node.insert_fact(handle, Arc::clone(fact), &mut self.tuples)?,
                (false, false) => {}
            }
        }
        Ok(())
    }

    fn route_retract(&mut self, handle: FactHandle) -> Result<Arc<V>> {
        let fact = self
            .facts
            .remove(&handle)
            .ok_or(BavetError::UnknownFact(handle.id()))?;
        for &source in &self.definition.sources {
            source_mut(&mut self.nodes, source)?.retract_fact(handle, &mut self.tuples)?;
        }
        Ok(fact)
    }

    // ==========================================================================
    // Score
    // ==========================================================================

    /// Flushes every pending change and returns the total score.
    pub fn calculate_score(&mut self) -> Result<Sc> {
        self.check_poisoned()?;
        let result = self.flush();
        self.last_flush = self.poison_on_error(result)?;
        if self.mode.is_asserted() {
            let result = self.assert_settled();
            self.poison_on_error(result)?;
        }
        if self.mode.is_fully_asserted() {
            let result = self.assert_matches_rebuild();
            self.poison_on_error(result)?;
        }
        Ok(self.scores.total())
    }

    fn flush(&mut self) -> Result<FlushStats> {
        let definition = Arc::clone(&self.definition);
        let asserted = self.mode.is_asserted();
        let mut stats = FlushStats::default();
        let mut propagations = Vec::new();

        for (layer, producers) in definition.layers.iter().enumerate() {
            let before = stats;
            for &producer in producers {
                propagations.clear();
                let mut ctx = NodeContext {
                    tuples: &mut self.tuples,
                    scores: &mut self.scores,
                };
                self.nodes[producer].propagate(&mut ctx, &mut propagations)?;

                for propagation in &propagations {
                    let tuple = propagation.tuple();
                    for link in &definition.links[producer] {
                        let action = link.route(propagation, &self.tuples)?;
                        let mut ctx = NodeContext {
                            tuples: &mut self.tuples,
                            scores: &mut self.scores,
                        };
                        let child = &mut self.nodes[link.node];
                        match action {
                            LinkAction::Insert => {
                                child.insert(link.side, tuple, &mut ctx)?;
                                stats.inserts += 1;
                            }
                            LinkAction::Update => {
                                child.update(link.side, tuple, &mut ctx)?;
                                stats.updates += 1;
                            }
                            LinkAction::Retract => {
                                child.retract(link.side, tuple, &mut ctx)?;
                                stats.retracts += 1;
                            }
                            LinkAction::Skip => {}
                        }
                    }
                    if let Propagation::Retract(id) = propagation {
                        let freed = self.tuples.free(*id)?;
                        if asserted {
                            if let Some(slot) = freed.first_occupied_store() {
                                return Err(BavetError::impossible(format!(
                                    "tuple {:?} of node ({}) was freed with slot {} still occupied",
                                    id, definition.blueprints[producer].label, slot
                                )));
                            }
                        }
                    }
                }
            }
            if stats != before {
                trace!(
                    event = "layer_flushed",
                    layer = layer,
                    inserts = stats.inserts - before.inserts,
                    updates = stats.updates - before.updates,
                    retracts = stats.retracts - before.retracts,
                );
            }
        }

        debug!(
            event = "flush",
            inserts = stats.inserts,
            updates = stats.updates,
            retracts = stats.retracts,
            tuples = self.tuples.len(),
            score = %self.scores.total(),
        );
        Ok(stats)
    }

    fn assert_settled(&self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            if node.pending() > 0 {
                return Err(BavetError::impossible(format!(
                    "node ({}) still has {} dirty tuples after a flush",
                    self.definition.blueprints[index].label,
                    node.pending()
                )));
            }
        }
        self.scores.assert_consistent()
    }

    /// Recomputes the score from scratch in a fresh instance and compares.
    fn assert_matches_rebuild(&self) -> Result<()> {
        let mut fresh = NodeNetwork::new(Arc::clone(&self.definition), EnvironmentMode::NonReproducible);
        for fact in self.facts.values() {
            fresh.insert(V::clone(fact))?;
        }
        let expected = fresh.calculate_score()?;
        let actual = self.scores.total();
        if expected != actual {
            return Err(BavetError::ScoreCorruption {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        for (fresh_ledger, ledger) in fresh.scores.ledgers().iter().zip(self.scores.ledgers()) {
            if fresh_ledger.score() != ledger.score() {
                return Err(BavetError::ScoreCorruption {
                    expected: format!("{} for {}", fresh_ledger.score(), ledger.constraint_ref()),
                    actual: format!("{} for {}", ledger.score(), ledger.constraint_ref()),
                });
            }
        }
        Ok(())
    }

    // ==========================================================================
    // Inspection
    // ==========================================================================

    /// Total score as of the last flush.
    pub fn score(&self) -> Sc {
        self.scores.total()
    }

    /// Score of every constraint as of the last flush, in definition order.
    pub fn constraint_scores(&self) -> Vec<(ConstraintRef, Sc)> {
        self.scores
            .ledgers()
            .iter()
            .map(|ledger| (ledger.constraint_ref().clone(), ledger.score()))
            .collect()
    }

    /// Breakdown of the last flushed score; matches are listed only when
    /// constraint match tracking is enabled.
    pub fn explain(&self) -> ScoreExplanation<V, Sc> {
        self.scores.explain()
    }

    pub fn get(&self, handle: FactHandle) -> Option<&Arc<V>> {
        self.facts.get(&handle)
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Tuples currently alive across all nodes.
    pub fn tuple_count(&self) -> usize {
        self.tuples.len()
    }

    pub fn last_flush_stats(&self) -> FlushStats {
        self.last_flush
    }

    pub fn environment_mode(&self) -> EnvironmentMode {
        self.mode
    }

    pub fn definition(&self) -> &Arc<NetworkDefinition<V, Sc>> {
        &self.definition
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn check_poisoned(&self) -> Result<()> {
        if self.poisoned {
            Err(BavetError::Poisoned)
        } else {
            Ok(())
        }
    }

    fn poison_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.poisoned = true;
            error!(
                event = "network_poisoned",
                user_fault = err.is_user_fault(),
                error = %err,
            );
        }
        result
    }
}

fn source_mut<V: Fact, Sc: Score>(
    nodes: &mut [Box<dyn Node<V, Sc>>],
    index: usize,
) -> Result<&mut ForEachNode<V>> {
    nodes
        .get_mut(index)
        .and_then(|node| node.as_source_mut())
        .ok_or_else(|| BavetError::impossible(format!("node {} is not a source", index)))
}
