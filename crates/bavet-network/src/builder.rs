//! Fluent construction of a [`NetworkDefinition`].
//!
//! Streams are cheap copyable handles. Every operation appends a node (or,
//! for `filter`, only a predicate on the outgoing link) and reserves the
//! store slots that node needs on its parents' tuples.
//!
//! # Example
//!
//! ```
//! use bavet_core::{ConstraintRef, SimpleScore};
//! use bavet_network::builder::NetworkBuilder;
//! use bavet_network::joiner::equal_by;
//! use std::sync::Arc;
//!
//! let mut builder = NetworkBuilder::<i64, SimpleScore>::new().with_package("demo");
//! let values = builder.for_each("i64", |_: &i64| true);
//! let pairs = builder
//!     .join(values, values, vec![equal_by(|t: &[Arc<i64>]| *t[0] % 3)])
//!     .unwrap();
//! builder.penalize(pairs, "Same remainder", SimpleScore::of(1)).unwrap();
//! let definition = builder.build().unwrap();
//!
//! let mut network = definition.instantiate();
//! network.insert(1).unwrap();
//! network.insert(4).unwrap();
//! // (1,1), (1,4), (4,1) and (4,4)
//! assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(-4));
//! assert_eq!(network.constraint_scores()[0].0, ConstraintRef::new("demo", "Same remainder"));
//! ```

use std::sync::Arc;

use bavet_config::{EnvironmentMode, NetworkConfig};
use bavet_core::{BavetError, ConstraintRef, ImpactType, ParseableScore, Result, Score};
use tracing::{info, warn};

use crate::collector::{Collector, NoCollector};
use crate::definition::{Blueprint, ConstraintDecl, NetworkDefinition, NodeFactory, NodeShape};
use crate::fact::{ClassPredicate, Fact, FlattenFn, MatchWeigher, TupleMapper, TuplePredicate};
use crate::joiner::{Joiner, Joiners};
use crate::lifecycle::{ChildLink, InputSide, Node};
use crate::node::{
    ConcatNode, FlattenLastNode, ForEachNode, GroupKeys, GroupNode, IfExistsNode, JoinNode,
    MapNode, ResultFn, ScorerNode,
};
use crate::score::ConstraintWeightOverrides;
use crate::tuple::StoreIndex;

/// Handle to a stream under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stream {
    id: usize,
}

struct StreamInfo<V: Fact> {
    producer: usize,
    arity: usize,
    filter: Option<TuplePredicate<V>>,
    filter_label: String,
}

pub struct NetworkBuilder<V: Fact, Sc: Score> {
    package: String,
    config: NetworkConfig,
    overrides: ConstraintWeightOverrides<Sc>,
    streams: Vec<StreamInfo<V>>,
    blueprints: Vec<Blueprint<V, Sc>>,
    links: Vec<Vec<ChildLink<V>>>,
    sources: Vec<usize>,
    constraints: Vec<ConstraintDecl<Sc>>,
}

impl<V: Fact, Sc: Score> Default for NetworkBuilder<V, Sc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Fact, Sc: Score> NetworkBuilder<V, Sc> {
    pub fn new() -> Self {
        Self {
            package: String::new(),
            config: NetworkConfig::default(),
            overrides: ConstraintWeightOverrides::new(),
            streams: Vec::new(),
            blueprints: Vec::new(),
            links: Vec::new(),
            sources: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Package prefixed to the names of constraints added afterwards.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn with_environment_mode(mut self, mode: EnvironmentMode) -> Self {
        self.config.environment_mode = mode;
        self
    }

    pub fn with_constraint_match_enabled(mut self, enabled: bool) -> Self {
        self.config.constraint_match_enabled = enabled;
        self
    }

    /// Weights applied over the ones given to `penalize`/`reward`.
    pub fn with_weight_overrides(mut self, overrides: ConstraintWeightOverrides<Sc>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    // ==========================================================================
    // Sources and single-parent operations
    // ==========================================================================

    /// Starts a stream of every inserted fact accepted by `accepts`.
    pub fn for_each<P>(&mut self, class: &str, accepts: P) -> Stream
    where
        P: Fn(&V) -> bool + Send + Sync + 'static,
    {
        let accepts: ClassPredicate<V> = Arc::new(accepts);
        let label = format!("forEach({})", class);
        let node_label = label.clone();
        let node = self.add_node(
            label,
            0,
            Arc::new(move |shape: NodeShape| -> Box<dyn Node<V, Sc>> {
                Box::new(ForEachNode::new(
                    node_label.clone(),
                    Arc::clone(&accepts),
                    shape.out_store_size,
                    shape.queue_capacity,
                ))
            }),
        );
        self.sources.push(node);
        self.new_stream(node, 1, None, String::new())
    }

    /// Keeps the tuples for which `predicate` holds.
    ///
    /// No node is created: the predicate guards the links to every consumer
    /// of the returned stream. Chained filters are combined with AND.
    pub fn filter<P>(&mut self, stream: Stream, predicate: P) -> Result<Stream>
    where
        P: Fn(&[Arc<V>]) -> bool + Send + Sync + 'static,
    {
        let info = self.info(stream)?;
        let (producer, arity) = (info.producer, info.arity);
        let predicate: TuplePredicate<V> = Arc::new(predicate);
        let (filter, label) = match &info.filter {
            None => (predicate, format!("filter#{}", self.streams.len())),
            Some(previous) => {
                let previous = Arc::clone(previous);
                let combined: TuplePredicate<V> =
                    Arc::new(move |facts: &[Arc<V>]| previous(facts) && predicate(facts));
                let label = format!("{} && filter#{}", info.filter_label, self.streams.len());
                (combined, label)
            }
        };
        Ok(self.new_stream(producer, arity, Some(filter), label))
    }

    /// Replaces every tuple by the facts computed by `mappers`.
    pub fn map(&mut self, stream: Stream, mappers: Vec<TupleMapper<V>>) -> Result<Stream> {
        if mappers.is_empty() {
            return Err(BavetError::Build("map needs at least one mapping function".to_string()));
        }
        let parent = self.producer(stream)?;
        let input_store = self.reserve(parent);
        let arity = mappers.len();
        let label = self.label("map");
        let node_label = label.clone();
        let node = self.add_node(
            label,
            self.blueprints[parent].layer + 1,
            Arc::new(move |shape: NodeShape| -> Box<dyn Node<V, Sc>> {
                Box::new(MapNode::new(
                    node_label.clone(),
                    mappers.clone(),
                    input_store,
                    shape.out_store_size,
                    shape.queue_capacity,
                ))
            }),
        );
        self.attach(stream, node, InputSide::Single)?;
        Ok(self.new_stream(node, arity, None, String::new()))
    }

    /// Replaces the last fact of every tuple by each item `flatten` yields for it.
    pub fn flatten_last<F>(&mut self, stream: Stream, flatten: F) -> Result<Stream>
    where
        F: Fn(&V) -> Vec<Arc<V>> + Send + Sync + 'static,
    {
        let flatten: FlattenFn<V> = Arc::new(flatten);
        let arity = self.info(stream)?.arity;
        let parent = self.producer(stream)?;
        let input_store = self.reserve(parent);
        let label = self.label("flattenLast");
        let node_label = label.clone();
        let node = self.add_node(
            label,
            self.blueprints[parent].layer + 1,
            Arc::new(move |shape: NodeShape| -> Box<dyn Node<V, Sc>> {
                Box::new(FlattenLastNode::new(
                    node_label.clone(),
                    Arc::clone(&flatten),
                    input_store,
                    shape.out_store_size,
                    shape.queue_capacity,
                ))
            }),
        );
        self.attach(stream, node, InputSide::Single)?;
        Ok(self.new_stream(node, arity, None, String::new()))
    }

    // ==========================================================================
    // Two-parent operations
    // ==========================================================================

    /// Pairs every left tuple with every matching right tuple.
    ///
    /// Joining a stream with itself is allowed; each side gets its own slots.
    pub fn join(&mut self, left: Stream, right: Stream, joiners: Vec<Joiner<V>>) -> Result<Stream> {
        let arity = self.info(left)?.arity + self.info(right)?.arity;
        let (left_parent, right_parent) = (self.producer(left)?, self.producer(right)?);
        let key_stores = [self.reserve(left_parent), self.reserve(right_parent)];
        let out_stores = [self.reserve(left_parent), self.reserve(right_parent)];
        let joiners = Joiners::from(joiners);
        let label = self.label("join");
        let node_label = label.clone();
        let layer = self.blueprints[left_parent].layer.max(self.blueprints[right_parent].layer) + 1;
        let node = self.add_node(
            label,
            layer,
            Arc::new(move |shape: NodeShape| -> Box<dyn Node<V, Sc>> {
                Box::new(JoinNode::new(
                    node_label.clone(),
                    joiners.clone(),
                    key_stores,
                    out_stores,
                    shape.out_store_size,
                    shape.queue_capacity,
                ))
            }),
        );
        self.attach(left, node, InputSide::Left)?;
        self.attach(right, node, InputSide::Right)?;
        Ok(self.new_stream(node, arity, None, String::new()))
    }

    /// Keeps the left tuples that have at least one matching right tuple.
    pub fn if_exists(&mut self, left: Stream, right: Stream, joiners: Vec<Joiner<V>>) -> Result<Stream> {
        self.exists(left, right, joiners, true)
    }

    /// Keeps the left tuples that have no matching right tuple.
    pub fn if_not_exists(&mut self, left: Stream, right: Stream, joiners: Vec<Joiner<V>>) -> Result<Stream> {
        self.exists(left, right, joiners, false)
    }

    fn exists(&mut self, left: Stream, right: Stream, joiners: Vec<Joiner<V>>, should_exist: bool) -> Result<Stream> {
        let arity = self.info(left)?.arity;
        let (left_parent, right_parent) = (self.producer(left)?, self.producer(right)?);
        let key_stores = [self.reserve(left_parent), self.reserve(right_parent)];
        let out_store = self.reserve(left_parent);
        let joiners = Joiners::from(joiners);
        let label = self.label(if should_exist { "ifExists" } else { "ifNotExists" });
        let node_label = label.clone();
        let layer = self.blueprints[left_parent].layer.max(self.blueprints[right_parent].layer) + 1;
        let node = self.add_node(
            label,
            layer,
            Arc::new(move |shape: NodeShape| -> Box<dyn Node<V, Sc>> {
                Box::new(IfExistsNode::new(
                    node_label.clone(),
                    should_exist,
                    joiners.clone(),
                    key_stores,
                    out_store,
                    shape.out_store_size,
                    shape.queue_capacity,
                ))
            }),
        );
        self.attach(left, node, InputSide::Left)?;
        self.attach(right, node, InputSide::Right)?;
        Ok(self.new_stream(node, arity, None, String::new()))
    }

    /// Union of two streams of the same arity.
    pub fn concat(&mut self, first: Stream, second: Stream) -> Result<Stream> {
        let arity = self.info(first)?.arity;
        let other = self.info(second)?.arity;
        if arity != other {
            return Err(BavetError::Build(format!(
                "concat needs streams of equal arity, got {} and {}",
                arity, other
            )));
        }
        let (first_parent, second_parent) = (self.producer(first)?, self.producer(second)?);
        let input_stores = [self.reserve(first_parent), self.reserve(second_parent)];
        let label = self.label("concat");
        let node_label = label.clone();
        let layer = self.blueprints[first_parent].layer.max(self.blueprints[second_parent].layer) + 1;
        let node = self.add_node(
            label,
            layer,
            Arc::new(move |shape: NodeShape| -> Box<dyn Node<V, Sc>> {
                Box::new(ConcatNode::new(
                    node_label.clone(),
                    input_stores,
                    shape.out_store_size,
                    shape.queue_capacity,
                ))
            }),
        );
        self.attach(first, node, InputSide::Left)?;
        self.attach(second, node, InputSide::Right)?;
        Ok(self.new_stream(node, arity, None, String::new()))
    }

    // ==========================================================================
    // Grouping
    // ==========================================================================

    /// Groups by the key facts, appending the collector result as a fact.
    ///
    /// No keys puts every tuple into a single group.
    pub fn group_by<C>(&mut self, stream: Stream, keys: Vec<TupleMapper<V>>, collector: C) -> Result<Stream>
    where
        C: Collector<V>,
        V: From<C::Result>,
    {
        let arity = keys.len() + 1;
        let result_fact: ResultFn<V, C::Result> = Arc::new(|result: C::Result| V::from(result));
        self.group(stream, GroupKeys::Keys(keys), Arc::new(collector), Some(result_fact), arity, "groupBy")
    }

    /// Groups by the key facts only; one output tuple per distinct key.
    pub fn group_by_key(&mut self, stream: Stream, keys: Vec<TupleMapper<V>>) -> Result<Stream> {
        if keys.is_empty() {
            return Err(BavetError::Build(
                "groupBy without a collector needs at least one key".to_string(),
            ));
        }
        let arity = keys.len();
        self.group(stream, GroupKeys::Keys(keys), Arc::new(NoCollector), None, arity, "groupBy")
    }

    /// Collapses equal tuples into one.
    pub fn distinct(&mut self, stream: Stream) -> Result<Stream> {
        let arity = self.info(stream)?.arity;
        self.group(stream, GroupKeys::WholeTuple, Arc::new(NoCollector), None, arity, "distinct")
    }

    fn group<C: Collector<V>>(
        &mut self,
        stream: Stream,
        keys: GroupKeys<V>,
        collector: Arc<C>,
        result_fact: Option<ResultFn<V, C::Result>>,
        arity: usize,
        kind: &str,
    ) -> Result<Stream> {
        let parent = self.producer(stream)?;
        let group_store = self.reserve(parent);
        let label = self.label(kind);
        let node_label = label.clone();
        let node = self.add_node(
            label,
            self.blueprints[parent].layer + 1,
            Arc::new(move |shape: NodeShape| -> Box<dyn Node<V, Sc>> {
                Box::new(GroupNode::new(
                    node_label.clone(),
                    keys.clone(),
                    Arc::clone(&collector),
                    result_fact.clone(),
                    group_store,
                    shape.out_store_size,
                    shape.queue_capacity,
                ))
            }),
        );
        self.attach(stream, node, InputSide::Single)?;
        Ok(self.new_stream(node, arity, None, String::new()))
    }

    // ==========================================================================
    // Scoring
    // ==========================================================================

    /// Every tuple of `stream` costs `weight`.
    pub fn penalize(&mut self, stream: Stream, name: &str, weight: Sc) -> Result<()> {
        self.score(stream, name, ImpactType::Penalty, weight, None)
    }

    /// Every tuple of `stream` earns `weight`.
    pub fn reward(&mut self, stream: Stream, name: &str, weight: Sc) -> Result<()> {
        self.score(stream, name, ImpactType::Reward, weight, None)
    }

    /// Every tuple of `stream` costs `weight` times its match weight.
    pub fn penalize_weighted<W>(&mut self, stream: Stream, name: &str, weight: Sc, weigher: W) -> Result<()>
    where
        W: Fn(&[Arc<V>]) -> i64 + Send + Sync + 'static,
    {
        self.score(stream, name, ImpactType::Penalty, weight, Some(Arc::new(weigher)))
    }

    /// Every tuple of `stream` earns `weight` times its match weight.
    pub fn reward_weighted<W>(&mut self, stream: Stream, name: &str, weight: Sc, weigher: W) -> Result<()>
    where
        W: Fn(&[Arc<V>]) -> i64 + Send + Sync + 'static,
    {
        self.score(stream, name, ImpactType::Reward, weight, Some(Arc::new(weigher)))
    }

    fn score(
        &mut self,
        stream: Stream,
        name: &str,
        impact_type: ImpactType,
        weight: Sc,
        weigher: Option<MatchWeigher<V>>,
    ) -> Result<()> {
        let constraint_ref = ConstraintRef::new(self.package.clone(), name);
        let full_name = constraint_ref.full_name();
        if self.constraints.iter().any(|c| c.constraint_ref == constraint_ref) {
            return Err(BavetError::Build(format!(
                "constraint ({}) is defined more than once",
                full_name
            )));
        }
        let parent = self.producer(stream)?;
        let undo_store = self.reserve(parent);
        let constraint = self.constraints.len();
        self.constraints.push(ConstraintDecl {
            constraint_ref,
            impact_type,
            weight,
        });
        let node_label = full_name.clone();
        let node = self.add_node(
            full_name,
            self.blueprints[parent].layer + 1,
            Arc::new(move |_: NodeShape| -> Box<dyn Node<V, Sc>> {
                Box::new(ScorerNode::new(
                    node_label.clone(),
                    constraint,
                    undo_store,
                    weigher.clone(),
                ))
            }),
        );
        self.attach(stream, node, InputSide::Single)
    }

    // ==========================================================================
    // Finishing
    // ==========================================================================

    /// Validates the layout and freezes it.
    pub fn build(self) -> Result<Arc<NetworkDefinition<V, Sc>>> {
        let Self {
            config,
            overrides,
            blueprints,
            links,
            sources,
            mut constraints,
            ..
        } = self;

        if sources.is_empty() {
            return Err(BavetError::Build("network has no forEach source".to_string()));
        }
        for name in overrides.names() {
            if !constraints.iter().any(|c| c.constraint_ref.is_named(name)) {
                warn!(event = "unknown_constraint_weight", constraint = name);
            }
        }
        for decl in &mut constraints {
            decl.weight = overrides.weight_or(&decl.constraint_ref.full_name(), decl.weight);
        }

        let layer_count = blueprints.iter().map(|bp| bp.layer).max().unwrap_or(0) + 1;
        let mut layers = vec![Vec::new(); layer_count];
        for (index, bp) in blueprints.iter().enumerate() {
            layers[bp.layer].push(index);
        }

        info!(
            event = "network_built",
            nodes = blueprints.len(),
            sources = sources.len(),
            constraints = constraints.len(),
            layers = layer_count,
            environment_mode = ?config.environment_mode,
        );

        Ok(Arc::new(NetworkDefinition {
            blueprints,
            links,
            sources,
            layers,
            constraints,
            config,
        }))
    }

    // ==========================================================================
    // Internals
    // ==========================================================================

    fn info(&self, stream: Stream) -> Result<&StreamInfo<V>> {
        self.streams
            .get(stream.id)
            .ok_or_else(|| BavetError::Build(format!("stream {} is not part of this builder", stream.id)))
    }

    fn producer(&self, stream: Stream) -> Result<usize> {
        Ok(self.info(stream)?.producer)
    }

    fn label(&self, kind: &str) -> String {
        format!("{}#{}", kind, self.blueprints.len())
    }

    fn new_stream(
        &mut self,
        producer: usize,
        arity: usize,
        filter: Option<TuplePredicate<V>>,
        filter_label: String,
    ) -> Stream {
        self.streams.push(StreamInfo {
            producer,
            arity,
            filter,
            filter_label,
        });
        Stream {
            id: self.streams.len() - 1,
        }
    }

    fn add_node(&mut self, label: String, layer: usize, factory: NodeFactory<V, Sc>) -> usize {
        self.blueprints.push(Blueprint {
            label,
            layer,
            out_store_size: 0,
            factory,
        });
        self.links.push(Vec::new());
        self.blueprints.len() - 1
    }

    /// Reserves the next slot on the output tuples of `producer`.
    fn reserve(&mut self, producer: usize) -> StoreIndex {
        let bp = &mut self.blueprints[producer];
        bp.out_store_size += 1;
        StoreIndex(bp.out_store_size - 1)
    }

    fn attach(&mut self, stream: Stream, node: usize, side: InputSide) -> Result<()> {
        let info = self.info(stream)?;
        let link = ChildLink {
            node,
            side,
            filter: info.filter.clone(),
            filter_label: info.filter_label.clone(),
        };
        let producer = info.producer;
        self.links[producer].push(link);
        Ok(())
    }
}

impl<V: Fact, Sc: ParseableScore> NetworkBuilder<V, Sc> {
    /// Applies a loaded configuration, parsing its weights as `Sc`.
    pub fn with_config(mut self, config: NetworkConfig) -> Result<Self> {
        let weights = config.parsed_weights::<Sc>()?;
        self.overrides.extend(weights);
        self.config = config;
        Ok(self)
    }
}
