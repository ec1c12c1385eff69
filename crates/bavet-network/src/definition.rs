//! Immutable description of a built network, shared by all its instances.

use std::sync::Arc;

use bavet_config::NetworkConfig;
use bavet_core::{ConstraintRef, ImpactType, Score};

use crate::fact::Fact;
use crate::lifecycle::{ChildLink, Node};
use crate::network::NodeNetwork;

/// Sizes handed to a node factory when an instance is created.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeShape {
    pub(crate) out_store_size: usize,
    pub(crate) queue_capacity: usize,
}

pub(crate) type NodeFactory<V, Sc> = Arc<dyn Fn(NodeShape) -> Box<dyn Node<V, Sc>> + Send + Sync>;

/// One node of the definition.
pub(crate) struct Blueprint<V: Fact, Sc: Score> {
    pub(crate) label: String,
    pub(crate) layer: usize,
    /// Slots reserved on this node's output tuples by its consumers.
    pub(crate) out_store_size: usize,
    pub(crate) factory: NodeFactory<V, Sc>,
}

pub(crate) struct ConstraintDecl<Sc: Score> {
    pub(crate) constraint_ref: ConstraintRef,
    pub(crate) impact_type: ImpactType,
    pub(crate) weight: Sc,
}

/// A validated network layout.
///
/// Build once with [`NetworkBuilder`](crate::builder::NetworkBuilder), then
/// call [`instantiate`](Self::instantiate) for every independent working
/// copy. Instances share nothing but this definition.
pub struct NetworkDefinition<V: Fact, Sc: Score> {
    pub(crate) blueprints: Vec<Blueprint<V, Sc>>,
    pub(crate) links: Vec<Vec<ChildLink<V>>>,
    pub(crate) sources: Vec<usize>,
    /// Node indices per layer; layer 0 holds the sources.
    pub(crate) layers: Vec<Vec<usize>>,
    pub(crate) constraints: Vec<ConstraintDecl<Sc>>,
    pub(crate) config: NetworkConfig,
}

impl<V: Fact, Sc: Score> NetworkDefinition<V, Sc> {
    /// Creates an empty network instance using the configured environment mode.
    pub fn instantiate(self: &Arc<Self>) -> NodeNetwork<V, Sc> {
        NodeNetwork::new(Arc::clone(self), self.config.environment_mode)
    }

    pub(crate) fn create_nodes(&self) -> Vec<Box<dyn Node<V, Sc>>> {
        let queue_capacity = self.config.initial_queue_capacity;
        self.blueprints
            .iter()
            .map(|bp| {
                (bp.factory)(NodeShape {
                    out_store_size: bp.out_store_size,
                    queue_capacity,
                })
            })
            .collect()
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.blueprints.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn node_labels(&self) -> impl Iterator<Item = &str> {
        self.blueprints.iter().map(|bp| bp.label.as_str())
    }

    pub fn constraint_refs(&self) -> impl Iterator<Item = &ConstraintRef> {
        self.constraints.iter().map(|c| &c.constraint_ref)
    }

    /// Effective weight of a constraint, after overrides.
    pub fn constraint_weight(&self, full_name: &str) -> Option<Sc> {
        self.constraints
            .iter()
            .find(|c| c.constraint_ref.is_named(full_name))
            .map(|c| c.weight)
    }
}
