//! Bavet: an incremental constraint-evaluation network.
//!
//! Facts enter through source nodes and flow as tuples through filter, map,
//! join, group, flatten and if-exists nodes down to scorer nodes, which keep
//! a running score. After the first calculation only the changed tuples are
//! propagated, so the cost of a score update follows the size of the change
//! rather than the size of the fact set.
//!
//! The pieces:
//! - [`builder::NetworkBuilder`] declares streams and constraints and
//!   produces a shared [`definition::NetworkDefinition`]
//! - [`network::NodeNetwork`] is one working instance with
//!   insert/update/retract and `calculate_score`
//! - [`node`] holds one implementation per stream operation, all speaking
//!   the [`lifecycle`] contract
//! - [`score`] keeps per-constraint totals and explanations

pub mod builder;
pub mod collector;
pub mod definition;
pub mod fact;
mod guard;
pub mod index;
pub mod joiner;
pub mod lifecycle;
pub mod network;
pub mod node;
pub mod queue;
pub mod score;
pub mod tuple;

#[cfg(test)]
mod tests;

pub use builder::{NetworkBuilder, Stream};
pub use definition::NetworkDefinition;
pub use fact::{mapper, Fact, FactHandle};
pub use network::{FlushStats, NodeNetwork};
pub use score::{
    ConstraintAnalysis, ConstraintMatch, ConstraintWeightOverrides, Indictment, ScoreExplanation,
};

/// Everything needed to declare and run a network.
pub mod prelude {
    pub use crate::builder::{NetworkBuilder, Stream};
    pub use crate::collector::{count, max, min, sum};
    pub use crate::fact::{mapper, Fact, FactHandle};
    pub use crate::joiner::{
        equal, equal_by, filtering, greater_than, greater_than_or_equal, less_than,
        less_than_or_equal, Joiner,
    };
    pub use crate::network::NodeNetwork;
    pub use bavet_core::{
        BavetError, ConstraintRef, HardMediumSoftScore, HardSoftScore, Score, SimpleScore,
    };
}
