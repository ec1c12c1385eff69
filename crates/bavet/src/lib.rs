//! Bavet - an incremental constraint-evaluation network in Rust
//!
//! Declare constraint streams once, then feed facts in and read scores out.
//! Only the tuples touched by a change are recomputed.
//!
//! # Example
//!
//! ```rust
//! use bavet::prelude::*;
//! use std::sync::Arc;
//!
//! let mut builder = NetworkBuilder::<i64, HardSoftScore>::new().with_package("demo");
//! let values = builder.for_each("i64", |_: &i64| true);
//! let odd = builder.filter(values, |t: &[Arc<i64>]| *t[0] % 2 != 0).unwrap();
//! builder.penalize(odd, "Odd", HardSoftScore::ONE_SOFT).unwrap();
//!
//! let mut network = builder.build().unwrap().instantiate();
//! let three = network.insert(3).unwrap();
//! network.insert(4).unwrap();
//! assert_eq!(network.calculate_score().unwrap(), HardSoftScore::of(0, -1));
//!
//! network.update(three, 6).unwrap();
//! assert_eq!(network.calculate_score().unwrap(), HardSoftScore::ZERO);
//! ```

pub mod logging;

// Score types and errors
pub use bavet_core::{
    BavetError, ConstraintRef, HardMediumSoftScore, HardSoftScore, ImpactType, ParseableScore,
    Result, Score, SimpleScore,
};

// Configuration
pub use bavet_config::{ConfigError, EnvironmentMode, NetworkConfig};

// Network
pub use bavet_network::{
    collector, joiner, ConstraintAnalysis, ConstraintMatch, ConstraintWeightOverrides, Fact,
    FactHandle, FlushStats, Indictment, NetworkBuilder, NetworkDefinition, NodeNetwork,
    ScoreExplanation, Stream,
};

pub mod prelude {
    pub use bavet_network::prelude::*;

    pub use super::{EnvironmentMode, NetworkConfig};
}
