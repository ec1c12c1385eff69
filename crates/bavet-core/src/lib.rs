//! Bavet Core - Shared types for the incremental constraint network
//!
//! This crate provides the vocabulary every other Bavet crate speaks:
//! - Score types for representing solution quality
//! - Constraint identity and impact direction
//! - The error type reported by the network

pub mod constraint;
pub mod error;
pub mod score;

pub use constraint::{ConstraintRef, ConstraintRefError, ImpactType};
pub use error::{BavetError, Result};
pub use score::{
    HardMediumSoftScore, HardSoftScore, ParseableScore, Score, ScoreParseError, SimpleScore,
};
