//! Error types for the Bavet network

use thiserror::Error;

/// Main error type for Bavet operations.
///
/// Two classes of failure exist. User-code faults (`UserCode`, `Impact`) come
/// from closures handed to the network at construction time. Everything else
/// signals that the network itself reached a state it must never reach, or
/// that it was asked to do something it cannot do. Any error poisons the
/// network instance that raised it.
#[derive(Debug, Error)]
pub enum BavetError {
    /// A predicate, key extractor, collector or mapping function panicked.
    #[error("User code failed in {site}: {message}")]
    UserCode { site: String, message: String },

    /// Computing the score impact of a match failed.
    #[error("Constraint ({constraint}) failed to impact the score for tuple {tuple}: {message}")]
    Impact {
        constraint: String,
        tuple: String,
        message: String,
    },

    /// Internal state machine violation (double insert, unexpected state, stale tuple).
    #[error("{0}")]
    InvariantViolation(String),

    /// A fact handle that the network does not know about.
    #[error("Unknown fact handle: {0}")]
    UnknownFact(u64),

    /// The network definition is malformed.
    #[error("Network build error: {0}")]
    Build(String),

    /// A previous operation failed; the network no longer accepts operations.
    #[error("The network is poisoned by an earlier error and must be discarded")]
    Poisoned,

    /// Incremental score differs from the from-scratch score.
    #[error("Score corruption: incremental score ({actual}) differs from from-scratch score ({expected})")]
    ScoreCorruption { expected: String, actual: String },

    /// Error in network configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BavetError {
    /// Creates an invariant violation with the conventional "Impossible state" prefix.
    pub fn impossible(message: impl std::fmt::Display) -> Self {
        BavetError::InvariantViolation(format!("Impossible state: {}", message))
    }

    /// Returns true for faults raised by user-supplied closures.
    pub fn is_user_fault(&self) -> bool {
        matches!(self, BavetError::UserCode { .. } | BavetError::Impact { .. })
    }
}

/// Result type alias for Bavet operations
pub type Result<T> = std::result::Result<T, BavetError>;
