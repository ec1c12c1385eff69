//! The score abstraction the network is generic over.

use std::fmt::{Debug, Display};
use std::ops::{Add, Neg, Sub};

use thiserror::Error;

/// A totally ordered, exactly invertible score.
///
/// The network only ever adds, subtracts and scales scores. Levels are listed
/// most significant first; the first `HARD_LEVELS` of them are hard levels.
pub trait Score:
    Copy
    + Debug
    + Display
    + Default
    + Send
    + Sync
    + Eq
    + Ord
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Number of leading levels that count as hard.
    const HARD_LEVELS: usize;

    fn zero() -> Self;

    /// Multiplies every level by an integer match weight.
    fn scale(&self, factor: i64) -> Self;

    /// `scale` that returns `None` when any level overflows.
    fn checked_scale(&self, factor: i64) -> Option<Self>;

    fn checked_add(&self, other: Self) -> Option<Self>;

    fn checked_sub(&self, other: Self) -> Option<Self>;

    /// Level-wise addition clamped to the `i64` range. Only for reporting.
    fn saturating_add(&self, other: Self) -> Self;

    fn levels(&self) -> Vec<i64>;

    /// True when no hard level is negative.
    fn is_feasible(&self) -> bool {
        self.levels()
            .iter()
            .take(Self::HARD_LEVELS)
            .all(|level| *level >= 0)
    }

    /// True when the most significant non-zero level is a hard level.
    fn is_hard(&self) -> bool {
        self.levels()
            .iter()
            .position(|level| *level != 0)
            .is_some_and(|index| index < Self::HARD_LEVELS)
    }
}

/// A score that round-trips through its textual form, e.g. `-1hard/-20soft`.
///
/// Constraint weights in configuration files are written this way.
pub trait ParseableScore: Score {
    fn parse(text: &str) -> Result<Self, ScoreParseError>;

    fn to_string_repr(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreParseError {
    #[error("{score} '{text}' has {found} levels, expected {expected}")]
    LevelCount {
        score: &'static str,
        text: String,
        found: usize,
        expected: usize,
    },

    #[error("{score} level '{part}' does not end with '{label}'")]
    MissingLabel {
        score: &'static str,
        part: String,
        label: &'static str,
    },

    #[error("{score} level '{part}' is not an integer")]
    NotAnInteger { score: &'static str, part: String },
}
