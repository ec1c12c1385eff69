//! Score types for representing solution quality
//!
//! Scores are what the network's scorer nodes add up. Every score type is an
//! immutable `Copy` value of one or more `i64` levels, compared level by level
//! from the most significant one. Arithmetic is exact and component-wise, so
//! an impact is undone by subtracting it again.

#[macro_use]
mod levels;
mod traits;


pub use traits::{ParseableScore, Score, ScoreParseError};

score_type! {
    /// A single-level score.
    ///
    /// ```
    /// use bavet_core::{ParseableScore, SimpleScore};
    ///
    /// assert_eq!(SimpleScore::parse("-3").unwrap(), SimpleScore::of(-3));
    /// assert!(SimpleScore::of(1) > SimpleScore::of(-1));
    /// ```
    SimpleScore { score => "" }, hard_levels = 0
}

score_type! {
    /// A score with a hard level and a soft level.
    ///
    /// Hard levels decide feasibility; the soft level only breaks ties.
    ///
    /// ```
    /// use bavet_core::HardSoftScore;
    ///
    /// let broken = HardSoftScore::of(-1, 0);
    /// let poor = HardSoftScore::of(0, -500);
    /// assert!(poor > broken);
    /// assert_eq!(poor.to_string(), "0hard/-500soft");
    /// ```
    HardSoftScore { hard => "hard", soft => "soft" }, hard_levels = 1
}

score_type! {
    /// A score with hard, medium and soft levels.
    HardMediumSoftScore { hard => "hard", medium => "medium", soft => "soft" }, hard_levels = 1
}

impl SimpleScore {
    pub const ONE: SimpleScore = SimpleScore::of(1);
}

impl HardSoftScore {
    pub const ONE_HARD: HardSoftScore = HardSoftScore::of(1, 0);
    pub const ONE_SOFT: HardSoftScore = HardSoftScore::of(0, 1);

    pub const fn of_hard(hard: i64) -> Self {
        HardSoftScore::of(hard, 0)
    }

    pub const fn of_soft(soft: i64) -> Self {
        HardSoftScore::of(0, soft)
    }
}

impl HardMediumSoftScore {
    pub const ONE_HARD: HardMediumSoftScore = HardMediumSoftScore::of(1, 0, 0);
    pub const ONE_MEDIUM: HardMediumSoftScore = HardMediumSoftScore::of(0, 1, 0);
    pub const ONE_SOFT: HardMediumSoftScore = HardMediumSoftScore::of(0, 0, 1);

    pub const fn of_hard(hard: i64) -> Self {
        HardMediumSoftScore::of(hard, 0, 0)
    }

    pub const fn of_medium(medium: i64) -> Self {
        HardMediumSoftScore::of(0, medium, 0)
    }

    pub const fn of_soft(soft: i64) -> Self {
        HardMediumSoftScore::of(0, 0, soft)
    }
}
