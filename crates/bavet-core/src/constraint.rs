//! Constraint identity and impact direction.
//!
//! A constraint is known by its package and name. Configuration files and
//! log events use the joined `package/name` form, which [`ConstraintRef`]
//! parses back.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::score::Score;

/// Reference to a constraint for identification.
///
/// Ordered by package, then by name.
///
/// # Example
///
/// ```
/// use bavet_core::ConstraintRef;
///
/// let cr = ConstraintRef::new("scheduling", "NoOverlap");
/// assert_eq!(cr.full_name(), "scheduling/NoOverlap");
/// assert_eq!("scheduling/NoOverlap".parse::<ConstraintRef>().unwrap(), cr);
///
/// let simple = ConstraintRef::new("", "Simple");
/// assert_eq!(simple.full_name(), "Simple");
/// assert!(simple.is_named("Simple"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintRef {
    /// Package/module containing the constraint.
    pub package: String,
    /// Name of the constraint.
    pub name: String,
}

/// A full constraint name that does not name a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintRefError {
    #[error("constraint name is empty")]
    EmptyName,

    #[error("constraint name '{0}' ends with a package separator")]
    MissingName(String),
}

impl ConstraintRef {
    /// Creates a new constraint reference.
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Splits `package/name` at the last `/`. Without a separator the whole
    /// string is the name and the package is empty.
    pub fn parse(full_name: &str) -> Result<Self, ConstraintRefError> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(ConstraintRefError::EmptyName);
        }
        match full_name.rsplit_once('/') {
            Some((_, "")) => Err(ConstraintRefError::MissingName(full_name.to_string())),
            Some((package, name)) => Ok(Self::new(package, name)),
            None => Ok(Self::new("", full_name)),
        }
    }

    /// Returns the fully qualified name.
    pub fn full_name(&self) -> String {
        self.to_string()
    }

    /// Compares against a full name without allocating one.
    pub fn is_named(&self, full_name: &str) -> bool {
        if self.package.is_empty() {
            return full_name == self.name;
        }
        full_name
            .strip_prefix(self.package.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            == Some(self.name.as_str())
    }
}

impl FromStr for ConstraintRef {
    type Err = ConstraintRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConstraintRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.package, self.name)
        }
    }
}

/// Type of impact a constraint has on the score.
///
/// # Example
///
/// ```
/// use bavet_core::{HardSoftScore, ImpactType};
///
/// let weight = HardSoftScore::of_soft(3);
/// assert_eq!(ImpactType::Penalty.impact(weight, 2), Some(HardSoftScore::of_soft(-6)));
/// assert_eq!(ImpactType::Reward.impact(weight, 2), Some(HardSoftScore::of_soft(6)));
/// assert_eq!(ImpactType::Penalty.impact(weight, i64::MAX), None);
/// assert_eq!(ImpactType::Penalty.to_string(), "penalty");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ImpactType {
    /// Penalize (subtract from score).
    Penalty,
    /// Reward (add to score).
    Reward,
}

impl ImpactType {
    /// Returns the factor applied to the constraint weight.
    pub const fn sign(self) -> i64 {
        match self {
            ImpactType::Penalty => -1,
            ImpactType::Reward => 1,
        }
    }

    /// Signed score of one match: `weight` times `match_weight`, negated for
    /// a penalty. `None` when any level leaves the `i64` range.
    pub fn impact<Sc: Score>(self, weight: Sc, match_weight: i64) -> Option<Sc> {
        let factor = self.sign().checked_mul(match_weight)?;
        weight.checked_scale(factor)
    }
}

impl fmt::Display for ImpactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImpactType::Penalty => "penalty",
            ImpactType::Reward => "reward",
        })
    }
}
