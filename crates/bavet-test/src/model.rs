//! Fact enum shared by the network tests.
//!
//! # Example
//!
//! ```
//! use bavet_test::Model;
//!
//! let shift = Model::shift(1, Some(7), 0, 8);
//! assert_eq!(shift.employee(), Some(7));
//! assert_eq!(Model::from(3usize), Model::Int(3));
//! ```

use std::sync::Arc;

/// Every kind of fact the test networks see.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Model {
    Employee { id: usize },
    /// A shift over `[start, end)`, optionally assigned.
    Shift {
        id: usize,
        employee: Option<usize>,
        start: i64,
        end: i64,
    },
    /// A container whose items are expanded by flatten tests.
    Bag { id: usize, items: Vec<Arc<Model>> },
    Int(i64),
    /// Result of a collector over an empty group.
    Missing,
}

impl Model {
    pub fn employee_fact(id: usize) -> Self {
        Model::Employee { id }
    }

    pub fn shift(id: usize, employee: Option<usize>, start: i64, end: i64) -> Self {
        Model::Shift {
            id,
            employee,
            start,
            end,
        }
    }

    pub fn bag(id: usize, items: Vec<Arc<Model>>) -> Self {
        Model::Bag { id, items }
    }

    pub fn is_employee(&self) -> bool {
        matches!(self, Model::Employee { .. })
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, Model::Shift { .. })
    }

    pub fn is_bag(&self) -> bool {
        matches!(self, Model::Bag { .. })
    }

    /// Id of an employee, shift or bag.
    pub fn id(&self) -> Option<usize> {
        match self {
            Model::Employee { id } | Model::Shift { id, .. } | Model::Bag { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Employee assigned to a shift.
    pub fn employee(&self) -> Option<usize> {
        match self {
            Model::Shift { employee, .. } => *employee,
            _ => None,
        }
    }

    /// `(start, end)` of a shift.
    pub fn interval(&self) -> Option<(i64, i64)> {
        match self {
            Model::Shift { start, end, .. } => Some((*start, *end)),
            _ => None,
        }
    }

    pub fn items(&self) -> Vec<Arc<Model>> {
        match self {
            Model::Bag { items, .. } => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn int(&self) -> Option<i64> {
        match self {
            Model::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<usize> for Model {
    fn from(value: usize) -> Self {
        Model::Int(value as i64)
    }
}

impl From<i64> for Model {
    fn from(value: i64) -> Self {
        Model::Int(value)
    }
}

impl From<Option<i64>> for Model {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Model::Missing, Model::Int)
    }
}

impl From<Option<usize>> for Model {
    fn from(value: Option<usize>) -> Self {
        value.map_or(Model::Missing, Model::from)
    }
}
