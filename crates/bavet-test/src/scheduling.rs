//! Brute-force reference for a small shift-scheduling constraint set.
//!
//! The constraints, as the network tests declare them:
//! - `Overlap` (1hard): two shifts of the same employee overlap, counted once
//!   per unordered pair
//! - `Unassigned` (1soft): a shift without an employee
//! - `Load` (1soft, weighted): per employee, the square of their shift count
//! - `Idle` (1soft): an employee without any shift
//!
//! # Example
//!
//! ```
//! use bavet_core::HardSoftScore;
//! use bavet_test::scheduling::expected_score;
//! use bavet_test::Model;
//!
//! let facts = vec![
//!     Model::employee_fact(0),
//!     Model::shift(1, Some(0), 0, 8),
//!     Model::shift(2, Some(0), 4, 12),
//!     Model::shift(3, None, 0, 8),
//! ];
//! // one overlap; one unassigned, load 2*2
//! assert_eq!(expected_score(&facts), HardSoftScore::of(-1, -5));
//! ```

use std::collections::BTreeMap;

use bavet_core::HardSoftScore;
use rand::Rng;

use crate::Model;

/// Half-open intervals share at least one instant.
pub fn overlaps(a: (i64, i64), b: (i64, i64)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

pub fn overlapping_pairs(facts: &[Model]) -> usize {
    let shifts: Vec<&Model> = facts.iter().filter(|f| f.is_shift()).collect();
    let mut pairs = 0;
    for (i, a) in shifts.iter().enumerate() {
        for b in &shifts[i + 1..] {
            let same_employee = a.employee().is_some() && a.employee() == b.employee();
            if let (true, Some(ia), Some(ib)) = (same_employee, a.interval(), b.interval()) {
                if overlaps(ia, ib) {
                    pairs += 1;
                }
            }
        }
    }
    pairs
}

pub fn unassigned_count(facts: &[Model]) -> usize {
    facts
        .iter()
        .filter(|f| f.is_shift() && f.employee().is_none())
        .count()
}

/// Assigned shift count per employee id, for employees with at least one shift.
pub fn shifts_per_employee(facts: &[Model]) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for employee in facts.iter().filter_map(Model::employee) {
        *counts.entry(employee).or_insert(0) += 1;
    }
    counts
}

pub fn idle_employees(facts: &[Model]) -> usize {
    let busy = shifts_per_employee(facts);
    facts
        .iter()
        .filter(|f| f.is_employee())
        .filter(|f| f.id().is_some_and(|id| !busy.contains_key(&id)))
        .count()
}

pub fn expected_score(facts: &[Model]) -> HardSoftScore {
    let load: i64 = shifts_per_employee(facts)
        .values()
        .map(|&n| (n * n) as i64)
        .sum();
    let soft = unassigned_count(facts) as i64 + load + idle_employees(facts) as i64;
    HardSoftScore::of(-(overlapping_pairs(facts) as i64), -soft)
}

/// A shift with a random slot in a 24-hour day and a random assignment.
pub fn random_shift<R: Rng>(rng: &mut R, id: usize, employees: usize) -> Model {
    let start = rng.random_range(0..20);
    let length = rng.random_range(1..=6);
    let employee = if employees == 0 || rng.random_bool(0.2) {
        None
    } else {
        Some(rng.random_range(0..employees))
    };
    Model::shift(id, employee, start, start + length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touching_shifts_do_not_overlap() {
        assert!(!overlaps((0, 8), (8, 16)));
        assert!(overlaps((0, 9), (8, 16)));
    }

    #[test]
    fn test_idle_counts_only_known_employees() {
        let facts = vec![
            Model::employee_fact(0),
            Model::employee_fact(1),
            Model::shift(1, Some(1), 0, 4),
            Model::shift(2, Some(5), 0, 4),
        ];
        assert_eq!(idle_employees(&facts), 1);
        assert_eq!(shifts_per_employee(&facts).len(), 2);
    }
}
