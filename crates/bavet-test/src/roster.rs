//! Brute-force reference for a roster constraint set that runs through the
//! reshaping streams (map, flatten, concat, distinct) and the min, max, sum
//! and count collectors.
//!
//! Teams are [`Model::Bag`] facts whose items are employee facts. The
//! constraints, all soft, as the network tests declare them:
//! - `Span` (1soft, weighted): per employee, latest shift end minus earliest
//!   shift start
//! - `Slots` (3soft): distinct `(employee, start)` pairs among assigned shifts
//! - `Overtime` (2soft, weighted): per employee, hours above
//!   [`REGULAR_HOURS`]; employees within the limit score nothing
//! - `Presence` (1soft, weighted): per employee id, the square of how often
//!   it is listed, as an employee fact or as a team member
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bavet_core::HardSoftScore;
//! use bavet_test::roster::expected_constraint_scores;
//! use bavet_test::Model;
//!
//! let facts = vec![
//!     Model::employee_fact(0),
//!     Model::bag(9, vec![Arc::new(Model::employee_fact(0))]),
//!     Model::shift(1, Some(0), 0, 6),
//!     Model::shift(2, Some(0), 7, 12),
//! ];
//! let scores = expected_constraint_scores(&facts);
//! assert_eq!(scores[0], ("Span", HardSoftScore::of_soft(-12)));
//! assert_eq!(scores[1], ("Slots", HardSoftScore::of_soft(-6)));
//! assert_eq!(scores[2], ("Overtime", HardSoftScore::of_soft(-6)));
//! assert_eq!(scores[3], ("Presence", HardSoftScore::of_soft(-4)));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bavet_core::HardSoftScore;
use rand::Rng;

use crate::Model;

/// Hours an employee works before overtime starts.
pub const REGULAR_HOURS: i64 = 8;

fn assigned(facts: &[Model]) -> impl Iterator<Item = (usize, (i64, i64))> + '_ {
    facts
        .iter()
        .filter_map(|f| Some((f.employee()?, f.interval()?)))
}

/// `(earliest start, latest end)` per employee with assigned shifts.
pub fn spans(facts: &[Model]) -> BTreeMap<usize, (i64, i64)> {
    let mut spans: BTreeMap<usize, (i64, i64)> = BTreeMap::new();
    for (employee, (start, end)) in assigned(facts) {
        spans
            .entry(employee)
            .and_modify(|(first, last)| {
                *first = (*first).min(start);
                *last = (*last).max(end);
            })
            .or_insert((start, end));
    }
    spans
}

pub fn distinct_slots(facts: &[Model]) -> usize {
    assigned(facts)
        .map(|(employee, (start, _))| (employee, start))
        .collect::<BTreeSet<_>>()
        .len()
}

/// Total assigned hours per employee.
pub fn hours(facts: &[Model]) -> BTreeMap<usize, i64> {
    let mut hours = BTreeMap::new();
    for (employee, (start, end)) in assigned(facts) {
        *hours.entry(employee).or_insert(0) += end - start;
    }
    hours
}

/// How often each employee id is listed, directly or as a team member.
pub fn listings(facts: &[Model]) -> BTreeMap<usize, i64> {
    let mut listings = BTreeMap::new();
    let members = facts
        .iter()
        .filter(|f| f.is_bag())
        .flat_map(Model::items);
    let listed = facts
        .iter()
        .filter(|f| f.is_employee())
        .cloned()
        .chain(members.map(|item| Model::clone(&item)));
    for id in listed.filter_map(|f| f.id()) {
        *listings.entry(id).or_insert(0) += 1;
    }
    listings
}

/// Score of every roster constraint, in declaration order.
pub fn expected_constraint_scores(facts: &[Model]) -> Vec<(&'static str, HardSoftScore)> {
    let span: i64 = spans(facts).values().map(|(first, last)| last - first).sum();
    let slots = distinct_slots(facts) as i64;
    let overtime: i64 = hours(facts)
        .values()
        .filter(|&&h| h > REGULAR_HOURS)
        .map(|h| h - REGULAR_HOURS)
        .sum();
    let presence: i64 = listings(facts).values().map(|n| n * n).sum();
    vec![
        ("Span", HardSoftScore::of_soft(-span)),
        ("Slots", HardSoftScore::of_soft(-3 * slots)),
        ("Overtime", HardSoftScore::of_soft(-2 * overtime)),
        ("Presence", HardSoftScore::of_soft(-presence)),
    ]
}

pub fn expected_score(facts: &[Model]) -> HardSoftScore {
    expected_constraint_scores(facts)
        .into_iter()
        .fold(HardSoftScore::ZERO, |total, (_, score)| total + score)
}

/// A team of up to three members, possibly repeating one, drawn from
/// `employees + 1` ids so that some members have no employee fact.
pub fn random_team<R: Rng>(rng: &mut R, id: usize, employees: usize) -> Model {
    let size = rng.random_range(0..=3);
    let members = (0..size)
        .map(|_| Arc::new(Model::employee_fact(rng.random_range(0..=employees))))
        .collect();
    Model::bag(id, members)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overtime_ignores_regular_hours() {
        let facts = vec![
            Model::shift(1, Some(0), 0, 8),
            Model::shift(2, Some(1), 0, 6),
            Model::shift(3, Some(1), 10, 14),
            Model::shift(4, None, 0, 20),
        ];
        assert_eq!(hours(&facts), BTreeMap::from([(0, 8), (1, 10)]));
        assert_eq!(expected_constraint_scores(&facts)[2].1, HardSoftScore::of_soft(-4));
    }

    #[test]
    fn test_repeated_member_counts_twice() {
        let member = Arc::new(Model::employee_fact(2));
        let facts = vec![Model::bag(1, vec![Arc::clone(&member), member])];
        assert_eq!(listings(&facts), BTreeMap::from([(2, 2)]));
    }

    #[test]
    fn test_same_start_is_one_slot() {
        let facts = vec![
            Model::shift(1, Some(0), 4, 8),
            Model::shift(2, Some(0), 4, 6),
            Model::shift(3, Some(1), 4, 6),
        ];
        assert_eq!(distinct_slots(&facts), 2);
        assert_eq!(spans(&facts)[&0], (4, 8));
    }
}
