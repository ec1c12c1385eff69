//! Lifecycle scenarios through whole networks: filters on links, indexed
//! joins, class membership changes and poisoning.

use std::sync::Arc;

use bavet_config::EnvironmentMode;
use bavet_core::{BavetError, HardSoftScore, SimpleScore};
use bavet_test::Model;

use crate::builder::NetworkBuilder;
use crate::fact::FactHandle;
use crate::joiner::{equal, equal_by};

fn positive(t: &[Arc<Model>]) -> bool {
    t[0].int().is_some_and(|v| v > 0)
}

// ============================================================================
// Filter
// ============================================================================

#[test]
fn test_filter_scenario() {
    let mut builder = NetworkBuilder::<Model, SimpleScore>::new()
        .with_environment_mode(EnvironmentMode::FastAssert);
    let ints = builder.for_each("Int", |m: &Model| m.int().is_some());
    let positives = builder.filter(ints, positive).unwrap();
    builder.penalize(positives, "Positive", SimpleScore::of(1)).unwrap();
    let mut network = builder.build().unwrap().instantiate();

    let a = network.insert(Model::Int(5)).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(-1));
    assert_eq!(network.tuple_count(), 1);

    network.update(a, Model::Int(-5)).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(0));
    assert_eq!(network.explain().total_match_count(), 0);

    network.retract(a).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(0));
    assert_eq!(network.tuple_count(), 0);
}

#[test]
fn test_chained_filters_combine() {
    let mut builder = NetworkBuilder::<Model, SimpleScore>::new();
    let ints = builder.for_each("Int", |m: &Model| m.int().is_some());
    let positives = builder.filter(ints, positive).unwrap();
    let even = builder
        .filter(positives, |t: &[Arc<Model>]| t[0].int().is_some_and(|v| v % 2 == 0))
        .unwrap();
    builder.penalize(even, "Positive even", SimpleScore::of(1)).unwrap();
    let definition = builder.build().unwrap();
    assert_eq!(definition.node_count(), 2);

    let mut network = definition.instantiate();
    for v in [-4, -1, 1, 2, 3, 4] {
        network.insert(Model::Int(v)).unwrap();
    }
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(-2));
}

// ============================================================================
// Indexed join
// ============================================================================

#[test]
fn test_indexed_join_key_change_retracts_pair() {
    let mut builder = NetworkBuilder::<Model, SimpleScore>::new()
        .with_environment_mode(EnvironmentMode::FastAssert);
    let shifts = builder.for_each("Shift", Model::is_shift);
    let employees = builder.for_each("Employee", Model::is_employee);
    let pairs = builder
        .join(
            shifts,
            employees,
            vec![equal(super::employee_key, super::id_key)],
        )
        .unwrap();
    builder.penalize(pairs, "Assigned", SimpleScore::of(1)).unwrap();
    let mut network = builder.build().unwrap().instantiate();

    let shift = network.insert(Model::shift(1, Some(0), 0, 8)).unwrap();
    let employee = network.insert(Model::employee_fact(0)).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(-1));
    assert_eq!(network.tuple_count(), 3);

    network.update(shift, Model::shift(1, Some(1), 0, 8)).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(0));
    assert_eq!(network.tuple_count(), 2);

    network.update(shift, Model::shift(1, Some(0), 0, 8)).unwrap();
    network.calculate_score().unwrap();
    network.update(employee, Model::employee_fact(9)).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(0));
    assert_eq!(network.tuple_count(), 2);
}

#[test]
fn test_same_key_update_keeps_pair() {
    let mut builder = NetworkBuilder::<Model, SimpleScore>::new();
    let shifts = builder.for_each("Shift", Model::is_shift);
    let pairs = builder
        .join(shifts, shifts, vec![equal_by(super::employee_key)])
        .unwrap();
    builder
        .penalize_weighted(pairs, "Length", SimpleScore::of(1), |t: &[Arc<Model>]| {
            t[0].interval().map_or(0, |(s, e)| e - s)
        })
        .unwrap();
    let mut network = builder.build().unwrap().instantiate();

    let shift = network.insert(Model::shift(1, Some(0), 0, 8)).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(-8));

    network.update(shift, Model::shift(1, Some(0), 0, 3)).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(-3));
    let stats = network.last_flush_stats();
    assert_eq!(stats.inserts, 0);
    assert_eq!(stats.retracts, 0);
}

// ============================================================================
// Class membership
// ============================================================================

#[test]
fn test_update_across_classes() {
    let mut builder = NetworkBuilder::<Model, SimpleScore>::new()
        .with_environment_mode(EnvironmentMode::FullAssert);
    let shifts = builder.for_each("Shift", Model::is_shift);
    let employees = builder.for_each("Employee", Model::is_employee);
    builder.penalize(shifts, "Shift", SimpleScore::of(1)).unwrap();
    builder.reward(employees, "Employee", SimpleScore::of(10)).unwrap();
    let mut network = builder.build().unwrap().instantiate();

    let handle = network.insert(Model::shift(1, None, 0, 1)).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(-1));

    network.update(handle, Model::employee_fact(1)).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(10));
    assert_eq!(network.tuple_count(), 1);

    network.update(handle, Model::Missing).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(0));
    assert_eq!(network.tuple_count(), 0);
    assert_eq!(network.get(handle).map(|f| f.as_ref()), Some(&Model::Missing));
}

// ============================================================================
// Errors and poisoning
// ============================================================================

#[test]
fn test_unknown_handle_poisons() {
    let mut builder = NetworkBuilder::<Model, SimpleScore>::new();
    let ints = builder.for_each("Int", |m: &Model| m.int().is_some());
    builder.penalize(ints, "Int", SimpleScore::of(1)).unwrap();
    let mut network = builder.build().unwrap().instantiate();

    let handle = network.insert(Model::Int(1)).unwrap();
    network.retract(handle).unwrap();
    assert!(matches!(
        network.retract(handle),
        Err(BavetError::UnknownFact(id)) if id == handle.id()
    ));
    assert!(network.is_poisoned());
    assert!(matches!(network.insert(Model::Int(2)), Err(BavetError::Poisoned)));
    assert!(matches!(network.calculate_score(), Err(BavetError::Poisoned)));
}

#[test]
fn test_panicking_filter_poisons() {
    let mut builder = NetworkBuilder::<Model, SimpleScore>::new();
    let ints = builder.for_each("Int", |m: &Model| m.int().is_some());
    let checked = builder
        .filter(ints, |t: &[Arc<Model>]| -> bool {
            if t[0].int() == Some(13) {
                panic!("unlucky");
            }
            true
        })
        .unwrap();
    builder.penalize(checked, "Checked", SimpleScore::of(1)).unwrap();
    let mut network = builder.build().unwrap().instantiate();

    network.insert(Model::Int(1)).unwrap();
    assert_eq!(network.calculate_score().unwrap(), SimpleScore::of(-1));

    network.insert(Model::Int(13)).unwrap();
    match network.calculate_score() {
        Err(BavetError::UserCode { site, message }) => {
            assert!(site.contains("filter#"), "{}", site);
            assert!(site.contains("Int(13)"), "{}", site);
            assert_eq!(message, "unlucky");
        }
        other => panic!("expected a user code error, got {:?}", other),
    }
    assert!(matches!(network.update(FactHandle(0), Model::Int(2)), Err(BavetError::Poisoned)));
}

#[test]
fn test_panicking_weigher_names_constraint() {
    let mut builder = NetworkBuilder::<Model, SimpleScore>::new().with_package("demo");
    let ints = builder.for_each("Int", |m: &Model| m.int().is_some());
    builder
        .penalize_weighted(ints, "Weighted", SimpleScore::of(1), |t: &[Arc<Model>]| -> i64 {
            t[0].int().filter(|v| *v >= 0).unwrap_or_else(|| panic!("negative weight"))
        })
        .unwrap();
    let mut network = builder.build().unwrap().instantiate();

    network.insert(Model::Int(-1)).unwrap();
    match network.calculate_score() {
        Err(BavetError::Impact { constraint, tuple, message }) => {
            assert_eq!(constraint, "demo/Weighted");
            assert!(tuple.contains("Int(-1)"), "{}", tuple);
            assert_eq!(message, "negative weight");
        }
        other => panic!("expected an impact error, got {:?}", other),
    }
    assert!(network.is_poisoned());
}

#[test]
fn test_overflowing_weight_poisons_instead_of_panicking() {
    let mut builder = NetworkBuilder::<Model, HardSoftScore>::new().with_package("scheduling");
    let shifts = builder.for_each("Shift", Model::is_shift);
    builder
        .penalize_weighted(shifts, "Big", HardSoftScore::of_soft(2), |_: &[Arc<Model>]| i64::MAX)
        .unwrap();
    let mut network = builder.build().unwrap().instantiate();

    network.insert(Model::shift(1, Some(0), 0, 8)).unwrap();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| network.calculate_score()));
    match outcome {
        Ok(Err(BavetError::Impact { constraint, tuple, message })) => {
            assert_eq!(constraint, "scheduling/Big");
            assert!(tuple.contains("Shift"), "{}", tuple);
            assert!(message.contains("overflows"), "{}", message);
        }
        Ok(other) => panic!("expected an impact error, got {:?}", other),
        Err(_) => panic!("score overflow escaped as a panic"),
    }
    assert!(network.is_poisoned());
    assert!(matches!(network.calculate_score(), Err(BavetError::Poisoned)));
}

#[test]
fn test_instances_are_independent() {
    let mut builder = NetworkBuilder::<Model, SimpleScore>::new();
    let ints = builder.for_each("Int", |m: &Model| m.int().is_some());
    builder.penalize(ints, "Int", SimpleScore::of(1)).unwrap();
    let definition = builder.build().unwrap();

    let mut first = definition.instantiate();
    let mut second = definition.instantiate();
    first.insert(Model::Int(1)).unwrap();
    first.insert(Model::Int(2)).unwrap();
    second.insert(Model::Int(3)).unwrap();
    assert_eq!(first.calculate_score().unwrap(), SimpleScore::of(-2));
    assert_eq!(second.calculate_score().unwrap(), SimpleScore::of(-1));

    let worker = std::thread::spawn(move || {
        second.insert(Model::Int(4)).unwrap();
        second.calculate_score().unwrap()
    });
    assert_eq!(worker.join().unwrap(), SimpleScore::of(-2));
}
