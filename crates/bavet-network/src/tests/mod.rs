//! Network-level tests: whole networks built through the builder and driven
//! through insert/update/retract and `calculate_score`.

mod propagation;

use std::sync::Arc;

use bavet_config::EnvironmentMode;
use bavet_core::HardSoftScore;
use bavet_test::scheduling::overlaps;
use bavet_test::Model;

use crate::builder::NetworkBuilder;
use crate::collector::count;
use crate::definition::NetworkDefinition;
use crate::joiner::{equal, equal_by, filtering, less_than};

pub(crate) fn employee_key(t: &[Arc<Model>]) -> Model {
    Model::Int(t[0].employee().map_or(-1, |e| e as i64))
}

pub(crate) fn id_key(t: &[Arc<Model>]) -> Model {
    Model::Int(t[0].id().map_or(-1, |id| id as i64))
}

fn interval(t: &[Arc<Model>]) -> (i64, i64) {
    t[0].interval().unwrap_or((0, 0))
}

/// Overlap, Unassigned, Load and Idle, as described in
/// `bavet_test::scheduling`.
pub(crate) fn scheduling_definition(mode: EnvironmentMode) -> Arc<NetworkDefinition<Model, HardSoftScore>> {
    let mut builder = NetworkBuilder::<Model, HardSoftScore>::new()
        .with_package("scheduling")
        .with_environment_mode(mode);

    let shifts = builder.for_each("Shift", Model::is_shift);
    let assigned = builder
        .filter(shifts, |t: &[Arc<Model>]| t[0].employee().is_some())
        .unwrap();
    let unassigned = builder
        .filter(shifts, |t: &[Arc<Model>]| t[0].employee().is_none())
        .unwrap();
    let employees = builder.for_each("Employee", Model::is_employee);

    let pairs = builder
        .join(
            assigned,
            assigned,
            vec![
                equal_by(employee_key),
                less_than(|l: &[Arc<Model>]| l[0].id(), |r: &[Arc<Model>]| r[0].id()),
                filtering(|l: &[Arc<Model>], r: &[Arc<Model>]| overlaps(interval(l), interval(r))),
            ],
        )
        .unwrap();
    builder.penalize(pairs, "Overlap", HardSoftScore::ONE_HARD).unwrap();

    builder
        .penalize(unassigned, "Unassigned", HardSoftScore::ONE_SOFT)
        .unwrap();

    let key: crate::fact::TupleMapper<Model> = Arc::new(employee_key);
    let load = builder.group_by(assigned, vec![key], count()).unwrap();
    builder
        .penalize_weighted(load, "Load", HardSoftScore::ONE_SOFT, |t: &[Arc<Model>]| {
            let n = t[1].int().unwrap_or(0);
            n * n
        })
        .unwrap();

    let idle = builder
        .if_not_exists(employees, assigned, vec![equal(id_key, employee_key)])
        .unwrap();
    builder.penalize(idle, "Idle", HardSoftScore::ONE_SOFT).unwrap();

    builder.build().unwrap()
}
