// Tests for collector module.

use std::sync::Arc;

use super::super::{count, max, min, sum, Accumulator, Collector};

fn tuple(value: i64) -> [Arc<i64>; 1] {
    [Arc::new(value)]
}

// ============================================================================
// Count / sum
// ============================================================================

#[test]
fn test_count_saturates_at_zero() {
    let collector = count::<i64>();
    let mut acc = collector.create_accumulator();
    acc.retract(&());
    assert_eq!(acc.finish(), 0);
}

#[test]
fn test_sum_accumulate_and_retract() {
    let collector = sum(|facts: &[Arc<i64>]| *facts[0] * 10);
    let mut acc = collector.create_accumulator();

    acc.accumulate(&collector.extract(&tuple(1)));
    acc.accumulate(&collector.extract(&tuple(2)));
    assert_eq!(acc.finish(), 30);

    acc.retract(&collector.extract(&tuple(1)));
    assert_eq!(acc.finish(), 20);

    acc.reset();
    assert_eq!(acc.finish(), 0);
}

// ============================================================================
// Min / max
// ============================================================================

#[test]
fn test_max_falls_back_after_retract() {
    let collector = max(|facts: &[Arc<i64>]| *facts[0]);
    let mut acc = collector.create_accumulator();
    assert_eq!(acc.finish(), None);

    for v in [3, 8, 5] {
        acc.accumulate(&collector.extract(&tuple(v)));
    }
    assert_eq!(acc.finish(), Some(8));

    acc.retract(&8);
    assert_eq!(acc.finish(), Some(5));
}

#[test]
fn test_min_empty_after_all_retracted() {
    let collector = min(|facts: &[Arc<i64>]| *facts[0]);
    let mut acc = collector.create_accumulator();
    acc.accumulate(&4);
    acc.retract(&4);
    assert_eq!(acc.finish(), None);
}

// ============================================================================
// Random sequences
// ============================================================================

#[test]
fn test_accumulators_agree_with_fold_over_live_values() {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    let counter = count::<i64>();
    let summer = sum(|facts: &[Arc<i64>]| *facts[0]);
    let smallest = min(|facts: &[Arc<i64>]| *facts[0]);
    let largest = max(|facts: &[Arc<i64>]| *facts[0]);

    for seed in 0..16 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut tally = counter.create_accumulator();
        let mut total = summer.create_accumulator();
        let mut low = smallest.create_accumulator();
        let mut high = largest.create_accumulator();
        let mut live: Vec<i64> = Vec::new();

        for step in 0..200 {
            let value = rng.random_range(-5..=5);
            match rng.random_range(0..3) {
                0 if !live.is_empty() => {
                    // update: retract the old value, accumulate the new one
                    let pick = rng.random_range(0..live.len());
                    let old = std::mem::replace(&mut live[pick], value);
                    total.retract(&summer.extract(&tuple(old)));
                    low.retract(&smallest.extract(&tuple(old)));
                    high.retract(&largest.extract(&tuple(old)));
                    total.accumulate(&summer.extract(&tuple(value)));
                    low.accumulate(&smallest.extract(&tuple(value)));
                    high.accumulate(&largest.extract(&tuple(value)));
                }
                1 if !live.is_empty() => {
                    let old = live.swap_remove(rng.random_range(0..live.len()));
                    tally.retract(&());
                    total.retract(&old);
                    low.retract(&old);
                    high.retract(&old);
                }
                _ => {
                    live.push(value);
                    tally.accumulate(&counter.extract(&tuple(value)));
                    total.accumulate(&value);
                    low.accumulate(&value);
                    high.accumulate(&value);
                }
            }

            assert_eq!(tally.finish(), live.len(), "seed {} step {}", seed, step);
            assert_eq!(total.finish(), live.iter().sum::<i64>(), "seed {} step {}", seed, step);
            assert_eq!(low.finish(), live.iter().copied().min(), "seed {} step {}", seed, step);
            assert_eq!(high.finish(), live.iter().copied().max(), "seed {} step {}", seed, step);
        }
    }
}
