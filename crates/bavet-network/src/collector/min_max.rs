//! Minimum and maximum collectors.
//!
//! Both keep a multiset of the current values so that retracting the
//! current extreme falls back to the next one.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{Accumulator, Collector};
use crate::fact::Fact;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extreme {
    Min,
    Max,
}

/// Smallest mapped value of the group, `None` for an empty group.
///
/// # Example
///
/// ```
/// use bavet_network::collector::{min, Accumulator, Collector};
/// use std::sync::Arc;
///
/// let collector = min(|facts: &[Arc<i64>]| *facts[0]);
/// let mut acc = collector.create_accumulator();
/// for v in [4, 2, 2, 9] {
///     acc.accumulate(&collector.extract(&[Arc::new(v)]));
/// }
/// assert_eq!(acc.finish(), Some(2));
///
/// acc.retract(&2);
/// assert_eq!(acc.finish(), Some(2));
/// acc.retract(&2);
/// assert_eq!(acc.finish(), Some(4));
/// ```
pub fn min<V, T, F>(mapper: F) -> ExtremeCollector<V, T, F>
where
    V: Fact,
    T: Ord + Clone + Send + Sync + 'static,
    F: Fn(&[Arc<V>]) -> T + Send + Sync + 'static,
{
    ExtremeCollector {
        mapper,
        extreme: Extreme::Min,
        _phantom: PhantomData,
    }
}

/// Largest mapped value of the group, `None` for an empty group.
pub fn max<V, T, F>(mapper: F) -> ExtremeCollector<V, T, F>
where
    V: Fact,
    T: Ord + Clone + Send + Sync + 'static,
    F: Fn(&[Arc<V>]) -> T + Send + Sync + 'static,
{
    ExtremeCollector {
        mapper,
        extreme: Extreme::Max,
        _phantom: PhantomData,
    }
}

pub struct ExtremeCollector<V, T, F> {
    mapper: F,
    extreme: Extreme,
    _phantom: PhantomData<fn(&V) -> T>,
}

impl<V, T, F> Collector<V> for ExtremeCollector<V, T, F>
where
    V: Fact,
    T: Ord + Clone + Send + Sync + 'static,
    F: Fn(&[Arc<V>]) -> T + Send + Sync + 'static,
{
    type Value = T;
    type Result = Option<T>;
    type Accumulator = ExtremeAccumulator<T>;

    #[inline]
    fn extract(&self, facts: &[Arc<V>]) -> T {
        (self.mapper)(facts)
    }

    fn create_accumulator(&self) -> Self::Accumulator {
        ExtremeAccumulator {
            counts: BTreeMap::new(),
            extreme: self.extreme,
        }
    }
}

pub struct ExtremeAccumulator<T> {
    counts: BTreeMap<T, usize>,
    extreme: Extreme,
}

impl<T> Accumulator<T, Option<T>> for ExtremeAccumulator<T>
where
    T: Ord + Clone + Send + Sync,
{
    fn accumulate(&mut self, value: &T) {
        *self.counts.entry(value.clone()).or_insert(0) += 1;
    }

    fn retract(&mut self, value: &T) {
        if let Some(count) = self.counts.get_mut(value) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(value);
            }
        }
    }

    fn finish(&self) -> Option<T> {
        let entry = match self.extreme {
            Extreme::Min => self.counts.keys().next(),
            Extreme::Max => self.counts.keys().next_back(),
        };
        entry.cloned()
    }

    fn reset(&mut self) {
        self.counts.clear();
    }
}
