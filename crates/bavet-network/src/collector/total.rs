// Additive collectors: `count` and `sum`.
//
// Both keep a running total that a retract simply undoes, so neither needs
// to remember the values it has seen.

use std::marker::PhantomData;
use std::ops::{AddAssign, SubAssign};
use std::sync::Arc;

use super::{Accumulator, Collector};
use crate::fact::Fact;

/// Counts the tuples of a group.
///
/// ```
/// use bavet_network::collector::{count, Accumulator, Collector};
/// use std::sync::Arc;
///
/// let collector = count::<i64>();
/// let mut tally = collector.create_accumulator();
/// tally.accumulate(&collector.extract(&[Arc::new(1)]));
/// tally.accumulate(&collector.extract(&[Arc::new(2)]));
/// tally.retract(&());
/// assert_eq!(tally.finish(), 1);
/// ```
pub fn count<V: Fact>() -> CountCollector<V> {
    CountCollector(PhantomData)
}

pub struct CountCollector<V>(PhantomData<fn(&V)>);

impl<V: Fact> Collector<V> for CountCollector<V> {
    type Value = ();
    type Result = usize;
    type Accumulator = Tally;

    #[inline]
    fn extract(&self, _facts: &[Arc<V>]) {}

    fn create_accumulator(&self) -> Tally {
        Tally(0)
    }
}

/// Number of tuples currently in a group.
pub struct Tally(usize);

impl Accumulator<(), usize> for Tally {
    #[inline]
    fn accumulate(&mut self, _: &()) {
        self.0 += 1;
    }

    #[inline]
    fn retract(&mut self, _: &()) {
        self.0 = self.0.saturating_sub(1);
    }

    #[inline]
    fn finish(&self) -> usize {
        self.0
    }

    #[inline]
    fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Sums a number mapped from every tuple of a group.
///
/// The mapper runs once per insert or update; a retract subtracts the value
/// the group node kept for that tuple.
pub fn sum<V, T, F>(mapper: F) -> SumCollector<V, F>
where
    V: Fact,
    T: Summable,
    F: Fn(&[Arc<V>]) -> T + Send + Sync + 'static,
{
    SumCollector {
        mapper,
        _fact: PhantomData,
    }
}

/// Values `sum` can total. Implemented for every type with the needed arithmetic.
pub trait Summable: Default + Copy + AddAssign + SubAssign + Send + Sync + 'static {}

impl<T> Summable for T where T: Default + Copy + AddAssign + SubAssign + Send + Sync + 'static {}

pub struct SumCollector<V, F> {
    mapper: F,
    _fact: PhantomData<fn(&V)>,
}

impl<V, T, F> Collector<V> for SumCollector<V, F>
where
    V: Fact,
    T: Summable,
    F: Fn(&[Arc<V>]) -> T + Send + Sync + 'static,
{
    type Value = T;
    type Result = T;
    type Accumulator = Total<T>;

    #[inline]
    fn extract(&self, facts: &[Arc<V>]) -> T {
        (self.mapper)(facts)
    }

    fn create_accumulator(&self) -> Total<T> {
        Total(T::default())
    }
}

/// Running total of a `sum` group.
pub struct Total<T>(T);

impl<T: Summable> Accumulator<T, T> for Total<T> {
    #[inline]
    fn accumulate(&mut self, value: &T) {
        self.0 += *value;
    }

    #[inline]
    fn retract(&mut self, value: &T) {
        self.0 -= *value;
    }

    #[inline]
    fn finish(&self) -> T {
        self.0
    }

    #[inline]
    fn reset(&mut self) {
        self.0 = T::default();
    }
}
