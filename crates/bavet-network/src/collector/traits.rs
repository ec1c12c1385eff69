use std::sync::Arc;

use crate::fact::Fact;

/// Folds values into a result and can take them out again.
///
/// `retract` receives a value previously passed to `accumulate`, so an
/// accumulator never has to remember which tuple contributed what.
pub trait Accumulator<T, R>: Send {
    fn accumulate(&mut self, value: &T);

    fn retract(&mut self, value: &T);

    fn finish(&self) -> R;

    fn reset(&mut self);
}

/// Describes how a group node aggregates the tuples of one group.
///
/// The node extracts a value once per contributing tuple and keeps it, so
/// `extract` runs again only when the tuple is updated.
pub trait Collector<V: Fact>: Send + Sync + 'static {
    type Value: Send + 'static;
    type Result: 'static;
    type Accumulator: Accumulator<Self::Value, Self::Result> + 'static;

    fn extract(&self, facts: &[Arc<V>]) -> Self::Value;

    fn create_accumulator(&self) -> Self::Accumulator;
}

/// Collector of key-only group nodes. Produces no output fact.
pub struct NoCollector;

impl<V: Fact> Collector<V> for NoCollector {
    type Value = ();
    type Result = ();
    type Accumulator = NoAccumulator;

    #[inline]
    fn extract(&self, _facts: &[Arc<V>]) {}

    fn create_accumulator(&self) -> NoAccumulator {
        NoAccumulator
    }
}

pub struct NoAccumulator;

impl Accumulator<(), ()> for NoAccumulator {
    #[inline]
    fn accumulate(&mut self, _: &()) {}

    #[inline]
    fn retract(&mut self, _: &()) {}

    #[inline]
    fn finish(&self) {}

    #[inline]
    fn reset(&mut self) {}
}
