// Collectors fold the tuples of one group into a single result.

mod min_max;
mod total;
mod traits;

#[cfg(test)]
mod tests;

pub use min_max::{max, min, ExtremeAccumulator, ExtremeCollector};
pub use total::{count, sum, CountCollector, SumCollector, Summable, Tally, Total};
pub use traits::{Accumulator, Collector, NoCollector};
