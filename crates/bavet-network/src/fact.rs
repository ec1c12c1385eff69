//! Facts and the function types that consume them.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use smallvec::SmallVec;

/// A value that can flow through the network.
///
/// Facts are shared as `Arc<V>`. Equality is value equality; reference
/// identity (`Arc::ptr_eq`) is only consulted by flatten-last. Hashing backs
/// the equality indexes and ordering backs the comparison indexes.
pub trait Fact: Clone + Debug + Eq + Ord + Hash + Send + Sync + 'static {}

impl<T> Fact for T where T: Clone + Debug + Eq + Ord + Hash + Send + Sync + 'static {}

/// Facts of one tuple, in stream order.
pub type Facts<V> = SmallVec<[Arc<V>; 4]>;

/// Handle returned when a fact is inserted into a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactHandle(pub(crate) u64);

impl FactHandle {
    /// Returns the raw handle number.
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Decides whether a source accepts a fact.
pub type ClassPredicate<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

/// Predicate over the facts of one tuple.
pub type TuplePredicate<V> = Arc<dyn Fn(&[Arc<V>]) -> bool + Send + Sync>;

/// Predicate over a left and a right tuple.
pub type BiPredicate<V> = Arc<dyn Fn(&[Arc<V>], &[Arc<V>]) -> bool + Send + Sync>;

/// Extracts a key (or a mapped fact) from the facts of one tuple.
pub type TupleMapper<V> = Arc<dyn Fn(&[Arc<V>]) -> V + Send + Sync>;

/// Expands the last fact of a tuple into any number of items.
pub type FlattenFn<V> = Arc<dyn Fn(&V) -> Vec<Arc<V>> + Send + Sync>;

/// Computes the match weight of a scored tuple.
pub type MatchWeigher<V> = Arc<dyn Fn(&[Arc<V>]) -> i64 + Send + Sync>;

/// Wraps a closure as a [`TupleMapper`].
///
/// ```
/// use bavet_network::fact::mapper;
/// use std::sync::Arc;
///
/// let double = mapper(|t: &[Arc<i64>]| *t[0] * 2);
/// assert_eq!(double(&[Arc::new(4)]), 8);
/// ```
pub fn mapper<V, F>(f: F) -> TupleMapper<V>
where
    V: Fact,
    F: Fn(&[Arc<V>]) -> V + Send + Sync + 'static,
{
    Arc::new(f)
}
