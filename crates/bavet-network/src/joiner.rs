//! Joiners decide which left and right tuples belong together.
//!
//! Equality joiners contribute one component each to the index key. The
//! first comparison joiner adds a final, range-searched component. Any other
//! joiner is evaluated as a predicate over the candidate pair.
//!
//! # Example
//!
//! ```
//! use bavet_network::joiner::{equal, filtering, greater_than, less_than, Joiners};
//! use std::sync::Arc;
//!
//! let joiners: Joiners<i64> = Joiners::from(vec![
//!     equal(|l: &[Arc<i64>]| *l[0] % 10, |r: &[Arc<i64>]| *r[0] % 10),
//!     less_than(|l: &[Arc<i64>]| *l[0], |r: &[Arc<i64>]| *r[0]),
//!     greater_than(|l: &[Arc<i64>]| *l[0], |_: &[Arc<i64>]| 0),
//!     filtering(|l: &[Arc<i64>], r: &[Arc<i64>]| *l[0] != 0 && *r[0] != 0),
//! ]);
//! assert_eq!(joiners.key_count(), 1);
//! assert!(joiners.comparison().is_some());
//! assert_eq!(joiners.filter_count(), 2);
//! ```

use std::ops::Bound;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::fact::{BiPredicate, Fact, TupleMapper};
use crate::index::IndexKey;

/// A single joining condition.
#[derive(Clone)]
pub enum Joiner<V: Fact> {
    /// Left and right extract equal keys.
    Equal {
        left: TupleMapper<V>,
        right: TupleMapper<V>,
    },
    /// `left op right` under the facts' ordering.
    Compare {
        left: TupleMapper<V>,
        right: TupleMapper<V>,
        op: ComparisonOp,
    },
    /// Arbitrary condition on the pair.
    Filter(BiPredicate<V>),
}

/// Relation a comparison joiner requires between the left and right key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOp {
    pub fn accepts<K: Ord + ?Sized>(self, left: &K, right: &K) -> bool {
        match self {
            ComparisonOp::LessThan => left < right,
            ComparisonOp::LessThanOrEqual => left <= right,
            ComparisonOp::GreaterThan => left > right,
            ComparisonOp::GreaterThanOrEqual => left >= right,
        }
    }

    /// The same relation with its operands swapped: `a < b` iff `b > a`.
    pub fn flip(self) -> Self {
        match self {
            ComparisonOp::LessThan => ComparisonOp::GreaterThan,
            ComparisonOp::LessThanOrEqual => ComparisonOp::GreaterThanOrEqual,
            ComparisonOp::GreaterThan => ComparisonOp::LessThan,
            ComparisonOp::GreaterThanOrEqual => ComparisonOp::LessThanOrEqual,
        }
    }

    /// Bounds of every `stored` key with `query op stored`.
    pub(crate) fn range<K: Ord + ?Sized>(self, query: &K) -> (Bound<&K>, Bound<&K>) {
        match self {
            ComparisonOp::LessThan => (Bound::Excluded(query), Bound::Unbounded),
            ComparisonOp::LessThanOrEqual => (Bound::Included(query), Bound::Unbounded),
            ComparisonOp::GreaterThan => (Bound::Unbounded, Bound::Excluded(query)),
            ComparisonOp::GreaterThanOrEqual => (Bound::Unbounded, Bound::Included(query)),
        }
    }
}

/// Left and right key extractors must agree.
pub fn equal<V, L, R>(left: L, right: R) -> Joiner<V>
where
    V: Fact,
    L: Fn(&[Arc<V>]) -> V + Send + Sync + 'static,
    R: Fn(&[Arc<V>]) -> V + Send + Sync + 'static,
{
    Joiner::Equal {
        left: Arc::new(left),
        right: Arc::new(right),
    }
}

/// The same key extractor is applied to both sides.
pub fn equal_by<V, K>(key: K) -> Joiner<V>
where
    V: Fact,
    K: Fn(&[Arc<V>]) -> V + Send + Sync + 'static,
{
    let key: TupleMapper<V> = Arc::new(key);
    Joiner::Equal {
        left: Arc::clone(&key),
        right: key,
    }
}

/// The pair must satisfy `predicate`.
pub fn filtering<V, P>(predicate: P) -> Joiner<V>
where
    V: Fact,
    P: Fn(&[Arc<V>], &[Arc<V>]) -> bool + Send + Sync + 'static,
{
    Joiner::Filter(Arc::new(predicate))
}

fn comparing<V, K, L, R>(left: L, right: R, op: ComparisonOp) -> Joiner<V>
where
    V: Fact,
    K: Into<V>,
    L: Fn(&[Arc<V>]) -> K + Send + Sync + 'static,
    R: Fn(&[Arc<V>]) -> K + Send + Sync + 'static,
{
    Joiner::Compare {
        left: Arc::new(move |facts: &[Arc<V>]| left(facts).into()),
        right: Arc::new(move |facts: &[Arc<V>]| right(facts).into()),
        op,
    }
}

/// `left(l) < right(r)`, with both keys converted into facts and compared
/// by the facts' ordering.
pub fn less_than<V, K, L, R>(left: L, right: R) -> Joiner<V>
where
    V: Fact,
    K: Into<V>,
    L: Fn(&[Arc<V>]) -> K + Send + Sync + 'static,
    R: Fn(&[Arc<V>]) -> K + Send + Sync + 'static,
{
    comparing(left, right, ComparisonOp::LessThan)
}

/// `left(l) <= right(r)`
pub fn less_than_or_equal<V, K, L, R>(left: L, right: R) -> Joiner<V>
where
    V: Fact,
    K: Into<V>,
    L: Fn(&[Arc<V>]) -> K + Send + Sync + 'static,
    R: Fn(&[Arc<V>]) -> K + Send + Sync + 'static,
{
    comparing(left, right, ComparisonOp::LessThanOrEqual)
}

/// `left(l) > right(r)`
pub fn greater_than<V, K, L, R>(left: L, right: R) -> Joiner<V>
where
    V: Fact,
    K: Into<V>,
    L: Fn(&[Arc<V>]) -> K + Send + Sync + 'static,
    R: Fn(&[Arc<V>]) -> K + Send + Sync + 'static,
{
    comparing(left, right, ComparisonOp::GreaterThan)
}

/// `left(l) >= right(r)`
pub fn greater_than_or_equal<V, K, L, R>(left: L, right: R) -> Joiner<V>
where
    V: Fact,
    K: Into<V>,
    L: Fn(&[Arc<V>]) -> K + Send + Sync + 'static,
    R: Fn(&[Arc<V>]) -> K + Send + Sync + 'static,
{
    comparing(left, right, ComparisonOp::GreaterThanOrEqual)
}

/// The comparison joiner that is answered by the index.
#[derive(Clone)]
pub struct IndexedComparison<V: Fact> {
    left: TupleMapper<V>,
    right: TupleMapper<V>,
    pub op: ComparisonOp,
}

/// A joiner set, split into key extractors and pair filters.
#[derive(Clone)]
pub struct Joiners<V: Fact> {
    left_keys: Vec<TupleMapper<V>>,
    right_keys: Vec<TupleMapper<V>>,
    comparison: Option<IndexedComparison<V>>,
    filters: Vec<BiPredicate<V>>,
}

impl<V: Fact> Joiners<V> {
    pub fn none() -> Self {
        Self {
            left_keys: Vec::new(),
            right_keys: Vec::new(),
            comparison: None,
            filters: Vec::new(),
        }
    }

    /// Number of equality joiners.
    pub fn key_count(&self) -> usize {
        self.left_keys.len()
    }

    pub fn comparison(&self) -> Option<&IndexedComparison<V>> {
        self.comparison.as_ref()
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    pub(crate) fn left_key(&self, facts: &[Arc<V>]) -> IndexKey<V> {
        let mut key = extract(&self.left_keys, facts);
        if let Some(comparison) = &self.comparison {
            key.push((comparison.left)(facts));
        }
        key
    }

    pub(crate) fn right_key(&self, facts: &[Arc<V>]) -> IndexKey<V> {
        let mut key = extract(&self.right_keys, facts);
        if let Some(comparison) = &self.comparison {
            key.push((comparison.right)(facts));
        }
        key
    }

    pub(crate) fn test(&self, left: &[Arc<V>], right: &[Arc<V>]) -> bool {
        self.filters.iter().all(|f| f(left, right))
    }
}

fn extract<V: Fact>(keys: &[TupleMapper<V>], facts: &[Arc<V>]) -> IndexKey<V> {
    let mut key = SmallVec::with_capacity(keys.len() + 1);
    for k in keys {
        key.push(k(facts));
    }
    key
}

impl<V: Fact> From<Vec<Joiner<V>>> for Joiners<V> {
    fn from(joiners: Vec<Joiner<V>>) -> Self {
        let mut set = Joiners::none();
        for joiner in joiners {
            match joiner {
                Joiner::Equal { left, right } => {
                    set.left_keys.push(left);
                    set.right_keys.push(right);
                }
                Joiner::Compare { left, right, op } if set.comparison.is_none() => {
                    set.comparison = Some(IndexedComparison { left, right, op });
                }
                Joiner::Compare { left, right, op } => {
                    set.filters.push(Arc::new(move |l: &[Arc<V>], r: &[Arc<V>]| {
                        op.accepts(&left(l), &right(r))
                    }));
                }
                Joiner::Filter(predicate) => set.filters.push(predicate),
            }
        }
        set
    }
}

impl<V: Fact> Default for Joiners<V> {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(values: &[i64]) -> Vec<Arc<i64>> {
        values.iter().copied().map(Arc::new).collect()
    }

    #[test]
    fn test_equal_builds_composite_key() {
        let joiners: Joiners<i64> = Joiners::from(vec![
            equal(|l: &[Arc<i64>]| *l[0], |r: &[Arc<i64>]| *r[1]),
            equal_by(|t: &[Arc<i64>]| *t[0] * 2),
        ]);
        let left = facts(&[3]);
        let right = facts(&[0, 3]);
        assert_eq!(joiners.left_key(&left).as_slice(), &[3, 6]);
        assert_eq!(joiners.right_key(&right).as_slice(), &[3, 0]);
    }

    #[test]
    fn test_first_comparison_is_indexed_the_rest_filter() {
        let joiners: Joiners<i64> = Joiners::from(vec![
            equal_by(|t: &[Arc<i64>]| *t[0] % 2),
            less_than(|l: &[Arc<i64>]| *l[0], |r: &[Arc<i64>]| *r[0]),
            greater_than_or_equal(|l: &[Arc<i64>]| *l[0], |_: &[Arc<i64>]| 2i64),
        ]);
        assert_eq!(joiners.key_count(), 1);
        assert_eq!(joiners.comparison().map(|c| c.op), Some(ComparisonOp::LessThan));
        assert_eq!(joiners.filter_count(), 1);

        // Equal components first, then the comparison component.
        assert_eq!(joiners.left_key(&facts(&[7])).as_slice(), &[1, 7]);
        assert_eq!(joiners.right_key(&facts(&[4])).as_slice(), &[0, 4]);

        assert!(joiners.test(&facts(&[2]), &facts(&[5])));
        assert!(!joiners.test(&facts(&[1]), &facts(&[5])));
    }

    #[test]
    fn test_flip_swaps_operands() {
        for op in [
            ComparisonOp::LessThan,
            ComparisonOp::LessThanOrEqual,
            ComparisonOp::GreaterThan,
            ComparisonOp::GreaterThanOrEqual,
        ] {
            for (a, b) in [(1, 2), (2, 2), (3, 2)] {
                assert_eq!(op.accepts(&a, &b), op.flip().accepts(&b, &a), "{op:?} {a} {b}");
            }
            assert_eq!(op.flip().flip(), op);
        }
    }

    #[test]
    fn test_no_filters_accepts_everything() {
        let joiners: Joiners<i64> = Joiners::none();
        assert!(joiners.test(&facts(&[1]), &facts(&[2])));
        assert!(!joiners.has_filters());
    }
}
