//! Incrementally maintained tuple indexes for join-like nodes.

use std::collections::{BTreeMap, HashMap};

use bavet_core::{BavetError, Result};
use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::fact::Fact;
use crate::joiner::{ComparisonOp, Joiners};
use crate::tuple::TupleId;

/// Composite key extracted by the joiners: the equality components in joiner
/// order, then the comparison component when one is indexed.
pub type IndexKey<V> = SmallVec<[V; 2]>;

/// Tuples registered under one exact key, in registration order.
pub type Bucket = IndexSet<TupleId>;

/// Key -> tuples multi-map.
///
/// `Unindexed` is used when the joiners extract no key and every tuple
/// matches every other. `Comparison` keeps an ordered map per equal-key
/// prefix; `op` relates the querying key to the stored one.
#[derive(Debug)]
pub enum Indexer<V: Fact> {
    Unindexed(Bucket),
    Equal(HashMap<IndexKey<V>, Bucket>),
    Comparison {
        op: ComparisonOp,
        trees: HashMap<IndexKey<V>, BTreeMap<V, Bucket>>,
    },
}

/// Side of the joiners an indexer stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedSide {
    /// Holds left tuples; queried with right keys.
    Left,
    /// Holds right tuples; queried with left keys.
    Right,
}

impl<V: Fact> Indexer<V> {
    /// Picks the variant for a joiner set.
    pub fn for_joiners(joiners: &Joiners<V>, side: IndexedSide) -> Self {
        match joiners.comparison() {
            // Joiners read `left op right`. A left index answers `right op' left`.
            Some(comparison) => Indexer::Comparison {
                op: match side {
                    IndexedSide::Left => comparison.op.flip(),
                    IndexedSide::Right => comparison.op,
                },
                trees: HashMap::new(),
            },
            None if joiners.key_count() == 0 => Indexer::Unindexed(Bucket::new()),
            None => Indexer::Equal(HashMap::new()),
        }
    }

    /// Registers `tuple`; registering it twice is an invariant violation.
    pub fn put(&mut self, key: IndexKey<V>, tuple: TupleId) -> Result<()> {
        let added = match self {
            Indexer::Unindexed(all) => all.insert(tuple),
            Indexer::Equal(map) => map.entry(key).or_default().insert(tuple),
            Indexer::Comparison { trees, .. } => {
                let (prefix, compared) = split(key)?;
                trees
                    .entry(prefix)
                    .or_default()
                    .entry(compared)
                    .or_default()
                    .insert(tuple)
            }
        };
        if added {
            Ok(())
        } else {
            Err(BavetError::impossible(format!("tuple {:?} is indexed twice", tuple)))
        }
    }

    /// Removes one registration; failing to find it is an invariant violation.
    pub fn remove(&mut self, key: &IndexKey<V>, tuple: TupleId) -> Result<()> {
        let missing = || {
            BavetError::impossible(format!(
                "tuple {:?} is not indexed under key {:?}",
                tuple, key
            ))
        };
        match self {
            Indexer::Unindexed(all) => {
                if !all.swap_remove(&tuple) {
                    return Err(missing());
                }
            }
            Indexer::Equal(map) => {
                let bucket = map.get_mut(key).ok_or_else(missing)?;
                if !bucket.swap_remove(&tuple) {
                    return Err(missing());
                }
                if bucket.is_empty() {
                    map.remove(key);
                }
            }
            Indexer::Comparison { trees, .. } => {
                let (compared, prefix) = key.split_last().ok_or_else(missing)?;
                let tree = trees.get_mut(prefix).ok_or_else(missing)?;
                let bucket = tree.get_mut(compared).ok_or_else(missing)?;
                if !bucket.swap_remove(&tuple) {
                    return Err(missing());
                }
                if bucket.is_empty() {
                    tree.remove(compared);
                    if tree.is_empty() {
                        trees.remove(prefix);
                    }
                }
            }
        }
        Ok(())
    }

    /// Tuples the other side's `key` joins with.
    pub fn matches(&self, key: &IndexKey<V>) -> Vec<TupleId> {
        match self {
            Indexer::Unindexed(all) => all.iter().copied().collect(),
            Indexer::Equal(map) => map
                .get(key)
                .map(|bucket| bucket.iter().copied().collect())
                .unwrap_or_default(),
            Indexer::Comparison { op, trees } => {
                let Some((compared, prefix)) = key.split_last() else {
                    return Vec::new();
                };
                trees
                    .get(prefix)
                    .map(|tree| {
                        tree.range::<V, _>(op.range(compared))
                            .flat_map(|(_, bucket)| bucket.iter().copied())
                            .collect()
                    })
                    .unwrap_or_default()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Indexer::Unindexed(all) => all.len(),
            Indexer::Equal(map) => map.values().map(Bucket::len).sum(),
            Indexer::Comparison { trees, .. } => trees
                .values()
                .flat_map(BTreeMap::values)
                .map(Bucket::len)
                .sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn split<V: Fact>(mut key: IndexKey<V>) -> Result<(IndexKey<V>, V)> {
    match key.pop() {
        Some(compared) => Ok((key, compared)),
        None => Err(BavetError::impossible(
            "comparison index key has no comparison component",
        )),
    }
}
