//! Node implementations, one per stream operation.

mod concat;
mod flatten_last;
mod for_each;
mod group;
mod if_exists;
mod join;
mod map;
mod scorer;

pub use concat::ConcatNode;
pub use flatten_last::FlattenLastNode;
pub use for_each::ForEachNode;
pub use group::{GroupKeys, GroupNode, ResultFn};
pub use if_exists::IfExistsNode;
pub use join::JoinNode;
pub use map::MapNode;
pub use scorer::ScorerNode;

use bavet_core::BavetError;

use crate::lifecycle::InputSide;
use crate::tuple::{Store, TupleId};

pub(crate) const LEFT: usize = 0;
pub(crate) const RIGHT: usize = 1;

pub(crate) fn side_index(label: &str, side: InputSide) -> Result<usize, BavetError> {
    match side {
        InputSide::Left => Ok(LEFT),
        InputSide::Right => Ok(RIGHT),
        InputSide::Single => Err(BavetError::impossible(format!(
            "node ({}) has two inputs but received a tuple without a side",
            label
        ))),
    }
}

pub(crate) fn double_insert(label: &str, tuple: TupleId) -> BavetError {
    BavetError::impossible(format!(
        "node ({}) received an insert for tuple {:?} which it already holds",
        label, tuple
    ))
}

pub(crate) fn unexpected_store<V>(label: &str, tuple: TupleId, store: &Store<V>) -> BavetError {
    BavetError::impossible(format!(
        "node ({}) found a {} slot on tuple {:?}",
        label,
        store.kind(),
        tuple
    ))
}
