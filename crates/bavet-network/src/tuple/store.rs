use indexmap::IndexMap;

use super::TupleId;
use crate::index::IndexKey;

/// Position of a slot in a tuple's store array.
///
/// Reserved once, at build time, by the node that reads the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreIndex(pub(crate) usize);

/// Group slab position inside one group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) usize);

/// Captured reversal of one score impact.
///
/// The constraint weight is fixed per network instance, so the match weight
/// is enough to recompute the exact delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoImpact {
    pub(crate) constraint: usize,
    pub(crate) match_weight: i64,
    pub(crate) match_id: u64,
}

/// Node-private value kept in a tuple slot.
#[derive(Debug, Default)]
pub enum Store<V> {
    #[default]
    Empty,
    /// A single derived tuple (map, concat, if-exists output).
    Tuple(TupleId),
    /// Derived tuples in item order (flatten items).
    Tuples(Vec<TupleId>),
    /// Join outputs keyed by the partner tuple on the other side.
    Partners(IndexMap<TupleId, TupleId>),
    /// Index key under which the tuple is registered.
    Key(IndexKey<V>),
    /// Group the tuple contributes to.
    Group(GroupId),
    /// Undo record of a scorer.
    Undo(UndoImpact),
}

impl<V> Store<V> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Store::Empty)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Store::Empty => "empty",
            Store::Tuple(_) => "tuple",
            Store::Tuples(_) => "tuples",
            Store::Partners(_) => "partners",
            Store::Key(_) => "key",
            Store::Group(_) => "group",
            Store::Undo(_) => "undo",
        }
    }
}
