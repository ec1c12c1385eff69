//! The insert/update/retract contract between nodes.

use std::sync::Arc;

use bavet_core::{Result, Score};

use crate::fact::{Fact, TuplePredicate};
use crate::guard;
use crate::node::ForEachNode;
use crate::score::ScoreInliner;
use crate::tuple::{TupleArena, TupleId};

/// Which input of a node a tuple arrives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSide {
    /// The only input of a single-parent node.
    Single,
    Left,
    Right,
}

/// One settled change of a node's output tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Insert(TupleId),
    Update(TupleId),
    Retract(TupleId),
}

impl Propagation {
    pub fn tuple(&self) -> TupleId {
        match self {
            Propagation::Insert(id) | Propagation::Update(id) | Propagation::Retract(id) => *id,
        }
    }
}

/// Mutable network state a node works against.
pub struct NodeContext<'a, V: Fact, Sc: Score> {
    pub tuples: &'a mut TupleArena<V>,
    pub scores: &'a mut ScoreInliner<V, Sc>,
}

/// Receiving side of propagation.
///
/// Each call receives a tuple produced by a parent. The node may read and
/// write only the store slots it reserved on that parent. Calls arrive in
/// the order insert, then any number of updates, then retract. A node must
/// tolerate a retract for a tuple it never stored, and must treat an update
/// for a tuple it never stored as an insert: a filtered link can hide the
/// insert.
pub trait TupleLifecycle<V: Fact, Sc: Score> {
    fn insert(
        &mut self,
        side: InputSide,
        tuple: TupleId,
        ctx: &mut NodeContext<'_, V, Sc>,
    ) -> Result<()>;

    fn update(
        &mut self,
        side: InputSide,
        tuple: TupleId,
        ctx: &mut NodeContext<'_, V, Sc>,
    ) -> Result<()>;

    fn retract(
        &mut self,
        side: InputSide,
        tuple: TupleId,
        ctx: &mut NodeContext<'_, V, Sc>,
    ) -> Result<()>;
}

/// Sending side of propagation.
pub trait Propagator<V: Fact, Sc: Score> {
    /// Settles the dirty queue, appending what the children must see.
    fn propagate(
        &mut self,
        ctx: &mut NodeContext<'_, V, Sc>,
        out: &mut Vec<Propagation>,
    ) -> Result<()>;

    /// Number of tuples waiting in the dirty queue.
    fn pending(&self) -> usize;
}

/// A node of the network.
pub trait Node<V: Fact, Sc: Score>: TupleLifecycle<V, Sc> + Propagator<V, Sc> + Send {
    /// Short label used in logs and error messages.
    fn label(&self) -> &str;

    fn as_source_mut(&mut self) -> Option<&mut ForEachNode<V>> {
        None
    }

    fn as_source(&self) -> Option<&ForEachNode<V>> {
        None
    }
}

/// Edge from a producer to one consumer input.
///
/// With a filter, the edge acts as a conditional lifecycle: inserts and
/// updates that fail the predicate are dropped (a failing update becomes a
/// retract), retracts always pass.
#[derive(Clone)]
pub struct ChildLink<V: Fact> {
    pub(crate) node: usize,
    pub(crate) side: InputSide,
    pub(crate) filter: Option<TuplePredicate<V>>,
    pub(crate) filter_label: String,
}

/// What a link turns a propagation into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkAction {
    Insert,
    Update,
    Retract,
    Skip,
}

impl<V: Fact> ChildLink<V> {
    pub(crate) fn route(&self, propagation: &Propagation, tuples: &TupleArena<V>) -> Result<LinkAction> {
        let passes = |id: TupleId| -> Result<bool> {
            match &self.filter {
                None => Ok(true),
                Some(filter) => {
                    let facts: &[Arc<V>] = tuples.get(id)?.facts();
                    guard::call(&self.filter_label, facts, || filter(facts))
                }
            }
        };
        Ok(match *propagation {
            Propagation::Insert(id) => {
                if passes(id)? {
                    LinkAction::Insert
                } else {
                    LinkAction::Skip
                }
            }
            Propagation::Update(id) => {
                if passes(id)? {
                    LinkAction::Update
                } else {
                    LinkAction::Retract
                }
            }
            Propagation::Retract(_) => LinkAction::Retract,
        })
    }
}
