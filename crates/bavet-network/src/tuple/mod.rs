//! Tuples, their propagation state and the arena that owns them.

mod arena;
mod state;
mod store;

pub use arena::{TupleArena, TupleId};
pub use state::TupleState;
pub use store::{GroupId, Store, StoreIndex, UndoImpact};

use std::fmt;

use crate::fact::{Fact, Facts};

/// A unit of propagation: one fact or one fact combination.
///
/// The producing node creates the tuple in [`TupleState::Creating`] and sizes
/// its store slots for all of that node's consumers.
pub struct Tuple<V: Fact> {
    facts: Facts<V>,
    state: TupleState,
    stores: Box<[Store<V>]>,
}

impl<V: Fact> Tuple<V> {
    pub(crate) fn new(facts: Facts<V>, store_size: usize) -> Self {
        Self {
            facts,
            state: TupleState::Creating,
            stores: (0..store_size).map(|_| Store::Empty).collect(),
        }
    }

    pub fn facts(&self) -> &Facts<V> {
        &self.facts
    }

    pub fn arity(&self) -> usize {
        self.facts.len()
    }

    pub fn state(&self) -> TupleState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TupleState) {
        self.state = state;
    }

    pub(crate) fn set_facts(&mut self, facts: Facts<V>) {
        self.facts = facts;
    }

    /// Replaces the facts and reports whether they changed by value.
    pub(crate) fn refresh_facts(&mut self, facts: Facts<V>) -> bool {
        if self.facts == facts {
            false
        } else {
            self.facts = facts;
            true
        }
    }

    pub fn store(&self, index: StoreIndex) -> &Store<V> {
        &self.stores[index.0]
    }

    pub(crate) fn store_mut(&mut self, index: StoreIndex) -> &mut Store<V> {
        &mut self.stores[index.0]
    }

    /// Takes the value out of a slot, leaving it empty.
    pub(crate) fn take_store(&mut self, index: StoreIndex) -> Store<V> {
        std::mem::take(&mut self.stores[index.0])
    }

    pub(crate) fn set_store(&mut self, index: StoreIndex, store: Store<V>) {
        self.stores[index.0] = store;
    }

    /// Returns the index of the first slot that is still occupied.
    pub fn first_occupied_store(&self) -> Option<usize> {
        self.stores.iter().position(|s| !s.is_empty())
    }
}

impl<V: Fact> fmt::Debug for Tuple<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tuple")
            .field("facts", &self.facts.as_slice())
            .field("state", &self.state)
            .finish()
    }
}

/// Renders tuple facts for error messages.
pub(crate) fn describe_facts<V: Fact>(facts: &[std::sync::Arc<V>]) -> String {
    let parts: Vec<String> = facts.iter().map(|f| format!("{:?}", f)).collect();
    format!("[{}]", parts.join(", "))
}
