//! Generational arena owning every tuple of one network instance.
//!
//! Nodes refer to tuples by [`TupleId`]. Freed slots are reused, and the
//! generation counter makes every id handed out before the free stale, so a
//! dangling reference surfaces as an invariant violation instead of silently
//! reading another tuple.

use std::fmt;

use bavet_core::{BavetError, Result};

use super::{Tuple, TupleState};
use crate::fact::{Fact, Facts};

/// Address of a tuple in a [`TupleArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleId {
    index: u32,
    generation: u32,
}

impl fmt::Debug for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TupleId({}v{})", self.index, self.generation)
    }
}

struct Slot<V: Fact> {
    generation: u32,
    tuple: Option<Tuple<V>>,
}

/// Slot storage for tuples with O(1) alloc, lookup and free.
///
/// # Example
///
/// ```
/// use bavet_network::tuple::{TupleArena, TupleState};
/// use smallvec::smallvec;
/// use std::sync::Arc;
///
/// let mut arena: TupleArena<i64> = TupleArena::new();
/// let id = arena.alloc(smallvec![Arc::new(7)], 2);
/// assert_eq!(arena.get(id).unwrap().state(), TupleState::Creating);
///
/// arena.free(id).unwrap();
/// assert!(arena.get(id).is_err());
/// assert!(arena.is_empty());
/// ```
pub struct TupleArena<V: Fact> {
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    live: usize,
}

impl<V: Fact> TupleArena<V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Allocates a tuple in [`TupleState::Creating`].
    pub fn alloc(&mut self, facts: Facts<V>, store_size: usize) -> TupleId {
        let tuple = Tuple::new(facts, store_size);
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.tuple = Some(tuple);
            TupleId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                tuple: Some(tuple),
            });
            TupleId {
                index,
                generation: 0,
            }
        }
    }

    pub fn get(&self, id: TupleId) -> Result<&Tuple<V>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.tuple.as_ref())
            .ok_or_else(|| stale(id))
    }

    pub fn get_mut(&mut self, id: TupleId) -> Result<&mut Tuple<V>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.tuple.as_mut())
            .ok_or_else(|| stale(id))
    }

    /// Shortcut for `get(id)?.state()`.
    pub fn state(&self, id: TupleId) -> Result<TupleState> {
        Ok(self.get(id)?.state())
    }

    /// Removes a tuple; its id and every copy of it become stale.
    pub fn free(&mut self, id: TupleId) -> Result<Tuple<V>> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .ok_or_else(|| stale(id))?;
        let tuple = slot.tuple.take().ok_or_else(|| stale(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Ok(tuple)
    }

    /// Number of tuples currently allocated.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterates over all live tuples.
    pub fn iter(&self) -> impl Iterator<Item = (TupleId, &Tuple<V>)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.tuple.as_ref().map(|tuple| {
                (
                    TupleId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    tuple,
                )
            })
        })
    }
}

impl<V: Fact> Default for TupleArena<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn stale(id: TupleId) -> BavetError {
    BavetError::impossible(format!("tuple {:?} is not alive in this network", id))
}
