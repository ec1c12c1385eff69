//! Dirty queue and the per-tuple state machine of one producing node.
//!
//! Nodes never call their children directly. They mark their own output
//! tuples here, and the network drains the queues layer by layer when the
//! score is calculated.

use bavet_core::{BavetError, Result};

use crate::fact::Fact;
use crate::lifecycle::Propagation;
use crate::tuple::{Tuple, TupleArena, TupleId, TupleState};

/// Buffer of output tuples awaiting propagation.
///
/// A tuple sits in the queue at most once: only the transitions that leave a
/// clean state (`Creating` on alloc, `Ok` on update or retract) enqueue.
#[derive(Debug)]
pub struct PropagationQueue {
    dirty: Vec<TupleId>,
}

impl PropagationQueue {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            dirty: Vec::with_capacity(capacity),
        }
    }

    /// Enqueues a freshly allocated tuple.
    pub fn insert<V: Fact>(&mut self, tuples: &TupleArena<V>, id: TupleId) -> Result<()> {
        match tuples.state(id)? {
            TupleState::Creating => {
                self.dirty.push(id);
                Ok(())
            }
            state => Err(BavetError::impossible(format!(
                "tuple {:?} inserted in state {:?}",
                id, state
            ))),
        }
    }

    pub fn update<V: Fact>(&mut self, tuples: &mut TupleArena<V>, id: TupleId) -> Result<()> {
        let tuple = tuples.get_mut(id)?;
        match tuple.state() {
            TupleState::Ok => {
                tuple.set_state(TupleState::Updating);
                self.dirty.push(id);
                Ok(())
            }
            // Already queued; the flush picks up the latest facts.
            TupleState::Creating | TupleState::Updating => Ok(()),
            state => Err(BavetError::impossible(format!(
                "tuple {:?} updated in state {:?}",
                id, state
            ))),
        }
    }

    pub fn retract<V: Fact>(&mut self, tuples: &mut TupleArena<V>, id: TupleId) -> Result<()> {
        let tuple = tuples.get_mut(id)?;
        match tuple.state() {
            TupleState::Creating => {
                tuple.set_state(TupleState::Aborting);
                Ok(())
            }
            TupleState::Ok => {
                tuple.set_state(TupleState::Dying);
                self.dirty.push(id);
                Ok(())
            }
            TupleState::Updating => {
                tuple.set_state(TupleState::Dying);
                Ok(())
            }
            state => Err(BavetError::impossible(format!(
                "tuple {:?} retracted in state {:?}",
                id, state
            ))),
        }
    }

    /// Drains the queue, settling every tuple and recording what to send downstream.
    ///
    /// `refresh` runs for `Creating` and `Updating` tuples before they settle.
    /// It may rewrite the facts and returns whether they changed; an update
    /// whose facts did not change settles silently. `Aborting` tuples are
    /// freed here since no child ever saw them. `Dying` tuples are freed by
    /// the caller once their retract has been dispatched.
    pub fn propagate<V, F>(
        &mut self,
        tuples: &mut TupleArena<V>,
        mut refresh: F,
        out: &mut Vec<Propagation>,
    ) -> Result<()>
    where
        V: Fact,
        F: FnMut(TupleId, &mut Tuple<V>) -> Result<bool>,
    {
        for id in self.dirty.drain(..) {
            let tuple = tuples.get_mut(id)?;
            match tuple.state() {
                TupleState::Creating => {
                    refresh(id, tuple)?;
                    tuple.set_state(TupleState::Ok);
                    out.push(Propagation::Insert(id));
                }
                TupleState::Updating => {
                    let changed = refresh(id, tuple)?;
                    tuple.set_state(TupleState::Ok);
                    if changed {
                        out.push(Propagation::Update(id));
                    }
                }
                TupleState::Dying => {
                    tuple.set_state(TupleState::Dead);
                    out.push(Propagation::Retract(id));
                }
                TupleState::Aborting => {
                    tuple.set_state(TupleState::Dead);
                    tuples.free(id)?;
                }
                state => {
                    return Err(BavetError::impossible(format!(
                        "tuple {:?} in the dirty queue has state {:?}",
                        id, state
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of tuples awaiting propagation.
    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }
}

impl Default for PropagationQueue {
    fn default() -> Self {
        Self::new()
    }
}
