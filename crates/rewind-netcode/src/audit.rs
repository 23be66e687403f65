//! Host-side audit of the state peers report
//!
//! Peers forward each saved state once their input for that tick is
//! complete. The host holds these per peer until its own state for the same
//! tick exists with complete input, then compares the two. A mismatch is a
//! diagnostic: it never changes the simulation.

use rewind_core::{PeerId, Tick};
use rewind_rollback_buffer::{StateFrame, StateMap, TickWindow};
use std::collections::{BTreeMap, VecDeque};

/// A remote state that disagreed with ours
#[derive(Debug, Clone, PartialEq)]
pub struct StateMismatch {
    pub tick: Tick,
    pub peer: PeerId,
    pub local: StateMap,
    pub remote: StateMap,
}

/// Remote states waiting to be compared
#[derive(Debug, Clone, Default)]
pub struct StateAuditor {
    logged: BTreeMap<PeerId, VecDeque<StateFrame>>,
}

impl StateAuditor {
    /// Create an empty auditor
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a state reported by `peer`
    pub fn log(&mut self, peer: PeerId, frame: StateFrame) {
        self.logged.entry(peer).or_default().push_back(frame);
    }

    /// Number of states waiting across all peers
    pub fn pending(&self) -> usize {
        self.logged.values().map(VecDeque::len).sum()
    }

    /// Check if nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Forget a peer's queue
    pub fn remove_peer(&mut self, peer: PeerId) {
        self.logged.remove(&peer);
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.logged.clear();
    }

    /// Compare every queued state that can be compared now
    ///
    /// States are handled in arrival order per peer; a peer's queue stops at
    /// the first tick whose input is incomplete or whose local state does
    /// not exist yet. States for ticks already retired locally are dropped.
    pub fn process(
        &mut self,
        states: &TickWindow<StateFrame>,
        is_input_complete: impl Fn(Tick) -> bool,
    ) -> Vec<StateMismatch> {
        let mut mismatches = Vec::new();
        for (peer, queue) in &mut self.logged {
            while let Some(remote) = queue.front() {
                if remote.tick < states.start_tick() {
                    log::debug!(
                        "Dropping audit of tick {} from {}: already retired",
                        remote.tick,
                        peer
                    );
                    queue.pop_front();
                    continue;
                }
                if !is_input_complete(remote.tick) {
                    break;
                }
                let Some(local) = states.get(remote.tick) else {
                    break;
                };
                if local.data != remote.data {
                    mismatches.push(StateMismatch {
                        tick: remote.tick,
                        peer: *peer,
                        local: local.data.clone(),
                        remote: remote.data.clone(),
                    });
                }
                queue.pop_front();
            }
        }
        mismatches
    }
}
