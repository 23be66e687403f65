//! Session events
//!
//! Everything externally visible about a session is reported as a
//! [`SyncEvent`]. Events are delivered synchronously to an installed
//! [`SyncObserver`] at the end of each call into the manager, or queued for
//! [`drain_events`](crate::SyncManager::drain_events) when no observer is
//! installed.

use rewind_core::{InputPayload, PeerId, Tick};
use rewind_rollback_buffer::StateMap;

/// Something observable happened in the session
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    SyncStarted,
    SyncStopped,
    /// Input stopped arriving fast enough to retire old state
    SyncLost,
    SyncRegained,
    /// The session hit a fatal error and was stopped
    SyncError(String),
    PeerAdded(PeerId),
    PeerRemoved(PeerId),
    /// A ping-back updated a peer's round trip and clock estimate
    PeerPingUpdated {
        peer: PeerId,
        rtt: u64,
        clock_delta: i64,
    },
    /// The local simulation will hold for this many steps to let peers catch up
    SkipTicksFlagged(u32),
    /// Real input disagreed with what was predicted for it
    RollbackFlagged {
        tick: Tick,
        peer: PeerId,
        local: InputPayload,
        remote: InputPayload,
    },
    /// A peer's audited state differs from ours
    RemoteStateMismatch {
        tick: Tick,
        peer: PeerId,
        local: StateMap,
        remote: StateMap,
    },
    /// State was restored this many ticks back
    StateLoaded(usize),
    TickFinished { is_rollback: bool },
}

impl SyncEvent {
    /// Check if this event reports the end of the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncEvent::SyncStopped | SyncEvent::SyncError(_))
    }
}

/// Receives session events as they happen
pub trait SyncObserver {
    fn on_event(&mut self, event: &SyncEvent);
}

impl<F: FnMut(&SyncEvent)> SyncObserver for F {
    fn on_event(&mut self, event: &SyncEvent) {
        self(event)
    }
}

/// Pending events plus the optional observer they flush to
#[derive(Default)]
pub(crate) struct EventQueue {
    pending: Vec<SyncEvent>,
    observer: Option<Box<dyn SyncObserver>>,
}

impl EventQueue {
    pub(crate) fn push(&mut self, event: SyncEvent) {
        self.pending.push(event);
    }

    pub(crate) fn set_observer(&mut self, observer: Option<Box<dyn SyncObserver>>) {
        self.observer = observer;
    }

    /// Hand pending events to the observer, if any
    pub(crate) fn flush(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            for event in self.pending.drain(..) {
                observer.on_event(&event);
            }
        }
    }

    pub(crate) fn drain(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.pending)
    }
}
