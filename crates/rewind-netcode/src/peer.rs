//! Per-peer bookkeeping

use rewind_core::{PeerId, Tick};

/// Everything known about one remote participant
#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    /// Peer id
    pub id: PeerId,
    /// Last measured round trip, in milliseconds
    pub rtt: u64,
    /// Local wall time of the last ping-back
    pub last_ping_received: u64,
    /// Estimated remote clock minus local clock, in milliseconds
    pub clock_delta: i64,

    /// Newest tick up to which this peer's input is contiguous and real
    pub last_remote_tick_received: Tick,
    /// Oldest local tick this peer still wants from us
    pub next_local_tick_requested: Tick,

    /// How far this peer's input lags our own
    pub local_lag: Tick,
    /// How far our input lags on the peer's side
    pub remote_lag: Tick,

    /// Smoothed tick advantage over this peer
    pub calculated_advantage: f32,
    advantage_samples: Vec<Tick>,
}

impl Peer {
    /// Create a fresh record
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            rtt: 0,
            last_ping_received: 0,
            clock_delta: 0,
            last_remote_tick_received: 0,
            next_local_tick_requested: 1,
            local_lag: 0,
            remote_lag: 0,
            calculated_advantage: 0.0,
            advantage_samples: Vec::new(),
        }
    }

    /// Take one advantage sample for the given local input tick
    ///
    /// Samples are averaged into `calculated_advantage` once
    /// `ticks_to_recalculate` of them have accumulated, or immediately when
    /// `force` is set.
    pub fn record_advantage(&mut self, input_tick: Tick, ticks_to_recalculate: usize, force: bool) {
        self.local_lag = (input_tick + 1) - self.last_remote_tick_received;
        self.advantage_samples.push(self.local_lag - self.remote_lag);

        if force || self.advantage_samples.len() >= ticks_to_recalculate {
            let total: Tick = self.advantage_samples.iter().sum();
            self.calculated_advantage = total as f32 / self.advantage_samples.len() as f32;
            self.advantage_samples.clear();
        }
    }

    /// Drop pending samples and the smoothed advantage
    pub fn clear_advantage(&mut self) {
        self.calculated_advantage = 0.0;
        self.advantage_samples.clear();
    }

    /// Number of samples waiting to be averaged
    pub fn pending_samples(&self) -> usize {
        self.advantage_samples.len()
    }

    /// Apply a ping-back
    ///
    /// `local_time` is our time echoed by the peer, `remote_time` the
    /// peer's clock when it answered, `now` our clock on receipt.
    pub fn record_ping_back(&mut self, local_time: u64, remote_time: u64, now: u64) {
        self.last_ping_received = now;
        self.rtt = now.saturating_sub(local_time);
        self.clock_delta = remote_time as i64 - local_time as i64 - (self.rtt / 2) as i64;
    }

    /// Forget everything learned during a session, keeping the id
    pub fn clear(&mut self) {
        *self = Peer::new(self.id);
    }
}
