//! Lag tracking across all remote peers

use crate::peer::Peer;
use rewind_core::{PeerId, Tick};
use std::collections::BTreeMap;

/// The set of remote peers and their lag accounting
#[derive(Debug, Clone, Default)]
pub struct LagTracker {
    peers: BTreeMap<PeerId, Peer>,
}

impl LagTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a peer; returns false if it was already tracked
    pub fn add(&mut self, id: PeerId) -> bool {
        if self.peers.contains_key(&id) {
            return false;
        }
        self.peers.insert(id, Peer::new(id));
        true
    }

    /// Stop tracking a peer
    pub fn remove(&mut self, id: PeerId) -> Option<Peer> {
        self.peers.remove(&id)
    }

    /// Check if a peer is tracked
    pub fn contains(&self, id: PeerId) -> bool {
        self.peers.contains_key(&id)
    }

    /// Get a peer
    pub fn get(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    /// Get a peer mutably
    pub fn get_mut(&mut self, id: PeerId) -> Option<&mut Peer> {
        self.peers.get_mut(&id)
    }

    /// Tracked peer ids in ascending order
    pub fn ids(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    /// Iterate over peers in id order
    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    /// Number of tracked peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if no peer is tracked
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Take one advantage sample from every peer
    pub fn record_advantage(&mut self, input_tick: Tick, ticks_to_recalculate: usize, force: bool) {
        for peer in self.peers.values_mut() {
            peer.record_advantage(input_tick, ticks_to_recalculate, force);
        }
    }

    /// Largest smoothed advantage over any peer (0 with no peers)
    pub fn max_advantage(&self) -> f32 {
        self.peers
            .values()
            .map(|p| p.calculated_advantage)
            .fold(0.0, f32::max)
    }

    /// Reset every peer's advantage accumulator
    pub fn clear_advantage(&mut self) {
        for peer in self.peers.values_mut() {
            peer.clear_advantage();
        }
    }

    /// Oldest tick any peer still wants from us
    pub fn min_next_tick_requested(&self) -> Option<Tick> {
        self.peers
            .values()
            .map(|p| p.next_local_tick_requested)
            .min()
    }

    /// Highest measured RTT (0 with no peers)
    pub fn highest_rtt(&self) -> u64 {
        self.peers.values().map(|p| p.rtt).max().unwrap_or(0)
    }

    /// Reset every peer's session-scoped counters
    pub fn clear_peers(&mut self) {
        for peer in self.peers.values_mut() {
            peer.clear();
        }
    }

    /// Forget all peers
    pub fn clear(&mut self) {
        self.peers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let mut tracker = LagTracker::new();
        assert!(tracker.add(PeerId(2)));
        assert!(!tracker.add(PeerId(2)));
        assert!(tracker.contains(PeerId(2)));
        assert!(tracker.remove(PeerId(2)).is_some());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_min_next_tick_requested() {
        let mut tracker = LagTracker::new();
        assert_eq!(tracker.min_next_tick_requested(), None);

        tracker.add(PeerId(2));
        tracker.add(PeerId(3));
        tracker.get_mut(PeerId(2)).unwrap().next_local_tick_requested = 12;
        tracker.get_mut(PeerId(3)).unwrap().next_local_tick_requested = 8;
        assert_eq!(tracker.min_next_tick_requested(), Some(8));
    }

    #[test]
    fn test_max_advantage() {
        let mut tracker = LagTracker::new();
        assert_eq!(tracker.max_advantage(), 0.0);

        tracker.add(PeerId(2));
        tracker.add(PeerId(3));
        tracker.get_mut(PeerId(3)).unwrap().last_remote_tick_received = 6;
        tracker.record_advantage(9, 60, true);
        // peer 2: 10 - 0 = 10, peer 3: 10 - 6 = 4
        assert_eq!(tracker.max_advantage(), 10.0);

        tracker.clear_advantage();
        assert_eq!(tracker.max_advantage(), 0.0);
    }

    #[test]
    fn test_highest_rtt() {
        let mut tracker = LagTracker::new();
        tracker.add(PeerId(2));
        tracker.add(PeerId(3));
        tracker.get_mut(PeerId(2)).unwrap().rtt = 40;
        tracker.get_mut(PeerId(3)).unwrap().rtt = 90;
        assert_eq!(tracker.highest_rtt(), 90);
    }
}
