//! Per-tick frames stored in the input and state windows

use crate::TickFrame;
use rewind_core::{IndexMap, InputPayload, ObjectPath, PeerId, Tick, ValueMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One peer's input for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInput {
    /// The payload (real or predicted)
    pub payload: InputPayload,
    /// True until replaced with the peer's real input
    pub predicted: bool,
}

/// Inputs of every peer for one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFrame {
    tick: Tick,
    players: BTreeMap<PeerId, PeerInput>,
}

impl InputFrame {
    /// Create an empty frame
    pub fn new(tick: Tick) -> Self {
        Self {
            tick,
            players: BTreeMap::new(),
        }
    }

    /// Get a peer's payload (real or predicted)
    pub fn player_input(&self, peer: PeerId) -> Option<&InputPayload> {
        self.players.get(&peer).map(|p| &p.payload)
    }

    /// Get a peer's entry
    pub fn player(&self, peer: PeerId) -> Option<&PeerInput> {
        self.players.get(&peer)
    }

    /// A peer's input counts as predicted until its real input is stored
    pub fn is_player_input_predicted(&self, peer: PeerId) -> bool {
        self.players.get(&peer).map_or(true, |p| p.predicted)
    }

    /// Store a peer's real input, replacing any prediction
    pub fn set_real(&mut self, peer: PeerId, payload: InputPayload) {
        self.players.insert(
            peer,
            PeerInput {
                payload,
                predicted: false,
            },
        );
    }

    /// Store a prediction for a peer
    ///
    /// Real input is never downgraded back to a prediction; returns `false`
    /// and leaves the frame unchanged in that case.
    pub fn set_predicted(&mut self, peer: PeerId, payload: InputPayload) -> bool {
        if !self.is_player_input_predicted(peer) {
            return false;
        }
        self.players.insert(
            peer,
            PeerInput {
                payload,
                predicted: true,
            },
        );
        true
    }

    /// Peers (from `peers`) without real input in this frame
    pub fn missing_peers<I>(&self, peers: I) -> Vec<PeerId>
    where
        I: IntoIterator<Item = PeerId>,
    {
        peers
            .into_iter()
            .filter(|peer| self.is_player_input_predicted(*peer))
            .collect()
    }

    /// True iff every peer in `peers` has real input in this frame
    pub fn is_complete<I>(&self, peers: I) -> bool
    where
        I: IntoIterator<Item = PeerId>,
    {
        peers
            .into_iter()
            .all(|peer| !self.is_player_input_predicted(peer))
    }

    /// Iterate over stored peer entries
    pub fn players(&self) -> impl Iterator<Item = (&PeerId, &PeerInput)> {
        self.players.iter()
    }
}

impl TickFrame for InputFrame {
    fn tick(&self) -> Tick {
        self.tick
    }
}

/// Saved state of every simulation object, keyed by path
pub type StateMap = IndexMap<ObjectPath, ValueMap>;

/// Snapshot of all simulation objects after a tick ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFrame {
    /// Tick this snapshot was taken after
    pub tick: Tick,
    /// Saved state per object
    pub data: StateMap,
}

impl StateFrame {
    /// Create a snapshot
    pub fn new(tick: Tick, data: StateMap) -> Self {
        Self { tick, data }
    }

    /// Saved state of one object
    pub fn get(&self, path: &ObjectPath) -> Option<&ValueMap> {
        self.data.get(path)
    }
}

impl TickFrame for StateFrame {
    fn tick(&self) -> Tick {
        self.tick
    }
}
