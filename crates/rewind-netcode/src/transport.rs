//! Network adapter contract
//!
//! The core never touches sockets. Users implement [`NetworkAdapter`] for
//! their chosen stack (UDP, WebRTC, a relay server, an in-memory loopback in
//! tests). Delivery does not need to be reliable or ordered: input messages
//! are resent until acknowledged and stale ticks are ignored on receipt.

use rewind_core::PeerId;

/// A message drained from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Batched input ticks
    Input { from: PeerId, bytes: Vec<u8> },
    /// Ping to answer
    Ping { from: PeerId, bytes: Vec<u8> },
    /// Answer to one of our pings
    PingBack { from: PeerId, bytes: Vec<u8> },
    /// Saved state forwarded for auditing (host only)
    State { from: PeerId, bytes: Vec<u8> },
}

impl InboundMessage {
    /// Sender of the message
    pub fn from(&self) -> PeerId {
        match self {
            InboundMessage::Input { from, .. }
            | InboundMessage::Ping { from, .. }
            | InboundMessage::PingBack { from, .. }
            | InboundMessage::State { from, .. } => *from,
        }
    }
}

/// Moves tagged byte messages between peers
pub trait NetworkAdapter {
    /// Error type for this adapter
    type Error: std::error::Error;

    /// Send batched input ticks
    fn send_input(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Send a ping
    fn send_ping(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Answer a ping
    fn send_ping_back(&mut self, peer: PeerId, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Forward saved state to the host
    ///
    /// Adapters that do not support auditing can keep the default.
    fn send_state(&mut self, _peer: PeerId, _bytes: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Drain every message received since the last poll
    fn poll(&mut self) -> Vec<InboundMessage>;

    /// Called when the session starts
    fn start(&mut self) {}

    /// Called when the session stops
    fn stop(&mut self) {}
}
