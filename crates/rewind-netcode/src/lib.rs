//! Rewind Netcode - Deterministic rollback synchronization
//!
//! Every peer advances its simulation immediately, predicting the input of
//! remote peers. When real input arrives and disagrees with a prediction,
//! the session reloads an older snapshot and replays forward:
//!
//! - **Scheduling**: [`SyncManager`] decides each fixed step whether to
//!   hold, skip, roll back or advance
//! - **Prediction**: missing remote input is synthesized by the objects
//!   that consume it ([`SimulationObject::predict_input`])
//! - **Lag tracking**: per-peer tick advantage throttles a peer running
//!   ahead of its slowest counterpart
//! - **Input framing**: unacknowledged local input is resent in bounded
//!   batches ([`SendQueue`])
//! - **Desync detection**: input hashes trigger rollbacks; the host audits
//!   the state other peers report ([`StateAuditor`])
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         SyncManager                          │
//! │  ┌────────────┐   ┌──────────────┐   ┌────────────────────┐  │
//! │  │ LagTracker │──▶│  skip/hold   │──▶│ rollback + replay  │  │
//! │  └────────────┘   └──────────────┘   └────────────────────┘  │
//! │        ▲                                       │             │
//! │        │          ┌──────────────┐             ▼             │
//! │  ┌────────────┐   │ TickWindow   │   ┌────────────────────┐  │
//! │  │ SendQueue  │   │ input/state  │◀──│  ObjectRegistry    │  │
//! │  └────────────┘   └──────────────┘   └────────────────────┘  │
//! └────────│──────────────────▲───────────────────────────────────┘
//!          ▼                  │
//!     NetworkAdapter ──── InboundMessage
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use rewind_core::{PeerId, SystemClock};
//! use rewind_netcode::{Capabilities, SyncConfig, SyncManager};
//!
//! let mut sync = SyncManager::new(
//!     SyncConfig::default(),
//!     PeerId(2),
//!     PeerId(1),
//!     my_adapter,
//!     Box::new(SystemClock),
//! )?;
//! sync.register_object("players/2", PeerId(2), Capabilities::all(), Box::new(player))?;
//! sync.add_peer(PeerId(1))?;
//! sync.start();
//!
//! loop {
//!     sync.physics_step();          // once per fixed tick
//!     sync.render_step(frame_time); // once per rendered frame
//!     for event in sync.drain_events() {
//!         println!("{event:?}");
//!     }
//! }
//! ```

mod audit;
mod config;
mod error;
mod events;
mod interpolation;
mod lag;
mod message;
mod object;
mod peer;
mod send_queue;
mod sync;
mod timer;
mod transport;

pub use audit::{StateAuditor, StateMismatch};
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use events::{SyncEvent, SyncObserver};
pub use interpolation::Interpolator;
pub use lag::LagTracker;
pub use message::{decode_payload, encode_payload, InputMessage, PingMessage, StateMessage};
pub use object::{Capabilities, ObjectRegistry, SimulationObject};
pub use peer::Peer;
pub use send_queue::{InputBatch, SendQueue};
pub use sync::{StepOutcome, SyncManager};
pub use timer::NetworkTimer;
pub use transport::{InboundMessage, NetworkAdapter};

// Re-export the frame types sessions expose
pub use rewind_rollback_buffer::{BufferStats, InputFrame, StateFrame, StateMap};
