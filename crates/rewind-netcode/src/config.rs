//! Session configuration
//!
//! Every tunable of the rollback scheduler lives in [`SyncConfig`]. The
//! defaults match a 60 Hz simulation with two ticks of input delay.
//! Configurations can be written in RON; missing fields take defaults.
//!
//! # Example
//!
//! ```
//! use rewind_netcode::SyncConfig;
//!
//! let config = SyncConfig::from_ron_str("(input_delay: 3, interpolation: false)").unwrap();
//! assert_eq!(config.input_delay, 3);
//! assert!(!config.interpolation);
//! assert_eq!(config.max_buffer_size, 30);
//! ```

use crate::error::{Error, Result};
use rewind_core::TickRate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a rollback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Ticks of history kept in the state and input windows
    pub max_buffer_size: usize,

    /// Advantage samples averaged before the skip decision is refreshed
    pub ticks_to_recalculate_advantage: usize,

    /// Ticks the simulation cursor trails local input generation
    pub input_delay: i64,

    /// Maximum ticks carried by one outbound input message
    pub max_input_frames_per_message: usize,

    /// Maximum input messages sent to one peer per step
    pub max_messages_at_once: usize,

    /// Consecutive lost-sync steps before the session is abandoned
    pub max_input_buffer_underruns: u32,

    /// Grace steps held after sync is regained
    pub skip_ticks_after_sync_regained: u32,

    /// Render interpolated state between the two latest ticks
    pub interpolation: bool,

    /// Roll back at least one tick every step while interpolating
    ///
    /// Required whenever `interpolation` is on: objects hold the older of
    /// the two interpolation states between steps, so the newest tick has
    /// to be re-simulated before advancing.
    pub force_interpolation_rollback: bool,

    /// Always roll back this many ticks (desync smoke testing; 0 = off)
    pub rollback_debug_ticks: usize,

    /// Outbound input messages above this size are traced
    pub debug_message_bytes: usize,

    /// Forward completed local state to the host for auditing
    pub log_state: bool,

    /// Milliseconds between pings to each peer
    pub ping_interval_ms: u64,

    /// Fixed simulation rate
    pub ticks_per_second: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: 30,
            ticks_to_recalculate_advantage: 60,
            input_delay: 2,
            max_input_frames_per_message: 5,
            max_messages_at_once: 2,
            max_input_buffer_underruns: 300,
            skip_ticks_after_sync_regained: 2,
            interpolation: true,
            force_interpolation_rollback: true,
            rollback_debug_ticks: 0,
            debug_message_bytes: 700,
            log_state: true,
            ping_interval_ms: 1000,
            ticks_per_second: 60,
        }
    }
}

impl SyncConfig {
    /// Parse a configuration from RON text
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: SyncConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_ron_str(&text)
    }

    /// Serialize to pretty RON
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject configurations the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_buffer_size < 2 {
            return Err(Error::Config("max_buffer_size must be at least 2".into()));
        }
        // the tick 0 snapshot is taken while the cursor passes 0
        if self.input_delay < 1 {
            return Err(Error::Config("input_delay must be at least 1".into()));
        }
        if self.max_input_frames_per_message == 0 {
            return Err(Error::Config(
                "max_input_frames_per_message must be positive".into(),
            ));
        }
        if self.max_messages_at_once == 0 {
            return Err(Error::Config("max_messages_at_once must be positive".into()));
        }
        if self.ticks_per_second == 0 {
            return Err(Error::Config("ticks_per_second must be positive".into()));
        }
        Ok(())
    }

    /// Fixed simulation rate
    pub fn tick_rate(&self) -> TickRate {
        TickRate::new(self.ticks_per_second)
    }

    /// Most ticks offered to one peer in a single step
    pub fn max_frames_per_send(&self) -> usize {
        self.max_input_frames_per_message * self.max_messages_at_once
    }
}
