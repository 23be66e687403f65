//! Time for tick-based simulation
//!
//! - `Tick` - Logical time unit (signed: the simulation cursor starts
//!   behind tick zero by the input delay)
//! - `TickRate` - Fixed simulation step length
//! - `Clock` - Wall-clock milliseconds, used only for ping round trips and
//!   never for anything that feeds the simulation

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A discrete tick identifier (logical time unit)
pub type Tick = i64;

/// Fixed simulation rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRate {
    /// Simulation steps per second
    pub ticks_per_second: u32,
}

impl TickRate {
    /// Create a tick rate
    pub fn new(ticks_per_second: u32) -> Self {
        Self {
            ticks_per_second: ticks_per_second.max(1),
        }
    }

    /// Length of one tick in seconds
    pub fn delta_secs(&self) -> f32 {
        1.0 / self.ticks_per_second.max(1) as f32
    }

    /// Fraction of a tick covered by `elapsed_secs`, clamped to `[0, 1]`
    ///
    /// Used as the interpolation weight between the two latest states.
    pub fn fraction(&self, elapsed_secs: f32) -> f32 {
        (elapsed_secs / self.delta_secs()).clamp(0.0, 1.0)
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self::new(60)
    }
}

/// Source of wall-clock time in milliseconds
pub trait Clock {
    /// Current time in milliseconds
    fn now_millis(&self) -> u64;
}

/// System wall clock (UTC milliseconds since the Unix epoch)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually driven clock for tests and replays
///
/// Clones share the same time, so a test can keep one handle and advance
/// the clock a session owns.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at `millis`
    pub fn new(millis: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(millis)),
        }
    }

    /// Set the current time
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Advance the current time
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
