//! Render-rate interpolation between the two newest saved states
//!
//! The fixed step captures a `(from, to)` pair per object after every
//! advance; the variable-rate render step only reads those pairs and the
//! elapsed time to compute a blend weight. Nothing here touches the rollback
//! buffers.

use indexmap::IndexMap;
use rewind_core::{ObjectPath, TickRate, ValueMap};
use rewind_rollback_buffer::StateFrame;

/// Snapshot pairs and timing for the render step
#[derive(Debug, Clone, Default)]
pub struct Interpolator {
    pairs: IndexMap<ObjectPath, (ValueMap, ValueMap)>,
    time_since_last_tick: f32,
    tick_rate: TickRate,
}

impl Interpolator {
    /// Create an interpolator for the given simulation rate
    pub fn new(tick_rate: TickRate) -> Self {
        Self {
            pairs: IndexMap::new(),
            time_since_last_tick: 0.0,
            tick_rate,
        }
    }

    /// Capture the pair to blend between until the next tick
    ///
    /// Objects missing from either snapshot are not interpolated.
    pub fn capture(&mut self, from: &StateFrame, to: &StateFrame) {
        self.pairs.clear();
        for (path, new) in &to.data {
            if let Some(old) = from.get(path) {
                self.pairs.insert(path.clone(), (old.clone(), new.clone()));
            }
        }
        self.time_since_last_tick = 0.0;
    }

    /// Account for render time passing and return the blend weight
    pub fn advance(&mut self, delta_secs: f32) -> f32 {
        self.time_since_last_tick += delta_secs;
        self.weight()
    }

    /// Current blend weight in `[0, 1]`
    pub fn weight(&self) -> f32 {
        self.tick_rate.fraction(self.time_since_last_tick)
    }

    /// Seconds since the last captured tick
    pub fn time_since_last_tick(&self) -> f32 {
        self.time_since_last_tick
    }

    /// Captured pairs as `(path, from, to)`
    pub fn pairs(&self) -> impl Iterator<Item = (&ObjectPath, &ValueMap, &ValueMap)> {
        self.pairs.iter().map(|(path, (old, new))| (path, old, new))
    }

    /// Check if anything was captured
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Drop captured pairs and timing
    pub fn clear(&mut self) {
        self.pairs.clear();
        self.time_since_last_tick = 0.0;
    }
}
