//! A tick-counting timer that survives rollback
//!
//! All timer state is part of the saved state, so a replayed tick counts
//! down exactly as the first run did. The timeout callback receives the
//! total number of timeouts so far; a replayed timeout reports the same
//! count again, which lets callers ignore repeats.

use crate::object::SimulationObject;
use rewind_core::{InputMap, Value, ValueMap};

type TimeoutCallback = Box<dyn FnMut(u64)>;

/// Fires every `wait_ticks` simulated ticks
pub struct NetworkTimer {
    one_shot: bool,
    wait_ticks: i64,
    ticks_left: i64,
    running: bool,
    timeouts: u64,
    on_timeout: Option<TimeoutCallback>,
}

impl std::fmt::Debug for NetworkTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkTimer")
            .field("one_shot", &self.one_shot)
            .field("wait_ticks", &self.wait_ticks)
            .field("ticks_left", &self.ticks_left)
            .field("running", &self.running)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl NetworkTimer {
    /// Create a stopped, repeating timer
    pub fn new(wait_ticks: i64) -> Self {
        Self {
            one_shot: false,
            wait_ticks,
            ticks_left: 0,
            running: false,
            timeouts: 0,
            on_timeout: None,
        }
    }

    /// Start immediately
    pub fn autostart(mut self) -> Self {
        self.start(None);
        self
    }

    /// Stop after the first timeout
    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    /// Call `callback` with the timeout count on every timeout
    pub fn on_timeout(mut self, callback: impl FnMut(u64) + 'static) -> Self {
        self.on_timeout = Some(Box::new(callback));
        self
    }

    /// (Re)start the countdown, optionally with a new period
    pub fn start(&mut self, ticks: Option<i64>) {
        if let Some(ticks) = ticks.filter(|t| *t > 0) {
            self.wait_ticks = ticks;
        }
        self.ticks_left = self.wait_ticks;
        self.running = true;
    }

    /// Stop counting
    pub fn stop(&mut self) {
        self.running = false;
        self.ticks_left = 0;
    }

    pub fn is_stopped(&self) -> bool {
        !self.running
    }

    pub fn ticks_left(&self) -> i64 {
        self.ticks_left
    }

    /// Timeouts so far
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }
}

impl SimulationObject for NetworkTimer {
    fn network_tick(&mut self, _delta: f32, _input: &InputMap) {
        if !self.running {
            return;
        }
        if self.ticks_left <= 0 {
            self.running = false;
            return;
        }

        self.ticks_left -= 1;
        if self.ticks_left == 0 {
            if self.one_shot {
                self.running = false;
            } else {
                self.ticks_left = self.wait_ticks;
            }
            self.timeouts += 1;
            if let Some(callback) = self.on_timeout.as_mut() {
                callback(self.timeouts);
            }
        }
    }

    fn save_state(&self) -> ValueMap {
        let mut state = ValueMap::new();
        state.insert("running".into(), Value::Bool(self.running));
        state.insert("wait_ticks".into(), Value::Int(self.wait_ticks));
        state.insert("ticks_left".into(), Value::Int(self.ticks_left));
        state.insert("timeouts".into(), Value::Int(self.timeouts as i64));
        state
    }

    fn load_state(&mut self, state: &ValueMap) {
        let int = |key: &str| state.get(key).and_then(Value::as_int).unwrap_or(0);
        self.running = state
            .get("running")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        self.wait_ticks = int("wait_ticks");
        self.ticks_left = int("ticks_left");
        self.timeouts = int("timeouts").max(0) as u64;
    }

    fn sync_stopped(&mut self) {
        self.stop();
    }
}
