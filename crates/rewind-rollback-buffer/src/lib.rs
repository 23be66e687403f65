//! Rewind Rollback Buffer - Contiguous tick windows for rollback
//!
//! This crate provides the bounded history a rollback session keeps:
//!
//! - **Contiguous**: a window stores exactly the ticks
//!   `start_tick ..= start_tick + len - 1`, never with gaps
//! - **O(1) lookup**: index = tick - start_tick
//! - **Front retirement**: old frames leave from the front, advancing
//!   `start_tick`; rollback truncation drops frames from the back
//!
//! The same window type backs both the input buffer ([`InputFrame`]) and
//! the state buffer ([`StateFrame`]). What may be retired, and when, is
//! decided by the scheduler; the window only enforces contiguity.
//!
//! # Example
//!
//! ```rust
//! use rewind_rollback_buffer::{InputFrame, TickWindow};
//!
//! let mut inputs: TickWindow<InputFrame> = TickWindow::new(1);
//!
//! // Requesting tick 3 fills ticks 1 and 2 with empty frames
//! inputs.get_or_create(3, InputFrame::new).unwrap();
//! assert_eq!(inputs.len(), 3);
//! assert_eq!(inputs.last_tick(), Some(3));
//!
//! // Retire the oldest frame
//! inputs.pop_front();
//! assert_eq!(inputs.start_tick(), 2);
//! assert!(inputs.get(1).is_none());
//! ```

mod error;
mod frame;

pub use error::{Error, Result};
pub use frame::{InputFrame, PeerInput, StateFrame, StateMap};

use rewind_core::Tick;
use std::collections::VecDeque;

/// A frame stored in a [`TickWindow`]
pub trait TickFrame {
    /// The tick this frame belongs to
    fn tick(&self) -> Tick;
}

/// A contiguous, tick-addressed sliding window of frames
#[derive(Debug, Clone)]
pub struct TickWindow<F> {
    /// Frames, oldest first
    frames: VecDeque<F>,
    /// Tick of `frames[0]` (or of the next frame to be stored when empty)
    start_tick: Tick,
}

impl<F: TickFrame> TickWindow<F> {
    /// Create an empty window whose first frame will be `start_tick`
    pub fn new(start_tick: Tick) -> Self {
        Self {
            frames: VecDeque::new(),
            start_tick,
        }
    }

    /// Tick of the oldest stored frame
    pub fn start_tick(&self) -> Tick {
        self.start_tick
    }

    /// Tick the next pushed frame must have
    pub fn next_tick(&self) -> Tick {
        self.start_tick + self.frames.len() as Tick
    }

    /// Tick of the newest stored frame
    pub fn last_tick(&self) -> Option<Tick> {
        self.frames.back().map(TickFrame::tick)
    }

    /// Number of stored frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the window is empty
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn index_of(&self, tick: Tick) -> Option<usize> {
        if tick < self.start_tick {
            return None;
        }
        let index = (tick - self.start_tick) as usize;
        (index < self.frames.len()).then_some(index)
    }

    /// Get the frame for a tick, if it is inside the window
    pub fn get(&self, tick: Tick) -> Option<&F> {
        let frame = self.frames.get(self.index_of(tick)?)?;
        debug_assert_eq!(frame.tick(), tick, "window frame has mismatched tick");
        Some(frame)
    }

    /// Get the frame for a tick mutably, if it is inside the window
    pub fn get_mut(&mut self, tick: Tick) -> Option<&mut F> {
        let index = self.index_of(tick)?;
        self.frames.get_mut(index)
    }

    /// Get the frame for a tick, extending the window forward if needed
    ///
    /// Every tick between the current end of the window and `tick` is
    /// filled with a fresh frame from `make`. Ticks below the window have
    /// been retired and cannot be recreated.
    pub fn get_or_create(&mut self, tick: Tick, mut make: impl FnMut(Tick) -> F) -> Result<&mut F> {
        if tick < self.start_tick {
            return Err(Error::BelowWindow {
                tick,
                start: self.start_tick,
            });
        }
        while self.next_tick() <= tick {
            let next = self.next_tick();
            self.frames.push_back(make(next));
        }
        let index = (tick - self.start_tick) as usize;
        Ok(&mut self.frames[index])
    }

    /// Append a frame; it must continue the window
    pub fn push(&mut self, frame: F) -> Result<()> {
        let expected = self.next_tick();
        if frame.tick() != expected {
            return Err(Error::NonContiguous {
                expected,
                found: frame.tick(),
            });
        }
        self.frames.push_back(frame);
        Ok(())
    }

    /// Oldest stored frame
    pub fn front(&self) -> Option<&F> {
        self.frames.front()
    }

    /// Newest stored frame
    pub fn back(&self) -> Option<&F> {
        self.frames.back()
    }

    /// Frame `n` positions before the newest (`from_back(0)` is the newest)
    pub fn from_back(&self, n: usize) -> Option<&F> {
        let len = self.frames.len();
        if n >= len {
            return None;
        }
        self.frames.get(len - 1 - n)
    }

    /// Retire the oldest frame, advancing the window start
    pub fn pop_front(&mut self) -> Option<F> {
        let frame = self.frames.pop_front()?;
        self.start_tick += 1;
        Some(frame)
    }

    /// Drop the newest `count` frames
    pub fn truncate_back(&mut self, count: usize) {
        let keep = self.frames.len().saturating_sub(count);
        self.frames.truncate(keep);
    }

    /// Remove every frame and restart the window at `start_tick`
    pub fn reset(&mut self, start_tick: Tick) {
        self.frames.clear();
        self.start_tick = start_tick;
    }

    /// Iterate over frames, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &F> {
        self.frames.iter()
    }

    /// Get statistics about the window
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            count: self.frames.len(),
            oldest_tick: self.start_tick,
            newest_tick: self.last_tick().unwrap_or(self.start_tick - 1),
        }
    }
}

/// Statistics about a tick window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    /// Number of stored frames
    pub count: usize,
    /// Oldest tick in the window
    pub oldest_tick: Tick,
    /// Newest tick in the window (`oldest_tick - 1` when empty)
    pub newest_tick: Tick,
}

impl BufferStats {
    /// Number of ticks covered by the window
    pub fn span(&self) -> Tick {
        self.newest_tick - self.oldest_tick + 1
    }
}
