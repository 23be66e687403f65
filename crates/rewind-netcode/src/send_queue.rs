//! Outbound local input, windowed into per-peer message batches
//!
//! Every locally generated input payload is kept, encoded, until all peers
//! have acknowledged it through their `next tick requested` field. Each
//! step the unacknowledged range for a peer is cut into batches of at most
//! `max_frames` ticks. When the range is longer than one send can carry,
//! the freshest ticks go first and the oldest unacknowledged ticks fill the
//! remaining messages.

use rewind_core::Tick;
use rewind_rollback_buffer::Error as BufferError;
use std::collections::{BTreeMap, VecDeque};

/// Tick to hex-encoded input blob, one outbound message worth
pub type InputBatch = BTreeMap<Tick, String>;

/// Encoded local input for every tick not yet acknowledged by all peers
#[derive(Debug, Clone)]
pub struct SendQueue {
    blobs: VecDeque<String>,
    start_tick: Tick,
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SendQueue {
    /// Create an empty queue starting at tick 1
    pub fn new() -> Self {
        Self {
            blobs: VecDeque::new(),
            start_tick: 1,
        }
    }

    /// Tick of the oldest queued blob
    pub fn start_tick(&self) -> Tick {
        self.start_tick
    }

    /// Tick the next pushed blob must carry
    pub fn next_tick(&self) -> Tick {
        self.start_tick + self.blobs.len() as Tick
    }

    /// Number of queued blobs
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Queue the encoded input of `tick`
    pub fn push(&mut self, tick: Tick, blob: String) -> Result<(), BufferError> {
        if tick != self.next_tick() {
            return Err(BufferError::NonContiguous {
                expected: self.next_tick(),
                found: tick,
            });
        }
        self.blobs.push_back(blob);
        Ok(())
    }

    /// Get the blob queued for `tick`
    pub fn get(&self, tick: Tick) -> Option<&str> {
        if tick < self.start_tick {
            return None;
        }
        self.blobs
            .get((tick - self.start_tick) as usize)
            .map(String::as_str)
    }

    /// Drop every blob older than `min_tick`
    pub fn trim_to(&mut self, min_tick: Tick) {
        while self.start_tick < min_tick && self.blobs.pop_front().is_some() {
            self.start_tick += 1;
        }
    }

    /// Empty the queue and restart it at `start_tick`
    pub fn reset(&mut self, start_tick: Tick) {
        self.blobs.clear();
        self.start_tick = start_tick;
    }

    /// Batches to send to a peer that still wants `next_tick_requested`
    pub fn batches_for(
        &self,
        next_tick_requested: Tick,
        max_frames: usize,
        max_messages: usize,
    ) -> Vec<InputBatch> {
        let first = (next_tick_requested - self.start_tick).max(0);
        let last = self.blobs.len() as Tick - 1;
        if first > last {
            return Vec::new();
        }

        let cap = (max_frames * max_messages) as Tick;
        if last + 1 - first <= cap {
            return self.chunk((first..=last).rev(), max_frames);
        }

        let new_messages = max_messages.div_ceil(2) as Tick;
        let old_messages = (max_messages / 2) as Tick;
        let frames = max_frames as Tick;

        let newest = (last - new_messages * frames + 1).max(first)..=last;
        let oldest = first..=(first + old_messages * frames - 1).min(last);

        let mut batches = self.chunk(newest.rev(), max_frames);
        batches.extend(self.chunk(oldest, max_frames));
        batches
    }

    fn chunk(&self, indexes: impl Iterator<Item = Tick>, max_frames: usize) -> Vec<InputBatch> {
        let mut batches = Vec::new();
        let mut batch = InputBatch::new();
        for index in indexes {
            if let Some(blob) = self.blobs.get(index as usize) {
                batch.insert(self.start_tick + index, blob.clone());
            }
            if batch.len() == max_frames {
                batches.push(std::mem::take(&mut batch));
            }
        }
        if !batch.is_empty() {
            batches.push(batch);
        }
        batches
    }
}
