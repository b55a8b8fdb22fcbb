//! Worker slots.
//!
//! ```text
//! Idle ──dispatch──► Busy ──reply──► Idle
//!                     │
//!                  timeout
//!                     ▼
//!                 Recycling ──new worker──► Idle
//! ```
//!
//! A slot in `Recycling` still holds the semaphore permit of the task that
//! timed out, so the number of idle slots never drops below the number of
//! available permits.

use std::fmt;

use super::worker::Worker;

/// Lifecycle state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Busy,
    Recycling,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotState::Idle => "idle",
            SlotState::Busy => "busy",
            SlotState::Recycling => "recycling",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub index: usize,
    pub state: SlotState,
    /// Incremented every time the slot's worker is replaced.
    pub generation: u64,
}

pub(crate) struct Slot {
    pub index: usize,
    pub state: SlotState,
    pub generation: u64,
    /// `None` after shutdown or a failed respawn.
    pub worker: Option<Worker>,
}

impl Slot {
    pub(crate) fn new(index: usize, worker: Worker) -> Self {
        Self {
            index,
            state: SlotState::Idle,
            generation: 0,
            worker: Some(worker),
        }
    }

    pub(crate) fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            index: self.index,
            state: self.state,
            generation: self.generation,
        }
    }
}

/// Pick the next idle slot at or after `cursor`, wrapping around.
pub(crate) fn next_idle(slots: &[Slot], cursor: usize) -> Option<usize> {
    let n = slots.len();
    (0..n)
        .map(|i| (cursor + i) % n)
        .find(|&i| slots[i].state == SlotState::Idle && slots[i].worker.is_some())
}
