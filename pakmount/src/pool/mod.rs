//! Bounded worker pool for CPU-heavy decoding.
//!
//! Work is split into [`TaskCategory`]s, each with a fixed number of worker
//! slots. A slot owns one dedicated OS thread fed by a channel; a dispatch
//! sends the job with a correlation id and waits on a oneshot reply, racing
//! it against the category timeout.
//!
//! ```text
//! caller ──acquire permit──► claim idle slot (round robin)
//!        ──Request{id, job}──► worker thread
//!        ◄──Reply{id, outcome}── or timeout
//!                                  │
//!                                  └─► slot Recycling: close channel,
//!                                      spawn fresh worker, slot Idle;
//!                                      permit released when the old
//!                                      thread exits
//! ```
//!
//! A timed-out thread cannot be killed. It is abandoned: its late result is
//! discarded and it keeps holding the task's permit until its job returns,
//! so at most N tasks per category are executing at any time. Callers wait
//! for a permit no longer than the category timeout. Panics inside a task
//! are reported to the caller but do not recycle the slot.

mod config;
mod dispatcher;
mod slot;
mod worker;

pub use config::{CategoryConfig, PoolConfig, TaskCategory, DEFAULT_TASK_TIMEOUT};
pub use dispatcher::WorkerPool;
pub use slot::{SlotSnapshot, SlotState};

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`WorkerPool::dispatch`].
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("{category} task timed out after {}ms", .timeout.as_millis())]
    Timeout {
        category: TaskCategory,
        timeout: Duration,
    },

    #[error("{category} task panicked: {message}")]
    TaskPanicked {
        category: TaskCategory,
        message: String,
    },

    #[error("{category} worker exited unexpectedly")]
    WorkerLost { category: TaskCategory },

    #[error("No {category} worker slot freed up within {}ms", .timeout.as_millis())]
    Saturated {
        category: TaskCategory,
        timeout: Duration,
    },

    #[error("No idle {0} worker slot")]
    NoIdleSlot(TaskCategory),

    #[error("Reply {received} does not match request {expected}")]
    UnexpectedReply { expected: u64, received: u64 },

    #[error("Worker pool is shut down")]
    ShutDown,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl PoolError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PoolError::Timeout { .. })
    }
}

/// Pool activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub dispatched: u64,
    pub completed: u64,
    /// Panicked tasks and lost workers.
    pub failed: u64,
    pub timeouts: u64,
    pub recycled: u64,
    /// Dispatches that gave up waiting for a free slot.
    pub saturated: u64,
    /// Timed-out threads still running their job.
    pub abandoned: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

impl PoolStats {
    pub(crate) fn merge(self, other: &PoolStats) -> PoolStats {
        PoolStats {
            dispatched: self.dispatched + other.dispatched,
            completed: self.completed + other.completed,
            failed: self.failed + other.failed,
            timeouts: self.timeouts + other.timeouts,
            recycled: self.recycled + other.recycled,
            saturated: self.saturated + other.saturated,
            abandoned: self.abandoned + other.abandoned,
            in_flight: self.in_flight + other.in_flight,
            peak_in_flight: self.peak_in_flight.max(other.peak_in_flight),
        }
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dispatched, {} completed, {} failed, {} timeouts, {} recycled, {} abandoned, {} in flight",
            self.dispatched,
            self.completed,
            self.failed,
            self.timeouts,
            self.recycled,
            self.abandoned,
            self.in_flight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error_display() {
        let err = PoolError::Timeout {
            category: TaskCategory::AssetDecode,
            timeout: Duration::from_millis(50),
        };
        assert_eq!(err.to_string(), "asset-decode task timed out after 50ms");
        assert!(err.is_timeout());
        assert!(!PoolError::ShutDown.is_timeout());
    }

    #[test]
    fn test_stats_merge() {
        let a = PoolStats {
            dispatched: 2,
            peak_in_flight: 3,
            ..Default::default()
        };
        let b = PoolStats {
            dispatched: 1,
            timeouts: 1,
            peak_in_flight: 1,
            ..Default::default()
        };
        let merged = a.merge(&b);
        assert_eq!(merged.dispatched, 3);
        assert_eq!(merged.timeouts, 1);
        assert_eq!(merged.peak_in_flight, 3);
    }
}
