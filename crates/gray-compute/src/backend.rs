//! Compute backend trait and run bookkeeping.
//!
//! The [`ComputeBackend`] trait isolates the scoring pipeline from how events
//! are scheduled. A backend must give every worker its own transport engine,
//! event accumulator and run accumulable, and must hand a worker's
//! accumulable to the reducer only after all of that worker's events are
//! done.

use std::sync::atomic::{AtomicBool, Ordering};

use gray_core::run::EventRecorder;
use gray_core::sink::SinkError;
use gray_core::source::PrimarySource;
use gray_core::transport::{TransportEngine, TransportError};
use gray_core::{Reducer, RunAccumulable};
use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to record event: {0}")]
    Recording(#[from] SinkError),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(String),

    #[error("Only {handed_off} of {expected} workers handed off their results")]
    IncompleteRun { expected: usize, handed_off: usize },
}

/// Describes a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub workers: usize,
}

/// Builds the transport engine of one worker, given its index.
pub type EngineFactory = dyn Fn(usize) -> Box<dyn TransportEngine> + Send + Sync;

/// Everything a backend needs to process the events of one run.
pub struct EventJob<'a> {
    pub event_count: u64,
    pub source: &'a dyn PrimarySource,
    pub engines: &'a EngineFactory,
    pub recorder: &'a EventRecorder,
    pub reducer: &'a Reducer,
    /// Checked between events.
    pub cancel: &'a AtomicBool,
}

impl EventJob<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// What one worker did.
#[derive(Debug, Clone)]
pub struct WorkerTally {
    pub worker: usize,
    pub events: u64,
    /// Copy of the sums the worker handed off, kept for its local summary.
    pub accumulable: RunAccumulable,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunTally {
    pub workers: Vec<WorkerTally>,
}

impl RunTally {
    /// Total events processed by all workers.
    pub fn events(&self) -> u64 {
        self.workers.iter().map(|w| w.events).sum()
    }
}

/// Abstraction over event schedulers.
pub trait ComputeBackend: Send + Sync {
    fn device_info(&self) -> DeviceInfo;

    /// Process every event of `job`.
    ///
    /// On success every worker has handed off its accumulable. On error
    /// (cancellation or a failed event) the reducer may hold a subset of the
    /// contributions and must be discarded by the caller.
    fn run_events(&self, job: &EventJob<'_>) -> Result<RunTally, ComputeError>;
}

/// Split `events` into at most `workers` contiguous, non-empty id ranges.
pub fn partition(events: u64, workers: usize) -> Vec<std::ops::Range<u64>> {
    let workers = workers.max(1) as u64;
    let base = events / workers;
    let extra = events % workers;
    let mut ranges = Vec::new();
    let mut start = 0;
    for w in 0..workers {
        let len = base + u64::from(w < extra);
        if len == 0 {
            break;
        }
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_covers_all_events() {
        let ranges = partition(10, 3);
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);
    }

    #[test]
    fn test_partition_fewer_events_than_workers() {
        assert_eq!(partition(2, 8), vec![0..1, 1..2]);
        assert!(partition(0, 4).is_empty());
    }

    #[test]
    fn test_partition_zero_workers() {
        assert_eq!(partition(5, 0), vec![0..5]);
    }
}
