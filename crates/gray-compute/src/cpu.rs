//! CPU compute backend using a Rayon thread pool.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use gray_core::{EventAccumulator, RunAccumulable};
use rayon::prelude::*;

use crate::backend::{partition, ComputeBackend, ComputeError, DeviceInfo, EventJob, RunTally, WorkerTally};

/// CPU backend running one worker per pool thread, each over a contiguous
/// range of event ids.
pub struct CpuBackend {
    num_threads: usize,
}

impl CpuBackend {
    /// Create a new CPU backend using all available threads.
    pub fn new() -> Self {
        Self {
            num_threads: rayon::current_num_threads(),
        }
    }

    /// Create a CPU backend with a specified thread count.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: num_threads.max(1),
        }
    }

    fn run_worker(
        job: &EventJob<'_>,
        worker: usize,
        events: Range<u64>,
        abort: &AtomicBool,
    ) -> Result<WorkerTally, ComputeError> {
        let mut engine = (job.engines)(worker);
        let mut event = EventAccumulator::new();
        let mut accumulable = RunAccumulable::new();

        for event_id in events.clone() {
            if job.is_cancelled() || abort.load(Ordering::Relaxed) {
                log::debug!("Worker {} stopped before event {}", worker, event_id);
                return Err(ComputeError::Cancelled);
            }
            event.reset();
            let primary = job.source.primary(event_id);
            let step = engine
                .transport(event_id, &primary, &mut event)
                .map_err(ComputeError::from)
                .and_then(|()| {
                    let edep = event.flush();
                    job.recorder.record(edep)?;
                    Ok(edep)
                });
            match step {
                Ok(edep) => accumulable.fold(edep),
                Err(e) => {
                    abort.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }

        let tally = WorkerTally {
            worker,
            events: events.end - events.start,
            accumulable: accumulable.clone(),
        };
        job.reducer.hand_off(worker, accumulable);
        Ok(tally)
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            workers: self.num_threads,
        }
    }

    fn run_events(&self, job: &EventJob<'_>) -> Result<RunTally, ComputeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(|i| format!("gray-worker-{i}"))
            .build()
            .map_err(|e| ComputeError::ThreadPool(e.to_string()))?;

        let ranges = partition(job.event_count, self.num_threads);
        log::info!(
            "Processing {} events on {} worker(s)",
            job.event_count,
            ranges.len()
        );

        let abort = AtomicBool::new(false);
        let outcomes: Vec<Result<WorkerTally, ComputeError>> = pool.install(|| {
            ranges
                .into_par_iter()
                .enumerate()
                .map(|(worker, events)| Self::run_worker(job, worker, events, &abort))
                .collect()
        });

        let mut workers = Vec::with_capacity(outcomes.len());
        let mut cancelled = false;
        for outcome in outcomes {
            match outcome {
                Ok(tally) => workers.push(tally),
                Err(ComputeError::Cancelled) => cancelled = true,
                // A real failure takes precedence over the cancellations it caused.
                Err(e) => return Err(e),
            }
        }
        if cancelled {
            return Err(ComputeError::Cancelled);
        }

        let handed_off = job.reducer.contributors();
        if handed_off != workers.len() {
            return Err(ComputeError::IncompleteRun {
                expected: workers.len(),
                handed_off,
            });
        }
        Ok(RunTally { workers })
    }
}
