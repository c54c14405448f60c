//! One complete scoring run: begin, process events, end.

use std::sync::atomic::AtomicBool;

use gray_core::source::PrimarySource;
use gray_core::{RunAggregator, RunResult, ScoringError};
use thiserror::Error;

use crate::backend::{ComputeBackend, ComputeError, DeviceInfo, EngineFactory, EventJob};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Compute(#[from] ComputeError),
}

/// Results of a finished run.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub device: DeviceInfo,
    /// Per-worker results, in worker order.
    pub locals: Vec<RunResult>,
    /// `None` when the run had no events.
    pub global: Option<RunResult>,
}

/// Run `event_count` events of `source` through `backend` and aggregate them.
///
/// When the backend fails or is cancelled, the run is abandoned: the workers'
/// sums are discarded, the output is closed unwritten and no dose is
/// computed.
pub fn run_session(
    aggregator: &mut RunAggregator,
    backend: &dyn ComputeBackend,
    source: &dyn PrimarySource,
    engines: &EngineFactory,
    event_count: u64,
    cancel: &AtomicBool,
) -> Result<SessionReport, SessionError> {
    let device = backend.device_info();
    log::info!("Starting run of {} events on {}", event_count, device.name);

    let recorder = aggregator.begin_run()?;
    let reducer = aggregator.context().reducer().clone();
    let job = EventJob {
        event_count,
        source,
        engines,
        recorder: &recorder,
        reducer: &reducer,
        cancel,
    };

    let tally = match backend.run_events(&job) {
        Ok(tally) => tally,
        Err(e) => {
            log::warn!("Run failed: {}", e);
            if let Err(close) = aggregator.abandon_run() {
                log::warn!("Failed to close output after aborted run: {}", close);
            }
            return Err(e.into());
        }
    };

    let mut locals = Vec::with_capacity(tally.workers.len());
    for worker in &tally.workers {
        match aggregator.local_result(worker.worker, &worker.accumulable, worker.events) {
            Ok(Some(local)) => {
                log::info!("\n{}", local.summary());
                locals.push(local);
            }
            Ok(None) => {}
            // end_run reports the same failure for the whole run.
            Err(e) => log::debug!("No local result for worker {}: {}", worker.worker, e),
        }
    }

    let global = aggregator.end_run(tally.events())?;
    Ok(SessionReport {
        device,
        locals,
        global,
    })
}
