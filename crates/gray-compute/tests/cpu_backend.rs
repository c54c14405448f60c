//! Runs through the CPU backend against an in-memory sink.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use gray_compute::{run_session, ComputeError, CpuBackend, EngineFactory, SessionError};
use gray_core::event::EventAccumulator;
use gray_core::sink::MemorySink;
use gray_core::source::{ParticleGun, PrimaryVertex};
use gray_core::transport::{ReplayTransport, TransportEngine, TransportError};
use gray_core::{RunAggregator, RunContext, RunResult};
use gray_geometry::presets::{self, DETECTOR};
use gray_materials::NistDatabase;

fn aggregator() -> (RunAggregator, Arc<Mutex<MemorySink>>) {
    let sink = Arc::new(Mutex::new(MemorySink::new()));
    let context = RunContext::new(
        Arc::new(presets::germanium_detector().unwrap()),
        Arc::new(NistDatabase::new()),
        sink.clone(),
    )
    .with_scoring_volume(DETECTOR)
    .unwrap();
    (RunAggregator::new(context, "B4.csv"), sink)
}

fn replay(deposits: &[f64]) -> Box<EngineFactory> {
    let replay = ReplayTransport::from_deposits(deposits).unwrap();
    Box::new(move |_worker: usize| Box::new(replay.clone()) as Box<dyn TransportEngine>)
}

fn run(threads: usize, deposits: &[f64], events: u64) -> RunResult {
    let (mut aggregator, _sink) = aggregator();
    let report = run_session(
        &mut aggregator,
        &CpuBackend::with_threads(threads),
        &ParticleGun::default(),
        replay(deposits).as_ref(),
        events,
        &AtomicBool::new(false),
    )
    .unwrap();
    report.global.unwrap()
}

#[test]
fn test_multi_threaded_matches_single_threaded() {
    let deposits: Vec<f64> = (0..97).map(|i| (i % 13) as f64 * 0.21).collect();
    let single = run(1, &deposits, 1000);
    for threads in [2, 4, 7] {
        let multi = run(threads, &deposits, 1000);
        assert_eq!(multi.event_count, 1000);
        assert_relative_eq!(multi.dose, single.dose, max_relative = 1e-9);
        assert_relative_eq!(multi.rms_dose, single.rms_dose, max_relative = 1e-9);
    }
}

#[test]
fn test_dose_scenario_on_four_workers() {
    let result = run(4, &[1.0, 2.0, 1.5, 0.5], 4);
    let mass = 5.323 * std::f64::consts::PI * 3.315 * 3.315 * 5.13;
    assert_relative_eq!(result.sum, 5.0);
    assert_relative_eq!(result.sum_squares, 7.5);
    assert_relative_eq!(result.dose, 5.0 / mass, max_relative = 1e-12);
    assert_relative_eq!(result.rms_dose, 1.25f64.sqrt() / mass, max_relative = 1e-12);
}

#[test]
fn test_every_event_is_recorded_once() {
    let (mut aggregator, sink) = aggregator();
    let report = run_session(
        &mut aggregator,
        &CpuBackend::with_threads(3),
        &ParticleGun::default(),
        replay(&[0.5, 1.0]).as_ref(),
        50,
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(report.locals.len(), 3);
    let local_events: u64 = report.locals.iter().map(|r| r.event_count).sum();
    assert_eq!(local_events, 50);

    let sink = sink.lock().unwrap();
    assert_eq!(sink.rows().len(), 50);
    assert_eq!(sink.histogram("Eabs").unwrap().entries(), 50);
    assert_eq!(sink.write_count(), 1);
}

#[test]
fn test_cancelled_run_computes_no_dose() {
    let (mut aggregator, sink) = aggregator();
    let err = run_session(
        &mut aggregator,
        &CpuBackend::with_threads(2),
        &ParticleGun::default(),
        replay(&[1.0]).as_ref(),
        100,
        &AtomicBool::new(true),
    )
    .unwrap_err();

    assert!(matches!(err, SessionError::Compute(ComputeError::Cancelled)));
    assert_eq!(aggregator.context().reducer().contributors(), 0);
    assert!(!aggregator.is_running());
    let sink = sink.lock().unwrap();
    assert_eq!(sink.write_count(), 0);
    assert!(sink.results().is_empty());
}

struct FailingEngine {
    fail_at: u64,
}

impl TransportEngine for FailingEngine {
    fn transport(
        &mut self,
        event_id: u64,
        _primary: &PrimaryVertex,
        accumulator: &mut EventAccumulator,
    ) -> Result<(), TransportError> {
        if event_id == self.fail_at {
            return Err(TransportError::Failed {
                event: event_id,
                message: "geometry navigation lost".to_string(),
            });
        }
        accumulator.deposit(1.0);
        Ok(())
    }
}

#[test]
fn test_transport_failure_abandons_run() {
    let (mut aggregator, sink) = aggregator();
    let engines = |_worker: usize| Box::new(FailingEngine { fail_at: 17 }) as Box<dyn TransportEngine>;
    let err = run_session(
        &mut aggregator,
        &CpuBackend::with_threads(4),
        &ParticleGun::default(),
        &engines,
        40,
        &AtomicBool::new(false),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Compute(ComputeError::Transport(TransportError::Failed { event: 17, .. }))
    ));
    assert_eq!(aggregator.context().reducer().contributors(), 0);
    assert_eq!(sink.lock().unwrap().write_count(), 0);
}

#[test]
fn test_empty_run_has_no_global_result() {
    let (mut aggregator, sink) = aggregator();
    let report = run_session(
        &mut aggregator,
        &CpuBackend::with_threads(2),
        &ParticleGun::default(),
        replay(&[1.0]).as_ref(),
        0,
        &AtomicBool::new(false),
    )
    .unwrap();
    assert!(report.global.is_none());
    assert!(report.locals.is_empty());
    assert_eq!(sink.lock().unwrap().write_count(), 0);
}
