//! Run lifecycle: booking the output, reducing the workers' sums and turning
//! them into a dose with its RMS.

use gray_geometry::GeometryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::accumulable::RunAccumulable;
use crate::context::{lock_shared, RunContext};
use crate::sink::{ColumnId, HistogramId, SharedSink, SinkError};
use crate::units::{best_dose, mev_per_gram_to_gray, MEV};

/// Histogram range of the per-event deposit channels (MeV).
pub const EDEP_HISTOGRAM_MAX: f64 = 5.0 * MEV;
pub const EDEP_HISTOGRAM_BINS: usize = 100;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Scoring volume has not been resolved in the geometry")]
    ScoringVolumeUnresolved,

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("Output sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Whether a result covers the whole run or one worker's share of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunRole {
    Global,
    Local { worker: usize },
}

impl RunRole {
    fn label(&self) -> &'static str {
        match self {
            RunRole::Global => "Global",
            RunRole::Local { .. } => "Local",
        }
    }
}

/// Dose statistics of a finished run.
///
/// Doses are in MeV/g; use [`dose_gray`](Self::dose_gray) and
/// [`rms_dose_gray`](Self::rms_dose_gray) for SI values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub role: RunRole,
    pub event_count: u64,
    /// Description of the primary source, e.g. `"gamma of 2.62 MeV"`.
    pub run_condition: String,
    /// Scoring-volume mass (g).
    pub mass: f64,
    /// Σedep (MeV).
    pub sum: f64,
    /// Σedep² (MeV²).
    pub sum_squares: f64,
    pub dose: f64,
    pub rms_dose: f64,
}

impl RunResult {
    /// Derive the dose and its RMS from merged sums.
    ///
    /// The variance estimate `Σedep² − (Σedep)²/N` can come out slightly
    /// negative through cancellation; it is clamped to zero before the root.
    pub fn compute(
        role: RunRole,
        event_count: u64,
        run_condition: impl Into<String>,
        mass: f64,
        accumulable: &RunAccumulable,
    ) -> Self {
        debug_assert!(event_count > 0, "dose of an empty run");
        debug_assert!(mass > 0.0, "non-positive scoring mass {mass}");

        let sum = accumulable.sum();
        let sum_squares = accumulable.sum_squares();
        let spread = sum_squares - sum * sum / event_count as f64;
        let rms = if spread > 0.0 { spread.sqrt() } else { 0.0 };

        Self {
            role,
            event_count,
            run_condition: run_condition.into(),
            mass,
            sum,
            sum_squares,
            dose: sum / mass,
            rms_dose: rms / mass,
        }
    }

    pub fn dose_gray(&self) -> f64 {
        mev_per_gram_to_gray(self.dose)
    }

    pub fn rms_dose_gray(&self) -> f64 {
        mev_per_gram_to_gray(self.rms_dose)
    }

    /// The end-of-run report.
    pub fn summary(&self) -> String {
        let header = format!("End of {} Run", self.role.label());
        format!(
            "--------------------{:-<40}\n \
             The run consists of {} {}\n \
             Cumulated dose per run, in scoring volume : {:.3}  rms = {:.3}\n\
             {}",
            header,
            self.event_count,
            self.run_condition,
            best_dose(self.dose_gray()),
            best_dose(self.rms_dose_gray()),
            "-".repeat(60)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
    Ended,
}

/// Handles of the booked per-event channels.
#[derive(Debug, Clone, Copy)]
struct Channels {
    eabs: HistogramId,
    egap: HistogramId,
    eabs_column: ColumnId,
    egap_column: ColumnId,
}

/// Writes per-event deposits to the shared sink. One per worker.
#[derive(Clone)]
pub struct EventRecorder {
    sink: SharedSink,
    channels: Channels,
}

impl EventRecorder {
    /// Record one event's deposit (MeV) in both channels and commit an
    /// ntuple row, all under a single sink lock.
    pub fn record(&self, edep: f64) -> Result<(), SinkError> {
        let mut sink = lock_shared(&self.sink);
        sink.fill_histogram(self.channels.eabs, edep)?;
        sink.fill_histogram(self.channels.egap, edep)?;
        sink.fill_column(self.channels.eabs_column, edep)?;
        sink.fill_column(self.channels.egap_column, edep)?;
        sink.commit_row()
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder")
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

/// Drives one run at a time: `begin_run`, workers record and hand off,
/// `end_run`.
#[derive(Debug)]
pub struct RunAggregator {
    context: RunContext,
    file_name: String,
    run_condition: String,
    state: RunState,
    sink_open: bool,
}

impl RunAggregator {
    pub fn new(context: RunContext, file_name: impl Into<String>) -> Self {
        Self {
            context,
            file_name: file_name.into(),
            run_condition: String::new(),
            state: RunState::Idle,
            sink_open: false,
        }
    }

    /// Set the source description quoted in run summaries.
    pub fn with_run_condition(mut self, run_condition: impl Into<String>) -> Self {
        self.run_condition = run_condition.into();
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn run_condition(&self) -> &str {
        &self.run_condition
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Reset the reducer, open the output and book the deposit channels.
    pub fn begin_run(&mut self) -> Result<EventRecorder, ScoringError> {
        assert!(
            self.state != RunState::Running,
            "begin_run called while a run is in progress"
        );
        self.context.reducer().reset();

        let channels = {
            let mut sink = self.context.lock_sink();
            if self.sink_open {
                // Left open by a run that ended without events.
                log::debug!("Closing output '{}' left open by the previous run", self.file_name);
                sink.close_file()?;
                self.sink_open = false;
            }
            sink.open_file(&self.file_name)?;
            self.sink_open = true;
            log::info!("Using {} output", sink.type_name());
            let bins = EDEP_HISTOGRAM_BINS;
            Channels {
                eabs: sink.create_histogram("Eabs", "Edep in absorber", bins, 0.0, EDEP_HISTOGRAM_MAX)?,
                egap: sink.create_histogram("Egap", "Edep in gap", bins, 0.0, EDEP_HISTOGRAM_MAX)?,
                eabs_column: sink.create_column("Eabs")?,
                egap_column: sink.create_column("Egap")?,
            }
        };

        self.state = RunState::Running;
        log::info!("Run started, output '{}'", self.file_name);
        Ok(EventRecorder {
            sink: self.context.sink().clone(),
            channels,
        })
    }

    /// Merge the handed-off sums and produce the global result.
    ///
    /// Returns `Ok(None)` for a run without events; in that case nothing is
    /// logged and the sink is neither written nor closed.
    ///
    /// # Panics
    ///
    /// If no run is in progress, e.g. when called twice after one
    /// `begin_run`.
    pub fn end_run(&mut self, event_count: u64) -> Result<Option<RunResult>, ScoringError> {
        assert!(
            self.state == RunState::Running,
            "end_run called without a matching begin_run"
        );
        self.state = RunState::Ended;

        if event_count == 0 {
            return Ok(None);
        }

        let scoring_volume = self
            .context
            .scoring_volume()
            .ok_or(ScoringError::ScoringVolumeUnresolved)?;
        let merged = self.context.reducer().merge_all();
        let mass = self
            .context
            .geometry()
            .mass(scoring_volume, self.context.materials())?;

        let result = RunResult::compute(
            RunRole::Global,
            event_count,
            self.run_condition.clone(),
            mass,
            &merged,
        );
        log::info!("\n{}", result.summary());

        let mut sink = self.context.lock_sink();
        sink.record_result(&result)?;
        sink.write()?;
        sink.close_file()?;
        self.sink_open = false;

        Ok(Some(result))
    }

    /// Result of one worker's share of the run, for its local summary.
    /// Nothing is merged or written.
    pub fn local_result(
        &self,
        worker: usize,
        accumulable: &RunAccumulable,
        event_count: u64,
    ) -> Result<Option<RunResult>, ScoringError> {
        if event_count == 0 {
            return Ok(None);
        }
        let scoring_volume = self
            .context
            .scoring_volume()
            .ok_or(ScoringError::ScoringVolumeUnresolved)?;
        let mass = self
            .context
            .geometry()
            .mass(scoring_volume, self.context.materials())?;
        Ok(Some(RunResult::compute(
            RunRole::Local { worker },
            event_count,
            self.run_condition.clone(),
            mass,
            accumulable,
        )))
    }

    /// Give up on the current run: discard every handed-off sum and close the
    /// output without writing it.
    pub fn abandon_run(&mut self) -> Result<(), ScoringError> {
        self.context.reducer().reset();
        self.state = RunState::Idle;
        if self.sink_open {
            self.sink_open = false;
            self.context.lock_sink().close_file()?;
        }
        log::warn!("Run abandoned, output '{}' not written", self.file_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use approx::assert_relative_eq;
    use gray_geometry::presets::{self, DETECTOR};
    use gray_materials::NistDatabase;
    use std::sync::{Arc, Mutex};

    fn aggregator(bind: bool) -> (RunAggregator, Arc<Mutex<MemorySink>>) {
        let sink = Arc::new(Mutex::new(MemorySink::new()));
        let mut context = RunContext::new(
            Arc::new(presets::germanium_detector().unwrap()),
            Arc::new(NistDatabase::new()),
            sink.clone(),
        );
        if bind {
            context.bind_scoring_volume(DETECTOR).unwrap();
        }
        let aggregator = RunAggregator::new(context, "B4.csv").with_run_condition("gamma of 2.62 MeV");
        (aggregator, sink)
    }

    fn detector_mass() -> f64 {
        5.323 * std::f64::consts::PI * 3.315 * 3.315 * 5.13
    }

    #[test]
    fn test_dose_scenario() {
        let (mut run, sink) = aggregator(true);
        let recorder = run.begin_run().unwrap();

        let deposits = [1.0, 2.0, 1.5, 0.5];
        for &edep in &deposits {
            recorder.record(edep).unwrap();
        }
        run.context().reducer().hand_off(0, deposits.into_iter().collect());

        let result = run.end_run(4).unwrap().expect("non-empty run has a result");
        let mass = detector_mass();
        assert_relative_eq!(result.sum, 5.0);
        assert_relative_eq!(result.sum_squares, 7.5);
        assert_relative_eq!(result.mass, mass, max_relative = 1e-12);
        assert_relative_eq!(result.dose, 5.0 / mass, max_relative = 1e-12);
        assert_relative_eq!(result.rms_dose, 1.25f64.sqrt() / mass, max_relative = 1e-12);
        assert_eq!(result.role, RunRole::Global);

        let sink = sink.lock().unwrap();
        assert_eq!(sink.write_count(), 1);
        assert_eq!(sink.close_count(), 1);
        assert_eq!(sink.rows().len(), 4);
        assert_eq!(sink.rows()[1], vec![2.0, 2.0]);
        assert_eq!(sink.histogram("Eabs").unwrap().entries(), 4);
        assert_eq!(sink.histogram("Egap").unwrap().entries(), 4);
        assert_eq!(sink.results(), &[result]);
    }

    #[test]
    fn test_zero_events_is_a_no_op() {
        let (mut run, sink) = aggregator(true);
        run.begin_run().unwrap();
        assert!(run.end_run(0).unwrap().is_none());

        let sink = sink.lock().unwrap();
        assert_eq!(sink.open_count(), 1);
        assert_eq!(sink.write_count(), 0);
        assert_eq!(sink.close_count(), 0);
        assert!(sink.results().is_empty());
    }

    #[test]
    fn test_run_after_empty_run_reopens_output() {
        let (mut run, sink) = aggregator(true);
        run.begin_run().unwrap();
        run.end_run(0).unwrap();

        let recorder = run.begin_run().unwrap();
        recorder.record(1.0).unwrap();
        run.context().reducer().hand_off(0, [1.0].into_iter().collect());
        assert!(run.end_run(1).unwrap().is_some());

        let sink = sink.lock().unwrap();
        assert_eq!(sink.open_count(), 2);
        assert_eq!(sink.close_count(), 2);
        assert_eq!(sink.write_count(), 1);
    }

    #[test]
    fn test_unresolved_scoring_volume() {
        let (mut run, sink) = aggregator(false);
        run.begin_run().unwrap();
        run.context().reducer().hand_off(0, [1.0].into_iter().collect());

        assert!(matches!(
            run.end_run(1),
            Err(ScoringError::ScoringVolumeUnresolved)
        ));
        let sink = sink.lock().unwrap();
        assert_eq!(sink.write_count(), 0);
        assert!(sink.results().is_empty());
    }

    #[test]
    #[should_panic(expected = "end_run called without a matching begin_run")]
    fn test_end_run_twice_panics() {
        let (mut run, _sink) = aggregator(true);
        run.begin_run().unwrap();
        run.context().reducer().hand_off(0, [1.0].into_iter().collect());
        run.end_run(1).unwrap();
        let _ = run.end_run(1);
    }

    #[test]
    fn test_negative_spread_is_clamped() {
        // Σedep² below (Σedep)²/N cannot happen exactly but can after rounding.
        let acc = RunAccumulable::from_sums(3.0, 2.999_999_999);
        let result = RunResult::compute(RunRole::Global, 3, "", 1.0, &acc);
        assert_eq!(result.rms_dose, 0.0);
        assert_relative_eq!(result.dose, 3.0);
    }

    #[test]
    fn test_constant_deposits_have_zero_rms() {
        let acc: RunAccumulable = std::iter::repeat(0.7).take(1000).collect();
        let result = RunResult::compute(RunRole::Global, 1000, "", 2.0, &acc);
        assert!(result.rms_dose >= 0.0);
        assert!(result.rms_dose < 1e-6);
    }

    #[test]
    fn test_local_result() {
        let (run, _sink) = aggregator(true);
        let acc: RunAccumulable = [1.0, 3.0].into_iter().collect();
        let local = run.local_result(2, &acc, 2).unwrap().unwrap();
        assert_eq!(local.role, RunRole::Local { worker: 2 });
        assert_relative_eq!(local.dose, 4.0 / detector_mass(), max_relative = 1e-12);
        assert!(run.local_result(2, &RunAccumulable::new(), 0).unwrap().is_none());
    }

    #[test]
    fn test_abandon_run_discards_sums() {
        let (mut run, sink) = aggregator(true);
        run.begin_run().unwrap();
        run.context().reducer().hand_off(0, [1.0].into_iter().collect());
        run.abandon_run().unwrap();
        assert_eq!(run.context().reducer().contributors(), 0);
        assert!(!run.is_running());

        let sink = sink.lock().unwrap();
        assert_eq!(sink.write_count(), 0);
        assert_eq!(sink.close_count(), 1);
    }

    #[test]
    fn test_summary_format() {
        let acc: RunAccumulable = [1.0, 2.0, 1.5, 0.5].into_iter().collect();
        let result = RunResult::compute(RunRole::Global, 4, "gamma of 2.62 MeV", detector_mass(), &acc);
        let summary = result.summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "--------------------End of Global Run-----------------------");
        assert_eq!(lines[1], " The run consists of 4 gamma of 2.62 MeV");
        assert!(lines[2].starts_with(" Cumulated dose per run, in scoring volume : "));
        assert!(lines[2].contains("picoGy"));
        assert_eq!(lines[3], "-".repeat(60));

        let local = RunResult { role: RunRole::Local { worker: 1 }, ..result };
        assert!(local.summary().starts_with("--------------------End of Local Run"));
    }
}
