//! Output sinks for per-event histograms, ntuple rows and run results.
//!
//! The [`OutputSink`] trait mirrors the booking interface of analysis
//! managers in transport toolkits: a file is opened, histograms and ntuple
//! columns are booked, filled per event, and everything is written and closed
//! at the end of the run.
//!
//! | Sink | Module | Persistence |
//! |------|--------|-------------|
//! | [`CsvSink`] | [`csv`] | One CSV file per histogram and per ntuple |
//! | [`MemorySink`] | [`memory`] | None; kept for inspection |
//!
//! Workers share one sink behind a mutex ([`SharedSink`]). A single event's
//! record is written under one lock acquisition, so records never interleave.

pub mod csv;
pub mod histogram;
pub mod memory;

use std::sync::{Arc, Mutex};

use thiserror::Error;

pub use csv::CsvSink;
pub use histogram::Histogram1D;
pub use memory::MemorySink;

use crate::run::RunResult;

/// Errors from output sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("No output file is open")]
    NotOpen,

    #[error("Output file '{0}' is already open")]
    AlreadyOpen(String),

    #[error("Unknown histogram id {0}")]
    UnknownHistogram(usize),

    #[error("Unknown ntuple column id {0}")]
    UnknownColumn(usize),

    #[error("Histogram '{name}' has invalid binning: {reason}")]
    InvalidBinning { name: String, reason: String },

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialisation error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handle to a booked histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistogramId(pub(crate) usize);

/// Handle to a booked ntuple column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(pub(crate) usize);

/// A sink shared by all workers of a run.
pub type SharedSink = Arc<Mutex<dyn OutputSink>>;

/// Durable histogram/ntuple storage.
pub trait OutputSink: Send {
    /// Short name of the storage format, e.g. `"csv"`.
    fn type_name(&self) -> &str;

    /// Open the output file and clear any previous bookings.
    fn open_file(&mut self, name: &str) -> Result<(), SinkError>;

    /// Book a fixed-width 1D histogram over `[min, max)`.
    fn create_histogram(
        &mut self,
        name: &str,
        label: &str,
        bins: usize,
        min: f64,
        max: f64,
    ) -> Result<HistogramId, SinkError>;

    fn fill_histogram(&mut self, id: HistogramId, value: f64) -> Result<(), SinkError>;

    /// Book a floating-point ntuple column.
    fn create_column(&mut self, name: &str) -> Result<ColumnId, SinkError>;

    fn fill_column(&mut self, id: ColumnId, value: f64) -> Result<(), SinkError>;

    /// Close the current ntuple row. Columns not filled since the last commit
    /// are recorded as zero.
    fn commit_row(&mut self) -> Result<(), SinkError>;

    /// Attach a finished run result to the output.
    fn record_result(&mut self, result: &RunResult) -> Result<(), SinkError>;

    /// Persist everything booked so far.
    fn write(&mut self) -> Result<(), SinkError>;

    fn close_file(&mut self) -> Result<(), SinkError>;
}

/// In-memory bookings shared by the sink implementations.
#[derive(Debug, Default, Clone)]
pub(crate) struct Bookings {
    pub file_name: Option<String>,
    pub histograms: Vec<Histogram1D>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub pending: Vec<Option<f64>>,
    pub results: Vec<RunResult>,
}

impl Bookings {
    pub fn open(&mut self, name: &str) -> Result<(), SinkError> {
        if let Some(open) = &self.file_name {
            return Err(SinkError::AlreadyOpen(open.clone()));
        }
        *self = Bookings {
            file_name: Some(name.to_string()),
            ..Bookings::default()
        };
        Ok(())
    }

    pub fn ensure_open(&self) -> Result<(), SinkError> {
        match self.file_name {
            Some(_) => Ok(()),
            None => Err(SinkError::NotOpen),
        }
    }

    pub fn create_histogram(
        &mut self,
        name: &str,
        label: &str,
        bins: usize,
        min: f64,
        max: f64,
    ) -> Result<HistogramId, SinkError> {
        self.ensure_open()?;
        self.histograms
            .push(Histogram1D::new(name, label, bins, min, max)?);
        Ok(HistogramId(self.histograms.len() - 1))
    }

    pub fn fill_histogram(&mut self, id: HistogramId, value: f64) -> Result<(), SinkError> {
        self.histograms
            .get_mut(id.0)
            .ok_or(SinkError::UnknownHistogram(id.0))?
            .fill(value);
        Ok(())
    }

    pub fn create_column(&mut self, name: &str) -> Result<ColumnId, SinkError> {
        self.ensure_open()?;
        self.columns.push(name.to_string());
        self.pending.push(None);
        Ok(ColumnId(self.columns.len() - 1))
    }

    pub fn fill_column(&mut self, id: ColumnId, value: f64) -> Result<(), SinkError> {
        *self
            .pending
            .get_mut(id.0)
            .ok_or(SinkError::UnknownColumn(id.0))? = Some(value);
        Ok(())
    }

    pub fn commit_row(&mut self) -> Result<(), SinkError> {
        self.ensure_open()?;
        let row = self
            .pending
            .iter_mut()
            .map(|cell| cell.take().unwrap_or(0.0))
            .collect();
        self.rows.push(row);
        Ok(())
    }

    /// File stem with a trailing `.csv`/`.json` extension removed.
    pub fn stem(&self) -> Result<&str, SinkError> {
        let name = self.file_name.as_deref().ok_or(SinkError::NotOpen)?;
        Ok(name
            .strip_suffix(".csv")
            .or_else(|| name.strip_suffix(".json"))
            .unwrap_or(name))
    }
}
