//! A sink that keeps everything in memory.

use super::{Bookings, ColumnId, HistogramId, OutputSink, SinkError};
use crate::run::RunResult;
use crate::sink::Histogram1D;

/// In-memory sink, used by tests and dry runs.
///
/// Bookings survive `close_file` so they can be inspected after a run; they
/// are cleared by the next `open_file`.
#[derive(Debug, Default)]
pub struct MemorySink {
    bookings: Bookings,
    last_file: Option<String>,
    opened: usize,
    written: usize,
    closed: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.bookings.file_name.is_some()
    }

    /// Name passed to the most recent `open_file`.
    pub fn file_name(&self) -> Option<&str> {
        self.last_file.as_deref()
    }

    pub fn open_count(&self) -> usize {
        self.opened
    }

    pub fn write_count(&self) -> usize {
        self.written
    }

    pub fn close_count(&self) -> usize {
        self.closed
    }

    pub fn histograms(&self) -> &[Histogram1D] {
        &self.bookings.histograms
    }

    pub fn histogram(&self, name: &str) -> Option<&Histogram1D> {
        self.bookings.histograms.iter().find(|h| h.name == name)
    }

    pub fn columns(&self) -> &[String] {
        &self.bookings.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.bookings.rows
    }

    pub fn results(&self) -> &[RunResult] {
        &self.bookings.results
    }
}

impl OutputSink for MemorySink {
    fn type_name(&self) -> &str {
        "memory"
    }

    fn open_file(&mut self, name: &str) -> Result<(), SinkError> {
        self.bookings.open(name)?;
        self.last_file = Some(name.to_string());
        self.opened += 1;
        Ok(())
    }

    fn create_histogram(
        &mut self,
        name: &str,
        label: &str,
        bins: usize,
        min: f64,
        max: f64,
    ) -> Result<HistogramId, SinkError> {
        self.bookings.create_histogram(name, label, bins, min, max)
    }

    fn fill_histogram(&mut self, id: HistogramId, value: f64) -> Result<(), SinkError> {
        self.bookings.ensure_open()?;
        self.bookings.fill_histogram(id, value)
    }

    fn create_column(&mut self, name: &str) -> Result<ColumnId, SinkError> {
        self.bookings.create_column(name)
    }

    fn fill_column(&mut self, id: ColumnId, value: f64) -> Result<(), SinkError> {
        self.bookings.ensure_open()?;
        self.bookings.fill_column(id, value)
    }

    fn commit_row(&mut self) -> Result<(), SinkError> {
        self.bookings.commit_row()
    }

    fn record_result(&mut self, result: &RunResult) -> Result<(), SinkError> {
        self.bookings.ensure_open()?;
        self.bookings.results.push(result.clone());
        Ok(())
    }

    fn write(&mut self) -> Result<(), SinkError> {
        self.bookings.ensure_open()?;
        self.written += 1;
        Ok(())
    }

    fn close_file(&mut self) -> Result<(), SinkError> {
        self.bookings.ensure_open()?;
        self.bookings.file_name = None;
        self.closed += 1;
        Ok(())
    }
}
