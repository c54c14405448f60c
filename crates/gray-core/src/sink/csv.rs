//! CSV file sink.
//!
//! For an output file named `B4.csv` in directory `out/` the sink writes:
//!
//! - `out/B4_h1_<name>.csv` for every histogram, one row per bin plus
//!   underflow and overflow rows;
//! - `out/B4_nt_edep.csv` with one row per committed ntuple row;
//! - `out/B4_summary.json` with every recorded run result, when enabled.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{Bookings, ColumnId, HistogramId, OutputSink, SinkError};
use crate::run::RunResult;

/// Name of the single ntuple booked by the run aggregator.
pub const NTUPLE_NAME: &str = "edep";

/// Writes histograms and the ntuple as CSV files in a directory.
#[derive(Debug)]
pub struct CsvSink {
    directory: PathBuf,
    save_json: bool,
    bookings: Bookings,
    written: Vec<PathBuf>,
}

impl CsvSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            save_json: true,
            bookings: Bookings::default(),
            written: Vec::new(),
        }
    }

    /// Enable or disable the JSON run summary.
    pub fn with_json_summary(mut self, save_json: bool) -> Self {
        self.save_json = save_json;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Paths written by the most recent `write`.
    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }

    fn write_histograms(&mut self, stem: &str) -> Result<(), SinkError> {
        for h in &self.bookings.histograms {
            let path = self.directory.join(format!("{stem}_h1_{}.csv", h.name));
            let mut out = BufWriter::new(File::create(&path)?);
            writeln!(out, "# {}: {}", h.name, h.label)?;
            writeln!(out, "# entries = {}", h.entries())?;
            if let (Some(mean), Some(rms)) = (h.mean(), h.std_dev()) {
                writeln!(out, "# mean = {mean}, rms = {rms}")?;
            }
            writeln!(out, "bin,low,high,count")?;
            writeln!(out, "underflow,-inf,{},{}", h.min, h.underflow())?;
            for (bin, count) in h.counts().iter().enumerate() {
                let (low, high) = h.bin_edges(bin);
                writeln!(out, "{bin},{low},{high},{count}")?;
            }
            writeln!(out, "overflow,{},inf,{}", h.max, h.overflow())?;
            out.flush()?;
            self.written.push(path);
        }
        Ok(())
    }

    fn write_ntuple(&mut self, stem: &str) -> Result<(), SinkError> {
        if self.bookings.columns.is_empty() {
            return Ok(());
        }
        let path = self.directory.join(format!("{stem}_nt_{NTUPLE_NAME}.csv"));
        let mut out = BufWriter::new(File::create(&path)?);
        writeln!(out, "{}", self.bookings.columns.join(","))?;
        for row in &self.bookings.rows {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(out, "{}", line.join(","))?;
        }
        out.flush()?;
        self.written.push(path);
        Ok(())
    }

    fn write_summary(&mut self, stem: &str) -> Result<(), SinkError> {
        if !self.save_json || self.bookings.results.is_empty() {
            return Ok(());
        }
        let path = self.directory.join(format!("{stem}_summary.json"));
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, &self.bookings.results)?;
        self.written.push(path);
        Ok(())
    }
}

impl OutputSink for CsvSink {
    fn type_name(&self) -> &str {
        "csv"
    }

    fn open_file(&mut self, name: &str) -> Result<(), SinkError> {
        self.bookings.open(name)?;
        fs::create_dir_all(&self.directory)?;
        self.written.clear();
        log::debug!("Opened CSV output '{}' in {}", name, self.directory.display());
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
        let stem = self.bookings.stem()?.to_string();
        self.written.clear();
        self.write_histograms(&stem)?;
        self.write_ntuple(&stem)?;
        self.write_summary(&stem)?;
        log::info!(
            "Wrote {} output file(s) to {}",
            self.written.len(),
            self.directory.display()
        );
        Ok(())
    }

    fn close_file(&mut self) -> Result<(), SinkError> {
        self.bookings.ensure_open()?;
        self.bookings = Bookings::default();
        Ok(())
    }
}
