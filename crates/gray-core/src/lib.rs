//! # Gray Core
//!
//! The scoring backbone of the Gray framework. This crate turns per-event
//! energy deposits into an absorbed dose with its statistical uncertainty.
//!
//! ## Architecture
//!
//! Each worker owns an [`event::EventAccumulator`] (reset per event) and a
//! [`accumulable::RunAccumulable`] (Σedep, Σedep²). At the end of a run the
//! workers hand their accumulables to a single [`accumulable::Reducer`], and
//! the [`run::RunAggregator`] merges them and divides by the scoring-volume
//! mass taken from the geometry held in the [`context::RunContext`].
//!
//! ## Modules
//!
//! - [`event`]: Per-event energy-deposit counter.
//! - [`accumulable`]: Per-worker running sums and the merge point.
//! - [`run`]: Run lifecycle, dose computation and summary report.
//! - [`context`]: Explicit run context (geometry, materials, sink, reducer).
//! - [`sink`]: Histogram/ntuple output sinks (CSV and in-memory).
//! - [`source`]: Primary particle description.
//! - [`transport`]: Seam for the transport engine, plus a replay engine.
//! - [`units`]: Energy and dose units with best-unit formatting.

pub mod accumulable;
pub mod context;
pub mod event;
pub mod run;
pub mod sink;
pub mod source;
pub mod transport;
pub mod units;

pub use accumulable::{Reducer, RunAccumulable};
pub use context::RunContext;
pub use event::EventAccumulator;
pub use run::{EventRecorder, RunAggregator, RunResult, RunRole, ScoringError};
