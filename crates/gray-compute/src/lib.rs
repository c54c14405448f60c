//! # Gray Compute
//!
//! Execution of scoring runs on a pool of workers. A
//! [`ComputeBackend`](backend::ComputeBackend) drives the events of a run
//! through per-worker transport engines and hands each worker's sums to the
//! run's reducer; [`session::run_session`] wraps that between `begin_run` and
//! `end_run`.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Status |
//! |---------|-------------|--------|
//! | CPU (Rayon) | `cpu` (default) | Implemented |

pub mod backend;
pub mod session;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{ComputeBackend, ComputeError, DeviceInfo, EngineFactory, EventJob, RunTally, WorkerTally};
pub use session::{run_session, SessionError, SessionReport};

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;
