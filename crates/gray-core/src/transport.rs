//! Seam for the particle transport engine.
//!
//! Physics lives outside this crate. An engine receives the primary of an
//! event and deposits energy into the event's [`EventAccumulator`]; resetting
//! and flushing the accumulator is the caller's job.
//!
//! [`ReplayTransport`] stands in for a physics engine by replaying recorded
//! per-event deposits.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::event::EventAccumulator;
use crate::source::PrimaryVertex;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport of event {event} failed: {message}")]
    Failed { event: u64, message: String },

    #[error("Failed to load deposits: {0}")]
    Load(String),
}

/// One transport engine instance per worker.
pub trait TransportEngine: Send {
    fn transport(
        &mut self,
        event_id: u64,
        primary: &PrimaryVertex,
        accumulator: &mut EventAccumulator,
    ) -> Result<(), TransportError>;
}

/// Replays a fixed table of deposits (MeV).
///
/// Row `i` lists the step deposits of event `i`; event ids beyond the table
/// wrap around. Cloning shares the table, so every worker can hold its own
/// engine cheaply.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    events: Arc<Vec<Vec<f64>>>,
}

impl ReplayTransport {
    /// One deposit per event.
    pub fn from_deposits(deposits: &[f64]) -> Result<Self, TransportError> {
        Self::from_steps(deposits.iter().map(|&d| vec![d]).collect())
    }

    /// Several step deposits per event.
    pub fn from_steps(events: Vec<Vec<f64>>) -> Result<Self, TransportError> {
        if events.is_empty() {
            return Err(TransportError::Load("no events to replay".to_string()));
        }
        for (i, steps) in events.iter().enumerate() {
            if let Some(bad) = steps.iter().find(|d| !d.is_finite() || **d < 0.0) {
                return Err(TransportError::Load(format!(
                    "event {i} has invalid deposit {bad}"
                )));
            }
        }
        Ok(Self {
            events: Arc::new(events),
        })
    }

    /// Parse a deposit table: one event per line, comma-separated step
    /// deposits in MeV. Blank lines and lines starting with `#` are skipped.
    pub fn parse(text: &str) -> Result<Self, TransportError> {
        let mut events = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let steps = line
                .split(',')
                .map(|field| {
                    field.trim().parse::<f64>().map_err(|e| {
                        TransportError::Load(format!("line {}: '{}': {}", line_no + 1, field.trim(), e))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            events.push(steps);
        }
        Self::from_steps(events)
    }

    pub fn from_csv(path: &Path) -> Result<Self, TransportError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TransportError::Load(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Number of distinct recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total deposit of an event.
    pub fn event_total(&self, event_id: u64) -> f64 {
        self.steps(event_id).iter().sum()
    }

    fn steps(&self, event_id: u64) -> &[f64] {
        &self.events[(event_id % self.events.len() as u64) as usize]
    }
}

impl TransportEngine for ReplayTransport {
    fn transport(
        &mut self,
        event_id: u64,
        _primary: &PrimaryVertex,
        accumulator: &mut EventAccumulator,
    ) -> Result<(), TransportError> {
        for &edep in self.steps(event_id) {
            accumulator.deposit(edep);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ParticleGun, PrimarySource};

    #[test]
    fn test_parse_table() {
        let replay = ReplayTransport::parse("# edep per step (MeV)\n1.0\n\n0.5, 1.5\n0.5\n").unwrap();
        assert_eq!(replay.len(), 3);
        assert_eq!(replay.event_total(1), 2.0);
        // Wraps around
        assert_eq!(replay.event_total(4), 2.0);
    }

    #[test]
    fn test_replay_deposits() {
        let mut replay = ReplayTransport::from_deposits(&[1.0, 2.0]).unwrap();
        let primary = ParticleGun::default().primary(1);
        let mut acc = EventAccumulator::new();
        replay.transport(1, &primary, &mut acc).unwrap();
        assert_eq!(acc.flush(), 2.0);
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(ReplayTransport::parse("1.0\nabc\n").is_err());
        assert!(ReplayTransport::parse("# nothing\n").is_err());
        assert!(ReplayTransport::from_deposits(&[1.0, -0.5]).is_err());
        assert!(ReplayTransport::from_deposits(&[f64::NAN]).is_err());
    }
}
