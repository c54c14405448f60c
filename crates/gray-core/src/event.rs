//! Per-event energy-deposit counter.

/// Energy deposited in the scoring volume during one event (MeV).
///
/// One accumulator belongs to one worker and is reused event after event:
/// [`reset`](Self::reset) before the first deposit, any number of
/// [`deposit`](Self::deposit) calls from the transport engine, and a single
/// [`flush`](Self::flush) at event end.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventAccumulator {
    edep: f64,
}

impl EventAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the counter at event start.
    pub fn reset(&mut self) {
        self.edep = 0.0;
    }

    /// Add an energy loss in the scoring medium (MeV, non-negative).
    pub fn deposit(&mut self, amount: f64) {
        debug_assert!(amount >= 0.0, "negative energy deposit: {amount}");
        self.edep += amount;
    }

    /// Total deposited so far in this event.
    pub fn flush(&self) -> f64 {
        self.edep
    }
}
