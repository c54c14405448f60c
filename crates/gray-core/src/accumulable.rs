//! Per-worker running sums and the end-of-run reduction point.
//!
//! Every worker folds its events into a private [`RunAccumulable`]. When the
//! worker has processed all of its events it moves the accumulable into the
//! shared [`Reducer`] and never sees it again. The aggregating thread then
//! merges all contributions in one place, under the reducer's lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Running Σedep and Σedep² over the events of one worker (MeV, MeV²).
///
/// Deliberately not `Copy`: handing an accumulable to the [`Reducer`] moves it.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAccumulable {
    sum: f64,
    sum_squares: f64,
}

impl RunAccumulable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an accumulable from previously recorded sums.
    pub fn from_sums(sum: f64, sum_squares: f64) -> Self {
        Self { sum, sum_squares }
    }

    /// Fold one completed event's deposit.
    pub fn fold(&mut self, edep: f64) {
        self.sum += edep;
        self.sum_squares += edep * edep;
    }

    /// Combine another worker's sums into this one.
    ///
    /// Component-wise addition, hence commutative and associative up to
    /// floating-point rounding.
    pub fn merge(&mut self, other: &RunAccumulable) {
        self.sum += other.sum;
        self.sum_squares += other.sum_squares;
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn sum_squares(&self) -> f64 {
        self.sum_squares
    }
}

impl FromIterator<f64> for RunAccumulable {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = RunAccumulable::new();
        for edep in iter {
            acc.fold(edep);
        }
        acc
    }
}

/// The single synchronised merge point for a run.
#[derive(Debug, Default)]
pub struct Reducer {
    slots: Mutex<Vec<(usize, RunAccumulable)>>,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a finished worker's accumulable into the reducer.
    pub fn hand_off(&self, worker: usize, accumulable: RunAccumulable) {
        log::debug!(
            "Worker {} handed off Σedep = {:.6e} MeV",
            worker,
            accumulable.sum
        );
        self.lock().push((worker, accumulable));
    }

    /// Number of accumulables handed off since the last reset.
    pub fn contributors(&self) -> usize {
        self.lock().len()
    }

    /// Merge and drain every handed-off accumulable.
    ///
    /// Contributions are combined in worker order, so a given set of
    /// hand-offs always yields bit-identical sums regardless of which
    /// worker finished first.
    pub fn merge_all(&self) -> RunAccumulable {
        let mut slots = std::mem::take(&mut *self.lock());
        slots.sort_by_key(|&(worker, _)| worker);
        let mut total = RunAccumulable::new();
        for (_, acc) in &slots {
            total.merge(acc);
        }
        total
    }

    /// Drop every contribution, e.g. before a new run or after a failed one.
    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(usize, RunAccumulable)>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fold_accumulates_sum_and_squares() {
        let acc: RunAccumulable = [1.0, 2.0, 1.5, 0.5].into_iter().collect();
        assert_relative_eq!(acc.sum(), 5.0);
        assert_relative_eq!(acc.sum_squares(), 7.5);
    }

    #[test]
    fn test_merge_is_commutative() {
        let a: RunAccumulable = [0.1, 0.7, 3.3].into_iter().collect();
        let b: RunAccumulable = [2.2, 0.05].into_iter().collect();

        let mut ab = a.clone();
        ab.merge(&b);
        let mut ba = b.clone();
        ba.merge(&a);

        assert_relative_eq!(ab.sum(), ba.sum(), max_relative = 1e-12);
        assert_relative_eq!(ab.sum_squares(), ba.sum_squares(), max_relative = 1e-12);
    }

    #[test]
    fn test_reducer_merges_in_worker_order() {
        let reducer = Reducer::new();
        reducer.hand_off(2, [3.0].into_iter().collect());
        reducer.hand_off(0, [1.0].into_iter().collect());
        reducer.hand_off(1, [2.0].into_iter().collect());
        assert_eq!(reducer.contributors(), 3);

        let total = reducer.merge_all();
        assert_relative_eq!(total.sum(), 6.0);
        assert_relative_eq!(total.sum_squares(), 14.0);

        // Drained
        assert_eq!(reducer.contributors(), 0);
        assert_eq!(reducer.merge_all(), RunAccumulable::new());
    }

    #[test]
    fn test_reducer_reset_discards_contributions() {
        let reducer = Reducer::new();
        reducer.hand_off(0, [1.0].into_iter().collect());
        reducer.reset();
        assert_eq!(reducer.contributors(), 0);
        assert_eq!(reducer.merge_all().sum(), 0.0);
    }

    #[test]
    fn test_concurrent_hand_off() {
        let reducer = std::sync::Arc::new(Reducer::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let reducer = reducer.clone();
                std::thread::spawn(move || {
                    let acc: RunAccumulable = (0..100).map(|i| (worker * 100 + i) as f64 * 1e-3).collect();
                    reducer.hand_off(worker, acc);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let direct: RunAccumulable = (0..800).map(|i| i as f64 * 1e-3).collect();
        let merged = reducer.merge_all();
        assert_relative_eq!(merged.sum(), direct.sum(), max_relative = 1e-9);
        assert_relative_eq!(merged.sum_squares(), direct.sum_squares(), max_relative = 1e-9);
    }
}
