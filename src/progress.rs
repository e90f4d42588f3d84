//! Shared progress counter for one run.
//!
//! A [`Tracker`] is created with the total fixed up front and handed to every
//! worker by reference. All updates go through a single mutex, so concurrent
//! workers can never lose or double-count an outcome, and a notification
//! issued while the lock is held sees counts in the order they were recorded.
//!
//! A worker that panics while holding the lock poisons it; the tracker
//! recovers the guard rather than propagating the panic, since the counters
//! are only ever updated in whole steps.

use crate::types::{FileOutcome, ImageOutcome, RunResult};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// How skipped files count toward the error tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipPolicy {
    /// `errored` includes skips, so `processed + errored == total`.
    #[default]
    CountAsError,
    /// Skips are tallied on their own.
    Separate,
}

impl SkipPolicy {
    pub fn from_flag(count_skipped_as_errors: bool) -> Self {
        if count_skipped_as_errors {
            Self::CountAsError
        } else {
            Self::Separate
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    pub policy: SkipPolicy,
    /// Set once the run has stopped recording outcomes.
    pub finished: bool,
}

impl Snapshot {
    /// Error count under the tracker's [`SkipPolicy`].
    pub fn errors(&self) -> usize {
        match self.policy {
            SkipPolicy::CountAsError => self.failed + self.skipped,
            SkipPolicy::Separate => self.failed,
        }
    }

    /// Files with any recorded outcome.
    pub fn completed(&self) -> usize {
        self.processed + self.failed + self.skipped
    }

    /// Fraction complete in `[0, 1]`. An empty run is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed() as f64 / self.total as f64).min(1.0)
    }

    /// Whole percent, rounded down so 100 means every file is done.
    pub fn percent(&self) -> u8 {
        if self.finished {
            return 100;
        }
        (self.fraction() * 100.0).floor() as u8
    }

    pub fn is_complete(&self) -> bool {
        self.completed() >= self.total
    }
}

#[derive(Debug, Default)]
struct State {
    processed: usize,
    failed: usize,
    skipped: usize,
    finished: bool,
    outcomes: Vec<FileOutcome>,
}

#[derive(Debug)]
pub struct Tracker {
    total: usize,
    policy: SkipPolicy,
    state: Mutex<State>,
}

impl Tracker {
    pub fn new(total: usize) -> Self {
        Self::with_policy(total, SkipPolicy::default())
    }

    pub fn with_policy(total: usize, policy: SkipPolicy) -> Self {
        Self {
            total,
            policy,
            state: Mutex::new(State {
                outcomes: Vec::with_capacity(total),
                ..State::default()
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, state: &State) -> Snapshot {
        Snapshot {
            processed: state.processed,
            failed: state.failed,
            skipped: state.skipped,
            total: self.total,
            policy: self.policy,
            finished: state.finished,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        self.snapshot_of(&state)
    }

    pub fn record_success(&self) -> Snapshot {
        let mut state = self.lock();
        state.processed += 1;
        self.snapshot_of(&state)
    }

    pub fn record_error(&self) -> Snapshot {
        let mut state = self.lock();
        state.failed += 1;
        self.snapshot_of(&state)
    }

    pub fn record_skipped(&self) -> Snapshot {
        let mut state = self.lock();
        state.skipped += 1;
        self.snapshot_of(&state)
    }

    /// Count `outcome`, keep it for the final result, then call `notify` with
    /// the new counts before releasing the lock.
    ///
    /// `notify` blocks every other recorder while it runs.
    pub fn record(
        &self,
        path: PathBuf,
        outcome: ImageOutcome,
        notify: impl FnOnce(&Snapshot),
    ) -> Snapshot {
        let mut state = self.lock();
        match &outcome {
            ImageOutcome::Success => state.processed += 1,
            ImageOutcome::Failed(_) => state.failed += 1,
            ImageOutcome::Skipped(_) => state.skipped += 1,
        }
        state.outcomes.push(FileOutcome { path, outcome });
        let snapshot = self.snapshot_of(&state);
        notify(&snapshot);
        snapshot
    }

    /// Mark the run finished and issue the closing notification (always 100%).
    pub fn finish(&self, notify: impl FnOnce(&Snapshot)) -> Snapshot {
        let mut state = self.lock();
        state.finished = true;
        let snapshot = self.snapshot_of(&state);
        notify(&snapshot);
        snapshot
    }

    /// Final tally plus every recorded outcome, in completion order.
    pub fn into_result(self) -> RunResult {
        let total = self.total;
        let policy = self.policy;
        let state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        let snapshot = Snapshot {
            processed: state.processed,
            failed: state.failed,
            skipped: state.skipped,
            total,
            policy,
            finished: state.finished,
        };
        RunResult {
            processed: snapshot.processed,
            errored: snapshot.errors(),
            skipped: snapshot.skipped,
            total,
            outcomes: state.outcomes,
        }
    }
}
