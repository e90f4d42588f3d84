//! Batch scheduler: fixed-size batches over a bounded rayon pool.
//!
//! ```text
//! tasks ──chunks(batch_size)──▶ [b0] [b1] [b2] ...
//!                                 │    │    │
//!                     pool of N workers, one batch at a time each
//!                                 │
//!             files within a batch run sequentially, one decoded
//!             image per worker at a time
//!                                 │
//!                 Tracker::record after every file ──▶ on_progress
//! ```
//!
//! Batches only bound how much work one scheduled unit touches; they carry no
//! meaning. A panic escaping a batch is caught at the batch boundary: the files
//! of that batch that have no outcome yet are credited as failed and the
//! other batches carry on. The pool is local to the run, so concurrent runs
//! never share workers.

use crate::imaging::ImageTransform;
use crate::progress::{SkipPolicy, Snapshot, Tracker};
use crate::types::{ImageOutcome, ImageTask, RunResult};
use rayon::prelude::*;
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info};

/// Worker count used when none is requested.
pub const MAX_WORKERS: usize = 8;
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Cooperative cancellation, checked between files (never mid-file).
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Requested pool size; `None` means [`MAX_WORKERS`]. Always capped at
    /// the available cores.
    pub workers: Option<usize>,
    pub batch_size: usize,
    pub skip_policy: SkipPolicy,
    pub cancel: CancelFlag,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            workers: None,
            batch_size: DEFAULT_BATCH_SIZE,
            skip_policy: SkipPolicy::default(),
            cancel: CancelFlag::default(),
        }
    }
}

/// Pool size for a request: never above the core count, never zero.
pub fn effective_workers(requested: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.unwrap_or(MAX_WORKERS).clamp(1, cores)
}

/// Run every task through `transform` and return the tally.
///
/// `on_progress` is called after each file and once more at the end with a
/// finished snapshot (always 100%). Calls are serialized by the tracker lock,
/// so the percentages it sees never go down.
///
/// Every worker waits on that lock while the callback runs. Keep it to a
/// non-blocking hand-off (an unbounded channel send, a counter store) and do
/// slow work such as terminal or UI updates on the receiving side.
pub fn run<T, F>(
    transform: &T,
    tasks: &[ImageTask],
    options: &SchedulerOptions,
    on_progress: F,
) -> RunResult
where
    T: ImageTransform + ?Sized,
    F: Fn(&Snapshot) + Sync,
{
    let tracker = Tracker::with_policy(tasks.len(), options.skip_policy);
    if tasks.is_empty() {
        tracker.finish(|s| on_progress(s));
        return tracker.into_result();
    }

    let workers = effective_workers(options.workers);
    let batch_size = options.batch_size.max(1);
    info!(
        "Normalizing {} files in {} batches of up to {} on {} workers",
        tasks.len(),
        tasks.len().div_ceil(batch_size),
        batch_size,
        workers
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("canvasfit-worker-{i}"))
        .build();

    match pool {
        Ok(pool) => pool.install(|| {
            tasks.par_chunks(batch_size).for_each(|batch| {
                run_batch(transform, batch, &tracker, &options.cancel, &on_progress);
            });
        }),
        Err(e) => {
            error!("Worker pool unavailable: {e}");
            let reason = format!("worker pool unavailable: {e}");
            for task in tasks {
                tracker.record(
                    task.source.clone(),
                    ImageOutcome::Failed(reason.clone()),
                    |s| on_progress(s),
                );
            }
        }
    }

    tracker.finish(|s| on_progress(s));
    let result = tracker.into_result();
    info!(
        "Run finished: {} processed, {} errored, {} skipped, {} total",
        result.processed, result.errored, result.skipped, result.total
    );
    result
}

fn run_batch<T, F>(
    transform: &T,
    batch: &[ImageTask],
    tracker: &Tracker,
    cancel: &CancelFlag,
    on_progress: &F,
) where
    T: ImageTransform + ?Sized,
    F: Fn(&Snapshot) + Sync,
{
    // Bumped before each record so a panic can never double-count a file.
    let done = Cell::new(0usize);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        for task in batch {
            let outcome = if cancel.is_cancelled() {
                ImageOutcome::Skipped("cancelled".to_string())
            } else {
                debug!("Processing {}", task.source.display());
                transform.transform(task)
            };
            done.set(done.get() + 1);
            tracker.record(task.source.clone(), outcome, |s| on_progress(s));
        }
    }));

    if let Err(payload) = outcome {
        let reason = panic_message(payload.as_ref());
        let remaining = &batch[done.get().min(batch.len())..];
        error!(
            "Batch of {} failed after {} files ({reason}); crediting {} as errors",
            batch.len(),
            done.get(),
            remaining.len()
        );
        for task in remaining {
            tracker.record(
                task.source.clone(),
                ImageOutcome::Failed(format!("batch failed: {reason}")),
                |s| on_progress(s),
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
