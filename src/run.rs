//! Run controller: one end-to-end batch on a background thread.
//!
//! `start*` returns a [`RunHandle`] at once. The handle carries:
//!
//! - a progress stream of whole percentages (`Receiver<u8>`), non-decreasing,
//!   deduplicated, always ending at 100 for a run that got past discovery;
//! - the completion, delivered exactly once by [`RunHandle::wait`]. The
//!   progress channel closes before the completion is available, so every
//!   emission happens-before the result.
//!
//! An optional [`CompletionHook`] runs on the run thread once the
//! [`RunResult`] is final.

use crate::discover::{DiscoveryError, discover};
use crate::imaging::{ImageTransform, RustTransform};
use crate::scheduler::{self, CancelFlag, SchedulerOptions};
use crate::types::{ImageTask, RunResult, TargetSize};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("failed to start run thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("run thread terminated unexpectedly")]
    Aborted,
}

/// Called once with the final result of a run.
pub trait CompletionHook: Send {
    fn on_complete(&self, result: &RunResult);
}

impl<F> CompletionHook for F
where
    F: Fn(&RunResult) + Send,
{
    fn on_complete(&self, result: &RunResult) {
        self(result)
    }
}

/// Runs an external program after a run, with the tally in its environment:
/// `CANVASFIT_PROCESSED`, `CANVASFIT_ERRORED`, `CANVASFIT_SKIPPED`,
/// `CANVASFIT_TOTAL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHook {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandHook {
    /// `None` for an empty argv.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl CompletionHook for CommandHook {
    fn on_complete(&self, result: &RunResult) {
        let status = Command::new(&self.program)
            .args(&self.args)
            .env("CANVASFIT_PROCESSED", result.processed.to_string())
            .env("CANVASFIT_ERRORED", result.errored.to_string())
            .env("CANVASFIT_SKIPPED", result.skipped.to_string())
            .env("CANVASFIT_TOTAL", result.total.to_string())
            .status();
        match status {
            Ok(s) if s.success() => info!("Completion command {} finished", self.program),
            Ok(s) => warn!("Completion command {} exited with {s}", self.program),
            Err(e) => warn!("Completion command {} could not run: {e}", self.program),
        }
    }
}

/// What a run works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunInput {
    /// Discovered recursively; only supported extensions are kept.
    Directory(PathBuf),
    /// Submitted as-is; unsupported files come back as skipped.
    Files(Vec<PathBuf>),
}

pub struct RunHandle {
    progress: Receiver<u8>,
    cancel: CancelFlag,
    thread: JoinHandle<Result<RunResult, RunError>>,
}

impl RunHandle {
    pub fn progress(&self) -> &Receiver<u8> {
        &self.progress
    }

    /// Ask the run to stop after the files already in progress.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the run completes.
    pub fn wait(self) -> Result<RunResult, RunError> {
        self.thread.join().unwrap_or(Err(RunError::Aborted))
    }

    /// Feed every progress emission to `on_progress`, then wait.
    pub fn wait_with_progress(self, mut on_progress: impl FnMut(u8)) -> Result<RunResult, RunError> {
        for percent in self.progress.iter() {
            on_progress(percent);
        }
        self.wait()
    }
}

/// Normalize every supported image under `dir` onto `target`.
pub fn start(
    dir: impl Into<PathBuf>,
    target: TargetSize,
    options: SchedulerOptions,
    hook: Option<Box<dyn CompletionHook>>,
) -> Result<RunHandle, RunError> {
    start_with(
        Arc::new(RustTransform::new()),
        RunInput::Directory(dir.into()),
        target,
        options,
        hook,
    )
}

/// [`start`] with the canvas given as a physical page size.
///
/// Each side is `round(inches * dpi)`; `dpi` is also stamped on every output.
pub fn start_batch(
    dir: impl Into<PathBuf>,
    width_in: f64,
    height_in: f64,
    dpi: u32,
    options: SchedulerOptions,
    hook: Option<Box<dyn CompletionHook>>,
) -> Result<RunHandle, RunError> {
    start(dir, TargetSize::from_inches(width_in, height_in, dpi), options, hook)
}

/// Normalize an explicit list of files, skipping discovery.
pub fn start_files(
    paths: Vec<PathBuf>,
    target: TargetSize,
    options: SchedulerOptions,
    hook: Option<Box<dyn CompletionHook>>,
) -> Result<RunHandle, RunError> {
    start_with(
        Arc::new(RustTransform::new()),
        RunInput::Files(paths),
        target,
        options,
        hook,
    )
}

/// Start a run with any transform.
pub fn start_with(
    transform: Arc<dyn ImageTransform + Send>,
    input: RunInput,
    target: TargetSize,
    options: SchedulerOptions,
    hook: Option<Box<dyn CompletionHook>>,
) -> Result<RunHandle, RunError> {
    let (tx, rx) = mpsc::channel();
    let cancel = options.cancel.clone();

    let thread = thread::Builder::new()
        .name("canvasfit-run".into())
        .spawn(move || {
            let result = execute(transform.as_ref(), input, target, &options, tx)?;
            if let Some(hook) = hook {
                hook.on_complete(&result);
            }
            Ok(result)
        })
        .map_err(RunError::Spawn)?;

    Ok(RunHandle {
        progress: rx,
        cancel,
        thread,
    })
}

/// Body of the run thread. Consumes the sender so the stream closes on return.
fn execute(
    transform: &(dyn ImageTransform + Send),
    input: RunInput,
    target: TargetSize,
    options: &SchedulerOptions,
    tx: Sender<u8>,
) -> Result<RunResult, RunError> {
    let paths = match input {
        RunInput::Directory(dir) => {
            info!("Discovering images under {}", dir.display());
            discover(&dir)?
        }
        RunInput::Files(paths) => paths,
    };

    if paths.is_empty() {
        info!("Nothing to process");
        let _ = tx.send(100);
        return Ok(RunResult::default());
    }

    let tasks: Vec<ImageTask> = paths
        .into_iter()
        .map(|path| ImageTask::new(path, target))
        .collect();

    // Out of range of u8, so the first emission always goes out.
    let last_sent = AtomicU16::new(u16::MAX);
    let result = scheduler::run(transform, &tasks, options, |snapshot| {
        let percent = snapshot.percent();
        if last_sent.swap(u16::from(percent), Ordering::SeqCst) != u16::from(percent) {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(percent);
        }
    });
    Ok(result)
}
