//! Shared types passed between discovery, the scheduler, and the run controller.
//!
//! [`ImageOutcome`] and [`RunResult`] are serializable so a finished run can be
//! written out as a JSON report.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output canvas size in pixels plus the resolution stamped on every output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
}

impl TargetSize {
    /// Derive the pixel canvas from a physical page size.
    ///
    /// Each side is `round(inches * dpi)`, computed independently.
    ///
    /// ```
    /// # use canvasfit::types::TargetSize;
    /// let letter = TargetSize::from_inches(8.5, 11.0, 200);
    /// assert_eq!((letter.width, letter.height), (1700, 2200));
    /// ```
    pub fn from_inches(width_in: f64, height_in: f64, dpi: u32) -> Self {
        Self {
            width: inches_to_pixels(width_in, dpi),
            height: inches_to_pixels(height_in, dpi),
            dpi,
        }
    }
}

/// `round(inches * dpi)`, saturating at the `u32` bounds.
pub fn inches_to_pixels(inches: f64, dpi: u32) -> u32 {
    let px = (inches * f64::from(dpi)).round();
    if px <= 0.0 {
        0
    } else if px >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        px as u32
    }
}

/// One file to normalize. Owned by the worker that processes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    pub source: PathBuf,
    pub target: TargetSize,
}

impl ImageTask {
    pub fn new(source: impl Into<PathBuf>, target: TargetSize) -> Self {
        Self {
            source: source.into(),
            target,
        }
    }

    pub fn path(&self) -> &Path {
        &self.source
    }
}

/// Result of attempting one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ImageOutcome {
    Success,
    Skipped(String),
    Failed(String),
}

impl ImageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

/// Outcome of one file, keyed by its source path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub outcome: ImageOutcome,
}

/// Final tally of a run plus every per-file outcome.
///
/// `errored` includes `skipped` when the run counts skips as errors (the
/// default), in which case `processed + errored == total`. Otherwise
/// `processed + errored + skipped == total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub processed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub total: usize,
    pub outcomes: Vec<FileOutcome>,
}

impl RunResult {
    /// Entries that did not succeed, in completion order.
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.outcome.is_success())
    }

    pub fn outcome_for(&self, path: &Path) -> Option<&ImageOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.path == path)
            .map(|o| &o.outcome)
    }
}
