//! The transform seam and its error type.
//!
//! The [`ImageTransform`] trait is the one operation the scheduler needs:
//! turn an [`ImageTask`] into an [`ImageOutcome`]. The production
//! implementation is [`RustTransform`](super::rust_backend::RustTransform);
//! tests drive the scheduler with the mock in [`tests`].

use crate::types::{ImageOutcome, ImageTask};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransformError {
    /// Unsupported inputs are skipped; everything else is a failure.
    pub fn into_outcome(self) -> ImageOutcome {
        match self {
            Self::Unsupported(_) => ImageOutcome::Skipped(self.to_string()),
            other => ImageOutcome::Failed(other.to_string()),
        }
    }
}

/// Normalizes one file in place.
///
/// Implementations must never panic for a bad input file; they report it as
/// an outcome. A panic is treated by the scheduler as a batch-level failure.
pub trait ImageTransform: Sync {
    fn transform(&self, task: &ImageTask) -> ImageOutcome;
}
