//! # canvasfit
//!
//! Batch normalization of photo and scan directories onto a fixed print-size
//! canvas. Every supported image is scaled to fit the page, centered on a
//! white canvas whose orientation follows the image, and written back over
//! the original in its own container format, stamped with one resolution.
//!
//! # Architecture: One-Way Pipeline
//!
//! ```text
//! discover  dir       →  [paths]             (walk + extension filter)
//! scheduler [tasks]   →  batches on a pool   (rayon, bounded workers)
//! imaging   task      →  ImageOutcome        (decode, fit, pad, re-encode)
//! progress  outcome   →  Snapshot            (one mutex, per-file updates)
//! run       handle    →  progress + result   (background thread, channel)
//! ```
//!
//! Per-file problems never stop a run. A file that cannot be decoded or
//! written is recorded as failed and left exactly as it was; a file with an
//! unsupported extension is skipped. A panic inside a batch is contained at
//! the batch boundary. Only an unreadable root directory ends a run early.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`discover`] | Recursive walk, supported-extension filter |
//! | [`imaging`] | Geometry, canvas composition, format capture, encoders, the [`imaging::ImageTransform`] seam |
//! | [`progress`] | Thread-safe processed / failed / skipped counters |
//! | [`scheduler`] | Batching, worker pool, batch-failure containment, cancellation |
//! | [`run`] | Asynchronous run handle, completion hooks |
//! | [`config`] | `canvasfit.toml` loading, merging, and validation |
//! | [`types`] | Tasks, outcomes and results shared by every stage |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Atomic In-Place Rewrite
//!
//! Output replaces the input. The new file is encoded entirely in memory,
//! written to a temp file beside the original, synced, and renamed over it.
//! An interrupted run leaves each file either untouched or fully rewritten.
//!
//! ## Pure-Rust Codecs
//!
//! Decoding and encoding use the `image`, `png` and `tiff` crates. There is
//! nothing to install beside the binary.
//!
//! ## Orientation Follows the Photo
//!
//! The page size is given once, but a landscape photo gets a landscape
//! canvas and a portrait photo a portrait one. See
//! [`imaging::effective_canvas`].

pub mod config;
pub mod discover;
pub mod imaging;
pub mod output;
pub mod progress;
pub mod run;
pub mod scheduler;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
