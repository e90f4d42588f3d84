//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Found 3 images under scans/
//! 001 2024/page-1.jpg
//! 002 2024/page-2.tif
//! 003 cover.png
//!     jpg: 1, png: 1, tif: 1
//! ```
//!
//! ## Run
//!
//! ```text
//! Canvas 1700x2200 px (8.5 x 11 in at 200 dpi)
//! Progress: 33%
//! Progress: 66%
//! Progress: 100%
//! Processed 2, errored 1 (1 skipped), total 3
//! Failures
//!     skipped scans/readme.bmp
//!         unsupported file type: bmp
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure and do no I/O.

use crate::types::{ImageOutcome, RunResult, TargetSize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Format a 1-based positional index as a zero-padded 3-digit string.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Path relative to `root` when it lives under it, as given otherwise.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_output(root: &Path, paths: &[PathBuf]) -> Vec<String> {
    let mut lines = vec![format!(
        "Found {} image{} under {}",
        paths.len(),
        if paths.len() == 1 { "" } else { "s" },
        root.display()
    )];

    let mut sorted: Vec<String> = paths.iter().map(|p| display_path(p, root)).collect();
    sorted.sort();
    for (i, path) in sorted.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), path));
    }

    let mut by_ext: BTreeMap<String, usize> = BTreeMap::new();
    for path in paths {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        *by_ext.entry(ext).or_default() += 1;
    }
    if !by_ext.is_empty() {
        let counts: Vec<String> = by_ext.iter().map(|(ext, n)| format!("{ext}: {n}")).collect();
        lines.push(format!("{}{}", indent(1), counts.join(", ")));
    }
    lines
}

pub fn print_check_output(root: &Path, paths: &[PathBuf]) {
    for line in format_check_output(root, paths) {
        println!("{}", line);
    }
}

// ============================================================================
// Run
// ============================================================================

pub fn format_target(target: &TargetSize, width_in: f64, height_in: f64) -> String {
    format!(
        "Canvas {}x{} px ({} x {} in at {} dpi)",
        target.width, target.height, width_in, height_in, target.dpi
    )
}

pub fn format_progress(percent: u8) -> String {
    format!("Progress: {percent}%")
}

/// Summary line plus one entry per file that did not succeed.
pub fn format_run_summary(result: &RunResult, root: Option<&Path>) -> Vec<String> {
    let includes_skips = result.processed + result.errored == result.total;
    let mut summary = format!(
        "Processed {}, errored {}",
        result.processed, result.errored
    );
    if result.skipped > 0 {
        if includes_skips {
            summary.push_str(&format!(" ({} skipped)", result.skipped));
        } else {
            summary.push_str(&format!(", skipped {}", result.skipped));
        }
    }
    summary.push_str(&format!(", total {}", result.total));

    let mut lines = vec![summary];
    let mut failures = result.failures().peekable();
    if failures.peek().is_some() {
        lines.push("Failures".to_string());
    }
    for entry in failures {
        let shown = match root {
            Some(root) => display_path(&entry.path, root),
            None => entry.path.display().to_string(),
        };
        lines.push(format!("{}{} {}", indent(1), entry.outcome.label(), shown));
        if let ImageOutcome::Failed(reason) | ImageOutcome::Skipped(reason) = &entry.outcome {
            lines.push(format!("{}{}", indent(2), reason));
        }
    }
    lines
}

pub fn print_run_summary(result: &RunResult, root: Option<&Path>) {
    for line in format_run_summary(result, root) {
        println!("{}", line);
    }
}
