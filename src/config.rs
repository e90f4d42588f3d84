//! Run configuration.
//!
//! Handles loading, validating, and merging `canvasfit.toml`. Stock defaults
//! are serialized to a TOML table, the user file is merged over it, and the
//! result is deserialized with unknown keys rejected. Command-line flags are
//! applied on top by the binary, followed by a second validation.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [page]
//! width_in = 8.5            # Canvas width in inches
//! height_in = 11.0          # Canvas height in inches
//! dpi = 200                 # Pixels per inch; also stamped on every output
//!
//! [processing]
//! # max_workers = 4         # Omit for min(8, CPU cores)
//! batch_size = 10           # Files per scheduled unit of work
//!
//! [outcomes]
//! count_skipped_as_errors = true
//!
//! [completion]
//! command = []              # argv run after every finished run
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [page]
//! dpi = 300
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::progress::SkipPolicy;
use crate::run::CommandHook;
use crate::scheduler::{CancelFlag, SchedulerOptions};
use crate::types::TargetSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "canvasfit.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `canvasfit.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Physical page the canvas represents.
    pub page: PageConfig,
    /// Worker pool and batching.
    pub processing: ProcessingConfig,
    pub outcomes: OutcomesConfig,
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageConfig {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            width_in: 8.5,
            height_in: 11.0,
            dpi: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to 8. Values larger than the core count are
    /// clamped down.
    pub max_workers: Option<usize>,
    pub batch_size: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            batch_size: crate::scheduler::DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutcomesConfig {
    /// Fold skipped files into the error count.
    pub count_skipped_as_errors: bool,
}

impl Default for OutcomesConfig {
    fn default() -> Self {
        Self {
            count_skipped_as_errors: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionConfig {
    /// Program and arguments; empty means no hook.
    pub command: Vec<String>,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let page = &self.page;
        if !(page.width_in.is_finite() && page.width_in > 0.0)
            || !(page.height_in.is_finite() && page.height_in > 0.0)
        {
            return Err(ConfigError::Validation(
                "page.width_in and page.height_in must be positive".into(),
            ));
        }
        if page.dpi == 0 || page.dpi > u32::from(u16::MAX) {
            return Err(ConfigError::Validation(
                "page.dpi must be 1-65535".into(),
            ));
        }
        let target = self.target_size();
        if target.width == 0 || target.height == 0 {
            return Err(ConfigError::Validation(format!(
                "page size {}x{} in at {} dpi is less than one pixel",
                page.width_in, page.height_in, page.dpi
            )));
        }
        if self.processing.batch_size == 0 {
            return Err(ConfigError::Validation(
                "processing.batch_size must be at least 1".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn target_size(&self) -> TargetSize {
        TargetSize::from_inches(self.page.width_in, self.page.height_in, self.page.dpi)
    }

    pub fn skip_policy(&self) -> SkipPolicy {
        SkipPolicy::from_flag(self.outcomes.count_skipped_as_errors)
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            workers: self.processing.max_workers,
            batch_size: self.processing.batch_size,
            skip_policy: self.skip_policy(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn completion_hook(&self) -> Option<CommandHook> {
        CommandHook::from_argv(&self.completion.command)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load configuration.
///
/// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] in the
/// working directory is used if present, stock defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let overlay = match path {
        Some(path) => Some(toml::from_str(&fs::read_to_string(path)?)?),
        None => load_raw_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `canvasfit.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# canvasfit configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Page / canvas
# ---------------------------------------------------------------------------
[page]
# Physical page size. The pixel canvas is round(inches * dpi) per side and
# turns to match each photo's orientation.
width_in = 8.5
height_in = 11.0

# Resolution used for the canvas and written into every output file.
dpi = 200

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit to use 8 (never more than the CPU cores).
# max_workers = 4

# Files handed to a worker at a time. Bounds memory, not correctness.
batch_size = 10

# ---------------------------------------------------------------------------
# Outcomes
# ---------------------------------------------------------------------------
[outcomes]
# Count files skipped for an unsupported type as errors in the summary.
# Skips are always reported separately as well.
count_skipped_as_errors = true

# ---------------------------------------------------------------------------
# Completion
# ---------------------------------------------------------------------------
[completion]
# Program (and arguments) to run after each finished run. The tally is passed
# in CANVASFIT_PROCESSED, CANVASFIT_ERRORED, CANVASFIT_SKIPPED and
# CANVASFIT_TOTAL. Empty disables it.
command = []
"##
}
