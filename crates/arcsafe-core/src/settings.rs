//! Process-wide threshold defaults.
//!
//! Defaults are loaded at most once per process. The first call to
//! [`defaults`] reads the configuration file named by `ARCSAFE_CONFIG`, or
//! [`DEFAULT_CONFIG_PATH`] when the variable is unset. A program that wants
//! different defaults calls [`init`] before anything else touches them.
//!
//! The file is TOML with a single section:
//!
//! ```toml
//! [THRESHOLDS]
//! RATIO_THRESHOLD = 100
//! SIZE_THRESHOLD = 4398046511104
//! OBJECT_THRESHOLD = 100000
//! ```
//!
//! Every key is optional; an absent key keeps the built-in value.

use std::path::Path;
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use thiserror::Error;

use crate::ThresholdConfig;

/// Configuration file consulted when `ARCSAFE_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/arcsafe/arcsafe.conf";

/// Environment variable naming an alternative configuration file.
pub const CONFIG_PATH_ENV: &str = "ARCSAFE_CONFIG";

static DEFAULTS: OnceCell<ThresholdConfig> = OnceCell::new();

/// Errors raised while loading threshold defaults.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or has wrongly typed values.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but makes no sense as a limit.
    #[error("invalid threshold: {0}")]
    Invalid(String),

    /// [`init`] was called after the defaults were already fixed.
    #[error("threshold defaults already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsFile {
    #[serde(rename = "THRESHOLDS")]
    thresholds: Option<ThresholdSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdSection {
    #[serde(rename = "RATIO_THRESHOLD")]
    ratio: Option<f64>,
    #[serde(rename = "SIZE_THRESHOLD")]
    size: Option<u64>,
    #[serde(rename = "OBJECT_THRESHOLD")]
    objects: Option<u64>,
}

/// Parses configuration file contents into threshold defaults.
///
/// # Examples
///
/// ```
/// use arcsafe_core::settings::parse;
///
/// let config = parse("[THRESHOLDS]\nOBJECT_THRESHOLD = 10\n").unwrap();
/// assert_eq!(config.max_objects, Some(10));
/// assert_eq!(config.max_ratio, Some(100.0));
/// ```
pub fn parse(contents: &str) -> Result<ThresholdConfig, ConfigError> {
    let file: SettingsFile = toml::from_str(contents)?;
    let section = file.thresholds.unwrap_or_default();
    let builtin = ThresholdConfig::builtin();

    if let Some(ratio) = section.ratio
        && !(ratio.is_finite() && ratio > 0.0)
    {
        return Err(ConfigError::Invalid(format!(
            "RATIO_THRESHOLD must be a positive number, got {ratio}"
        )));
    }

    Ok(ThresholdConfig {
        max_objects: section.objects.or(builtin.max_objects),
        max_size: section.size.or(builtin.max_size),
        max_ratio: section.ratio.or(builtin.max_ratio),
    })
}

/// Loads threshold defaults from `path`.
///
/// A missing file is not an error: a warning is logged and the built-in
/// limits are returned.
pub fn load_from(path: &Path) -> Result<ThresholdConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                path = %path.display(),
                "config file not found, using built-in thresholds"
            );
            return Ok(ThresholdConfig::builtin());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse(&contents)
}

/// Returns the configuration file path in effect for this process.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Fixes the process-wide defaults explicitly.
///
/// Fails with [`ConfigError::AlreadyInitialized`] if the defaults were
/// already set, either by an earlier `init` or by a lazy load.
pub fn init(config: ThresholdConfig) -> Result<(), ConfigError> {
    DEFAULTS
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Returns the process-wide defaults, loading them on first call.
///
/// An unreadable or malformed file is logged and replaced by the built-in
/// limits, so this never fails.
pub fn defaults() -> &'static ThresholdConfig {
    DEFAULTS.get_or_init(|| {
        let path = config_path();
        load_from(&path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring config file, using built-in thresholds");
            ThresholdConfig::builtin()
        })
    })
}
