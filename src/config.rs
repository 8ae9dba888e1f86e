//! Configuration System
//!
//! Layered configuration for the snapshot cache: merge-policy defaults, the
//! global config file, workspace config files, then `SNAPVFS_*` environment
//! variables. Validated before it is used to wire a [`FileSystemAccess`].
//!
//! [`FileSystemAccess`]: crate::access::FileSystemAccess

use crate::logging::LoggingConfig;
use crate::snapshot::excludes::ANT_DEFAULT_EXCLUDES;
use crate::tree::path::CaseSensitivity;
use crate::watch::WatchConfig;
use serde::{Deserialize, Serialize};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VfsConfig {
    /// Segment comparison mode; `None` picks the platform default
    #[serde(default)]
    pub case_sensitivity: Option<CaseSensitivity>,

    /// Number of stripes guarding concurrent probes (power of two)
    #[serde(default = "default_lock_stripes")]
    pub lock_stripes: usize,

    /// Ant-style patterns skipped while walking directories
    #[serde(default = "default_excludes")]
    pub default_excludes: Vec<String>,

    /// File watching configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

pub(crate) fn default_lock_stripes() -> usize {
    64
}

fn default_excludes() -> Vec<String> {
    ANT_DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect()
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            case_sensitivity: None,
            lock_stripes: default_lock_stripes(),
            default_excludes: default_excludes(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    LockStripes(usize),
    ExcludePattern(String),
    Watch(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::LockStripes(count) => {
                write!(f, "lock_stripes must be a power of two greater than zero, got {}", count)
            }
            ValidationError::ExcludePattern(msg) => write!(f, "Default excludes: {}", msg),
            ValidationError::Watch(msg) => write!(f, "Watch: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl VfsConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !self.lock_stripes.is_power_of_two() {
            errors.push(ValidationError::LockStripes(self.lock_stripes));
        }

        for pattern in &self.default_excludes {
            if pattern.trim().is_empty() {
                errors.push(ValidationError::ExcludePattern(
                    "Pattern cannot be empty".to_string(),
                ));
            } else if pattern.matches('*').count() > 1 && !pattern.starts_with("**/") {
                errors.push(ValidationError::ExcludePattern(format!(
                    "Pattern '{}' has more than one wildcard",
                    pattern
                )));
            }
        }

        if self.watch.batch_window_ms == 0 {
            errors.push(ValidationError::Watch(
                "batch_window_ms must be greater than zero".to_string(),
            ));
        }
        if self.watch.max_batch_size == 0 {
            errors.push(ValidationError::Watch(
                "max_batch_size must be greater than zero".to_string(),
            ));
        }

        if !["json", "text"].contains(&self.logging.format.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "Invalid format '{}'",
                self.logging.format
            )));
        }
        if !["stdout", "stderr", "file"].contains(&self.logging.output.as_str()) {
            errors.push(ValidationError::Logging(format!(
                "Invalid output '{}'",
                self.logging.output
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
