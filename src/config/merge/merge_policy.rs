//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("lock_stripes", super::super::default_lock_stripes() as u64)?
        .set_default("watch.batch_window_ms", crate::watch::default_batch_window_ms())?
        .set_default("watch.max_batch_size", crate::watch::default_max_batch_size() as u64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
