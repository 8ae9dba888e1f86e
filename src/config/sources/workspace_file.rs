//! Workspace config: `.snapvfs/config.toml`, overlaid by `.snapvfs/config.{profile}.toml`

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const WORKSPACE_CONFIG_DIR: &str = ".snapvfs";

/// Names the profile overlay; no overlay when unset or empty
pub const PROFILE_ENV: &str = "SNAPVFS_PROFILE";

pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(WORKSPACE_CONFIG_DIR).join("config.toml")
}

/// Overlay file for the active profile, if one is selected
pub fn profile_config_path(workspace_root: &Path) -> Option<PathBuf> {
    let profile = std::env::var(PROFILE_ENV).ok().filter(|p| !p.trim().is_empty())?;
    Some(
        workspace_root
            .join(WORKSPACE_CONFIG_DIR)
            .join(format!("config.{}.toml", profile.trim())),
    )
}

pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let candidates = std::iter::once(workspace_config_path(workspace_root))
        .chain(profile_config_path(workspace_root));

    for path in candidates {
        if path.is_file() {
            debug!(config_path = %path.display(), "Layering workspace configuration");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
    }
    Ok(builder)
}
