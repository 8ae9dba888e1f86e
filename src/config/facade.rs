//! Loader entry points

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::VfsConfig;
use config::{ConfigError, File};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace
    ///
    /// Later layers override earlier ones: defaults, global file,
    /// `.snapvfs/config.toml`, the `SNAPVFS_PROFILE` overlay, environment.
    pub fn load(workspace_root: &Path) -> Result<VfsConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// Load a single TOML file on top of the defaults
    pub fn load_from_file(path: &Path) -> Result<VfsConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).format(config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only
    pub fn default() -> VfsConfig {
        VfsConfig::default()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
        workspace_file::workspace_config_path(workspace_root)
    }
}
