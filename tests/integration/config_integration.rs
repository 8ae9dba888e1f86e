//! Integration tests for Configuration System

use snapvfs::config::{ConfigLoader, ValidationError, VfsConfig};
use snapvfs::{CaseSensitivity, FileSystemAccess};
use std::sync::Mutex;
use tempfile::TempDir;

// Serializes tests that touch process environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Points the global config file at `config_home` for the duration of `f`
fn with_config_home<T>(config_home: &std::path::Path, f: impl FnOnce() -> T) -> T {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let original = std::env::var_os("XDG_CONFIG_HOME");
    std::env::set_var("XDG_CONFIG_HOME", config_home);
    let result = f();
    match original {
        Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }
    result
}

fn write_workspace_file(workspace: &std::path::Path, name: &str, contents: &str) {
    let dir = workspace.join(".snapvfs");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("snapvfs.toml");
    std::fs::write(
        &config_file,
        r#"
case_sensitivity = "case_insensitive"
lock_stripes = 16
default_excludes = ["**/target/**", "**/*.tmp"]

[logging]
level = "debug"
format = "json"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.case_sensitivity, Some(CaseSensitivity::CaseInsensitive));
    assert_eq!(config.lock_stripes, 16);
    assert_eq!(config.default_excludes, vec!["**/target/**", "**/*.tmp"]);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.logging.output, "stderr");

    let access = FileSystemAccess::from_config(&config).unwrap();
    assert_eq!(
        access.virtual_file_system().case_sensitivity(),
        CaseSensitivity::CaseInsensitive
    );
    assert!(access.default_excludes().exclude_dir("target"));
}

#[test]
fn test_defaults_without_any_files() {
    let temp_dir = TempDir::new().unwrap();
    let config_home = temp_dir.path().join("no-config-here");
    let config = with_config_home(&config_home, || ConfigLoader::load(temp_dir.path())).unwrap();
    assert_eq!(config, VfsConfig::default());
}

#[test]
fn test_workspace_config_overrides_global_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_home = temp_dir.path().join("xdg");
    std::fs::create_dir_all(config_home.join("snapvfs")).unwrap();
    std::fs::write(
        config_home.join("snapvfs").join("config.toml"),
        r#"
lock_stripes = 8
case_sensitivity = "case_sensitive"
"#,
    )
    .unwrap();

    let workspace = temp_dir.path().join("workspace");
    write_workspace_file(&workspace, "config.toml", "lock_stripes = 32\n");

    let config = with_config_home(&config_home, || {
        assert_eq!(
            ConfigLoader::global_config_path(),
            Some(config_home.join("snapvfs").join("config.toml"))
        );
        ConfigLoader::load(&workspace)
    })
    .unwrap();

    assert_eq!(config.lock_stripes, 32);
    assert_eq!(config.case_sensitivity, Some(CaseSensitivity::CaseSensitive));
}

#[test]
fn test_profile_overlay_applies_only_when_selected() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("workspace");
    write_workspace_file(&workspace, "config.toml", "lock_stripes = 32\n");
    write_workspace_file(
        &workspace,
        "config.ci.toml",
        "lock_stripes = 256\n[logging]\nformat = \"json\"\n",
    );
    // Legacy location is not read
    std::fs::create_dir_all(workspace.join("config")).unwrap();
    std::fs::write(workspace.join("config").join("config.toml"), "lock_stripes = 4\n").unwrap();

    let (plain, profiled) = with_config_home(&temp_dir.path().join("xdg"), || {
        let plain = ConfigLoader::load(&workspace);
        std::env::set_var("SNAPVFS_PROFILE", "ci");
        let profiled = ConfigLoader::load(&workspace);
        std::env::remove_var("SNAPVFS_PROFILE");
        (plain, profiled)
    });

    let plain = plain.unwrap();
    assert_eq!(plain.lock_stripes, 32);
    assert_eq!(plain.logging.format, "text");

    let profiled = profiled.unwrap();
    assert_eq!(profiled.lock_stripes, 256);
    assert_eq!(profiled.logging.format, "json");
    assert_eq!(
        ConfigLoader::workspace_config_path(&workspace),
        workspace.join(".snapvfs").join("config.toml")
    );
}

#[test]
fn test_environment_overrides_files() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path();
    write_workspace_file(workspace, "config.toml", "lock_stripes = 32\n");

    let config = with_config_home(&temp_dir.path().join("xdg"), || {
        std::env::set_var("SNAPVFS_LOCK_STRIPES", "128");
        std::env::set_var("SNAPVFS_LOGGING__LEVEL", "trace");
        let config = ConfigLoader::load(workspace);
        std::env::remove_var("SNAPVFS_LOCK_STRIPES");
        std::env::remove_var("SNAPVFS_LOGGING__LEVEL");
        config
    })
    .unwrap();

    assert_eq!(config.lock_stripes, 128);
    assert_eq!(config.logging.level, "trace");
}

#[test]
fn test_invalid_config_rejected_by_access() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");
    std::fs::write(&config_file, "lock_stripes = 12\n").unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert_eq!(config.validate(), Err(vec![ValidationError::LockStripes(12)]));
    let err = FileSystemAccess::from_config(&config).unwrap_err();
    assert!(err.to_string().contains("lock_stripes"));
}
