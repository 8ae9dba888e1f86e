//! Installing the global subscriber with file output

use snapvfs::logging::{init_logging, LoggingConfig};
use snapvfs::{CaseSensitivity, VirtualFileSystem};
use tempfile::TempDir;

#[test]
fn test_file_logging_records_cache_events() {
    let temp_dir = TempDir::new().unwrap();
    let log_file = temp_dir.path().join("logs").join("snapvfs.log");
    let config = LoggingConfig {
        level: "info".to_string(),
        output: "file".to_string(),
        file: Some(log_file.clone()),
        ..LoggingConfig::default()
    };

    init_logging(Some(&config)).unwrap();
    // Only one global subscriber per process
    assert!(init_logging(Some(&config)).is_err());

    let vfs = VirtualFileSystem::new(CaseSensitivity::CaseSensitive);
    vfs.invalidate_all();

    let contents = std::fs::read_to_string(&log_file).unwrap();
    assert!(contents.contains("Invalidating all cached file system state"));
}
