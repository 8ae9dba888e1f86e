//! File system access against a real directory tree

use super::test_utils::vfs_path_of;
use snapvfs::config::VfsConfig;
use snapvfs::snapshot::hasher::compute_content_hash;
use snapvfs::snapshot::FileType;
use snapvfs::{CaseSensitivity, FileSystemAccess, VfsError};
use std::fs;
use tempfile::TempDir;

fn access() -> FileSystemAccess {
    let config = VfsConfig {
        case_sensitivity: Some(CaseSensitivity::CaseSensitive),
        ..VfsConfig::default()
    };
    FileSystemAccess::from_config(&config).unwrap()
}

#[test]
fn test_read_directory_then_children_from_cache() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir(temp_dir.path().join("src")).unwrap();
    fs::write(temp_dir.path().join("src").join("lib.rs"), "pub fn f() {}").unwrap();
    fs::write(temp_dir.path().join("Cargo.toml"), "[package]").unwrap();

    let access = access();
    let root = vfs_path_of(temp_dir.path());
    let snapshot = access.read(&root).unwrap();
    assert_eq!(snapshot.file_type(), FileType::Directory);
    assert_eq!(snapshot.children().len(), 2);

    // Served from the directory snapshot, not from disk
    fs::remove_file(temp_dir.path().join("src").join("lib.rs")).unwrap();
    let lib = access.read(&root.join("src").join("lib.rs")).unwrap();
    assert_eq!(lib.file_type(), FileType::RegularFile);
    assert_eq!(lib.hash(), compute_content_hash(b"pub fn f() {}"));
}

#[test]
fn test_write_makes_next_read_see_disk() {
    let temp_dir = TempDir::new().unwrap();
    let target = temp_dir.path().join("out.txt");
    fs::write(&target, "before").unwrap();

    let access = access();
    let root = vfs_path_of(temp_dir.path());
    let location = root.join("out.txt");
    assert_eq!(access.read(&root).unwrap().children().len(), 1);

    access
        .write(&[location.clone()], || {
            fs::write(&target, "after").map_err(|e| VfsError::Io {
                path: target.clone(),
                source: e,
            })
        })
        .unwrap();

    assert!(access.virtual_file_system().find_snapshot(&root).is_none());
    let snapshot = access.read(&location).unwrap();
    assert_eq!(snapshot.hash(), compute_content_hash(b"after"));
    assert_eq!(access.read(&root).unwrap().children().len(), 1);
}

#[test]
fn test_read_missing_location() {
    let temp_dir = TempDir::new().unwrap();
    let access = access();
    let location = vfs_path_of(temp_dir.path()).join("not-there");
    assert_eq!(access.read(&location).unwrap().file_type(), FileType::Missing);

    fs::write(temp_dir.path().join("not-there"), "now it is").unwrap();
    // Still cached as missing until someone says otherwise
    assert_eq!(access.read(&location).unwrap().file_type(), FileType::Missing);
    access.invalidate(&[location.clone()]);
    assert_eq!(access.read(&location).unwrap().file_type(), FileType::RegularFile);
}

#[test]
fn test_move_atomically_relocates_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir(temp_dir.path().join("from")).unwrap();
    fs::write(temp_dir.path().join("from").join("data.bin"), "payload").unwrap();

    let access = access();
    let root = vfs_path_of(temp_dir.path());
    let from = root.join("from");
    let to = root.join("to");
    let original = access.read(&from).unwrap();

    access.move_atomically(&from, &to).unwrap();
    assert!(temp_dir.path().join("to").join("data.bin").exists());

    let vfs = access.virtual_file_system();
    let moved = vfs.find_snapshot(&to).unwrap();
    assert_eq!(moved.absolute_path(), &to);
    assert_eq!(moved.hash(), original.hash());
    let child = vfs.find_snapshot(&to.join("data.bin")).unwrap();
    assert_eq!(child.absolute_path(), &to.join("data.bin"));
    assert!(vfs.find_metadata(&from).is_none());
    assert_eq!(access.read(&from).unwrap().file_type(), FileType::Missing);
}

#[test]
fn test_move_of_missing_source_fails_and_caches_nothing_new() {
    let temp_dir = TempDir::new().unwrap();
    let access = access();
    let root = vfs_path_of(temp_dir.path());
    let err = access
        .move_atomically(&root.join("absent"), &root.join("dest"))
        .unwrap_err();
    assert!(matches!(err, VfsError::Io { .. }));
    assert!(access.virtual_file_system().find_metadata(&root.join("dest")).is_none());
}

#[test]
fn test_exclude_change_rewalks_directories() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("keep.rs"), "k").unwrap();
    fs::write(temp_dir.path().join("trace.log"), "l").unwrap();
    fs::create_dir(temp_dir.path().join(".git")).unwrap();

    let access = access();
    let root = vfs_path_of(temp_dir.path());
    let names = |access: &FileSystemAccess| -> Vec<String> {
        access
            .read(&root)
            .unwrap()
            .children()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    };
    assert_eq!(names(&access), vec!["keep.rs", "trace.log"]);

    access.update_default_excludes(["**/*.log"]);
    assert_eq!(names(&access), vec![".git", "keep.rs"]);
}

#[test]
fn test_filtered_read() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a.rs"), "a").unwrap();
    fs::write(temp_dir.path().join("b.md"), "b").unwrap();

    let access = access();
    let root = vfs_path_of(temp_dir.path());
    let filtered = access
        .read_filtered(&root, &|s| s.file_type() != FileType::RegularFile || s.name().ends_with(".rs"))
        .unwrap()
        .unwrap();
    let names: Vec<_> = filtered.children().iter().map(|c| c.name().to_string()).collect();
    assert_eq!(names, vec!["a.rs"]);
    assert_eq!(access.read(&root).unwrap().children().len(), 2);

    let rejected = access
        .read_filtered(&root.join("b.md"), &|s| s.name().ends_with(".rs"))
        .unwrap();
    assert!(rejected.is_none());
}
