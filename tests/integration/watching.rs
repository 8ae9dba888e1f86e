//! File watching against a real directory tree

use super::test_utils::vfs_path_of;
use snapvfs::snapshot::excludes::DefaultExcludes;
use snapvfs::snapshot::hasher::compute_content_hash;
use snapvfs::snapshot::walker::DirectorySnapshotter;
use snapvfs::{
    CaseSensitivity, FileSystemAccess, FileWatcher, VfsError, VfsPath, VirtualFileSystem,
    WatchConfig, WrittenLocations,
};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Fixture {
    _temp_dir: TempDir,
    root: VfsPath,
    vfs: Arc<VirtualFileSystem>,
    written: Arc<WrittenLocations>,
    access: FileSystemAccess,
    watcher: FileWatcher,
}

fn fixture(files: &[(&str, &str)]) -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(temp_dir.path().join(name), content).unwrap();
    }
    let root = vfs_path_of(temp_dir.path());

    let vfs = Arc::new(VirtualFileSystem::new(CaseSensitivity::CaseSensitive));
    let written = Arc::new(WrittenLocations::new(CaseSensitivity::CaseSensitive));
    let access = FileSystemAccess::new(
        Arc::clone(&vfs),
        DirectorySnapshotter::new(),
        DefaultExcludes::ant_defaults(),
        16,
    )
    .with_write_listener(written.clone());

    let config = WatchConfig {
        batch_window_ms: 20,
        ..WatchConfig::default()
    };
    let watcher = FileWatcher::start(Arc::clone(&vfs), Arc::clone(&written), &config).unwrap();
    watcher.watch(&root).unwrap();

    Fixture {
        _temp_dir: temp_dir,
        root,
        vfs,
        written,
        access,
        watcher,
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

fn write_file(location: &VfsPath, content: &str) -> Result<(), VfsError> {
    fs::write(location, content).map_err(|e| VfsError::Io {
        path: location.to_path_buf(),
        source: e,
    })
}

#[test]
fn test_external_change_invalidates_cached_snapshot() {
    let f = fixture(&[("a.txt", "one"), ("b.txt", "untouched")]);
    let a = f.root.join("a.txt");
    let b = f.root.join("b.txt");
    f.access.read(&a).unwrap();
    f.access.read(&b).unwrap();

    fs::write(&a, "two").unwrap();

    assert!(wait_until(|| f.vfs.find_metadata(&a).is_none()), "a.txt stayed cached");
    assert!(f.vfs.find_snapshot(&b).is_some());
    assert_eq!(f.access.read(&a).unwrap().hash(), compute_content_hash(b"two"));
    assert!(f.watcher.is_watching());
    assert_eq!(f.watcher.watched_hierarchies(), vec![f.root.clone()]);
}

#[test]
fn test_build_outputs_are_not_invalidated_by_their_own_events() {
    let f = fixture(&[("out.txt", "old"), ("src.txt", "source")]);
    let out = f.root.join("out.txt");
    let src = f.root.join("src.txt");

    f.written.build_started();
    f.access.write(&[out.clone()], || write_file(&out, "new")).unwrap();
    let produced = f.access.read(&out).unwrap();
    f.access.read(&src).unwrap();

    // Changes arrive in order, so once src is gone the output's event was seen
    fs::write(&src, "edited").unwrap();
    assert!(wait_until(|| f.vfs.find_metadata(&src).is_none()), "src.txt stayed cached");
    let cached = f.vfs.find_snapshot(&out).expect("output was invalidated by its own event");
    assert!(Arc::ptr_eq(&cached, &produced));

    f.written.build_finished();
    fs::write(&out, "newer").unwrap();
    assert!(wait_until(|| f.vfs.find_metadata(&out).is_none()), "out.txt stayed cached");
}

#[test]
fn test_stopped_watcher_leaves_cache_alone() {
    let f = fixture(&[("a.txt", "one")]);
    let a = f.root.join("a.txt");

    f.watcher.stop();
    assert!(!f.watcher.is_watching());
    assert!(f.watcher.watched_hierarchies().is_empty());
    assert!(f.watcher.watch(&f.root).is_err());

    f.access.read(&a).unwrap();
    fs::write(&a, "two").unwrap();
    thread::sleep(Duration::from_millis(200));
    assert!(f.vfs.find_snapshot(&a).is_some());
}
