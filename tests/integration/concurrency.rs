//! Concurrent readers, writers, and listeners

use super::test_utils::{file, path};
use parking_lot::Mutex;
use snapvfs::access::FileSystemAccess;
use snapvfs::snapshot::excludes::DefaultExcludes;
use snapvfs::snapshot::LocationSnapshot;
use snapvfs::tree::node::FileSystemNode;
use snapvfs::vfs::diff::VfsListener;
use snapvfs::{CaseSensitivity, VfsError, VfsPath, VirtualFileSystem};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct LiveSnapshots(Mutex<HashSet<String>>);

impl VfsListener for LiveSnapshots {
    fn node_removed(&self, node: &FileSystemNode) {
        let mut live = self.0.lock();
        for snapshot in node.root_snapshots() {
            assert!(
                live.remove(snapshot.absolute_path().as_str()),
                "removal of unknown snapshot {}",
                snapshot.absolute_path()
            );
        }
    }

    fn node_added(&self, node: &FileSystemNode) {
        let mut live = self.0.lock();
        for snapshot in node.root_snapshots() {
            live.insert(snapshot.absolute_path().to_string());
        }
    }
}

#[test]
fn test_no_stale_commit_under_race() {
    let vfs = Arc::new(VirtualFileSystem::new(CaseSensitivity::CaseSensitive));
    let started = Arc::new(Barrier::new(2));
    let invalidated = Arc::new(Barrier::new(2));
    let x = path("/x");

    let storer = {
        let vfs = Arc::clone(&vfs);
        let started = Arc::clone(&started);
        let invalidated = Arc::clone(&invalidated);
        let x = x.clone();
        thread::spawn(move || {
            vfs.store(&x, || {
                started.wait();
                invalidated.wait();
                file("/x", "computed before the write")
            })
        })
    };

    started.wait();
    vfs.invalidate(&[x.clone()]);
    invalidated.wait();

    let returned = storer.join().unwrap();
    assert_eq!(returned.absolute_path(), &x);
    assert!(vfs.find_metadata(&x).is_none());
}

#[test]
fn test_no_stale_commit_when_ancestor_invalidated() {
    let vfs = Arc::new(VirtualFileSystem::new(CaseSensitivity::CaseSensitive));
    vfs.store(&path("/d/sibling"), || file("/d/sibling", "s"));
    let started = Arc::new(Barrier::new(2));
    let invalidated = Arc::new(Barrier::new(2));

    let storer = {
        let vfs = Arc::clone(&vfs);
        let started = Arc::clone(&started);
        let invalidated = Arc::clone(&invalidated);
        thread::spawn(move || {
            vfs.store(&path("/d/deep/file"), || {
                started.wait();
                invalidated.wait();
                file("/d/deep/file", "stale")
            });
        })
    };

    started.wait();
    vfs.invalidate(&[path("/d")]);
    invalidated.wait();
    storer.join().unwrap();

    assert!(vfs.find_metadata(&path("/d/deep/file")).is_none());
    assert!(vfs.current_root().is_empty());
}

#[test]
fn test_concurrent_reads_probe_once() {
    let probes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&probes);
    let probe = move |location: &VfsPath, _: &DefaultExcludes| -> Result<LocationSnapshot, VfsError> {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Ok(file(location.as_str(), "slow"))
    };
    let vfs = Arc::new(VirtualFileSystem::new(CaseSensitivity::CaseSensitive));
    let access = Arc::new(FileSystemAccess::new(vfs, probe, DefaultExcludes::none(), 64));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let access = Arc::clone(&access);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                access.read(&path("/shared/location")).unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(probes.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|s| Arc::ptr_eq(s, &results[0])));
}

#[test]
fn test_listener_tracks_tree_under_contention() {
    let vfs = Arc::new(VirtualFileSystem::new(CaseSensitivity::CaseSensitive));
    let live = Arc::new(LiveSnapshots::default());
    vfs.add_listener(live.clone());

    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|worker| {
            let vfs = Arc::clone(&vfs);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..200 {
                    let dir = ["a", "b", "c"][(worker + round) % 3];
                    let name = format!("/{}/f{}", dir, round % 5);
                    match (worker + round) % 4 {
                        0 => {
                            vfs.invalidate(&[path(&format!("/{}", dir))]);
                        }
                        1 => {
                            vfs.invalidate(&[path(&name)]);
                        }
                        _ => {
                            let content = format!("{}-{}", worker, round);
                            vfs.store(&path(&name), || file(&name, &content));
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: HashSet<String> = vfs
        .root_snapshots_under(&VfsPath::root())
        .map(|s| s.absolute_path().to_string())
        .collect();
    assert_eq!(*live.0.lock(), expected);
}

#[test]
fn test_readers_see_consistent_generations() {
    let vfs = Arc::new(VirtualFileSystem::new(CaseSensitivity::CaseSensitive));
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let writer = {
        let vfs = Arc::clone(&vfs);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut round = 0u64;
            while !stop.load(Ordering::SeqCst) {
                // Both files always change together
                let content = round.to_string();
                vfs.invalidate(&[path("/pair")]);
                vfs.store(&path("/pair"), || {
                    super::test_utils::dir(
                        "/pair",
                        vec![file("/pair/left", &content), file("/pair/right", &content)],
                    )
                });
                round += 1;
            }
        })
    };

    for _ in 0..2000 {
        let root = vfs.current_root();
        let left = root.find_snapshot(&path("/pair/left"));
        let right = root.find_snapshot(&path("/pair/right"));
        match (left, right) {
            (Some(left), Some(right)) => assert_eq!(left.hash(), right.hash()),
            (None, None) => {}
            other => panic!("torn read: {:?}", other),
        }
    }
    stop.store(true, Ordering::SeqCst);
    writer.join().unwrap();
}
