//! Hash computation for snapshots using BLAKE3

use crate::snapshot::{FileType, LocationSnapshot};
use crate::types::Hash;
use blake3::Hasher;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Compute content hash for file bytes
pub fn compute_content_hash(content: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(content);
    *hasher.finalize().as_bytes()
}

/// Stream a file from disk through BLAKE3
pub fn hash_file(path: &Path) -> io::Result<Hash> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(*hasher.finalize().as_bytes())
}

/// Hash shared by every missing location
pub fn missing_hash() -> Hash {
    compute_content_hash(b"missing")
}

/// Merkle hash of a directory
///
/// hash("directory" || children_count || (name_len || name || type || child_hash)*)
///
/// Children must already be sorted by name. The directory's own path is not
/// part of the hash, so relocating a tree keeps it stable.
pub fn compute_directory_hash(children: &[Arc<LocationSnapshot>]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(b"directory");
    hasher.update(&(children.len() as u64).to_be_bytes());

    for child in children {
        let name = child.name().as_bytes();
        hasher.update(&(name.len() as u64).to_be_bytes());
        hasher.update(name);
        hasher.update(type_tag(child.file_type()));
        hasher.update(&child.hash());
    }

    *hasher.finalize().as_bytes()
}

fn type_tag(file_type: FileType) -> &'static [u8] {
    match file_type {
        FileType::RegularFile => b"f",
        FileType::Directory => b"d",
        FileType::Missing => b"m",
    }
}
