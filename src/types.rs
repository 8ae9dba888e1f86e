//! Shared primitive types

/// BLAKE3 digest (32 bytes)
pub type Hash = [u8; 32];

/// Monotonic mutation counter used by the version index
pub type Version = u64;
