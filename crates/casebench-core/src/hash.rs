//! Content fingerprint of a case description file.
//!
//! The digest covers the raw bytes only. Two case files that mean the same
//! thing but differ textually get different cache keys.

use crate::error::{BenchError, BenchResult};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Hex digest of the file's bytes.
pub fn hash_file(path: &Path) -> BenchResult<String> {
    let bytes = std::fs::read(path).map_err(|e| BenchError::io(path, e))?;
    Ok(hash_bytes(&bytes))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
