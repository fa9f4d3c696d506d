//! Source file reading for bundle construction
//!
//! Source text is embedded in the bundle verbatim, so reads are eager and
//! checked: the path must be a regular file (following symlinks, since
//! checked-out codebases use them) and must not exceed a size limit.

use crate::error::{BenchError, BenchResult};
use std::fs;
use std::path::Path;

/// Default maximum source file size (16 MiB)
pub const DEFAULT_MAX_SOURCE_SIZE: u64 = 16 * 1024 * 1024;

/// Read a source file for embedding into a bundle.
///
/// # Errors
///
/// Returns `BenchError::FileNotRegular` if the path is not a regular file.
/// Returns `BenchError::FileTooBig` if the file exceeds the size limit.
/// Returns `BenchError::SourceRead` for other I/O errors, including invalid UTF-8.
pub fn read_source_text(path: &Path) -> BenchResult<String> {
    read_source_text_with_limit(path, DEFAULT_MAX_SOURCE_SIZE)
}

/// Files at exactly `max_size` bytes are accepted.
pub fn read_source_text_with_limit(path: &Path, max_size: u64) -> BenchResult<String> {
    let metadata = fs::metadata(path).map_err(|e| BenchError::SourceRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    if !metadata.is_file() {
        return Err(BenchError::FileNotRegular {
            path: path.to_path_buf(),
        });
    }

    let size = metadata.len();
    if size > max_size {
        return Err(BenchError::FileTooBig {
            path: path.to_path_buf(),
            size,
            limit: max_size,
        });
    }

    fs::read_to_string(path).map_err(|e| BenchError::SourceRead {
        path: path.to_path_buf(),
        source: e,
    })
}
