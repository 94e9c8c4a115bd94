//! Filesystem utility functions
//!
//! This module provides common filesystem operations used across the codebase.

use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::{ProxyError, Result};

/// Replace the contents of `path` atomically
///
/// Writes to a sibling `.tmp` file and renames it over the target, so a
/// concurrent reader sees either the old or the new value, never a partial one.
/// The parent directory is created if missing.
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ProxyError::storage(parent, e))?;
    }

    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    fs::write(temp_path, content).map_err(|e| ProxyError::storage(temp_path, e))?;
    fs::rename(temp_path, path).map_err(|e| ProxyError::storage(path, e))
}

/// Run `f` while holding an exclusive lock on `lock_path`
///
/// The lock file is created if absent and left in place afterwards.
/// Blocks until the lock is available.
pub fn with_exclusive_lock<T, F>(lock_path: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ProxyError::storage(parent, e))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| ProxyError::storage(lock_path, e))?;

    file.lock_exclusive()
        .map_err(|e| ProxyError::storage(lock_path, e))?;

    let result = f();

    // Release the lock (ignore errors, closing the handle releases it anyway)
    let _ = FileExt::unlock(&file);
    result
}
