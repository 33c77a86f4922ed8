//! Per-bucket advisory lock.
//!
//! The lock lives on an open file handle ([`File::try_lock`], `flock(2)` on
//! Linux), so the kernel drops it when the handle closes: on guard drop, on
//! panic unwind, and when the process dies for any reason. The lock file
//! itself is never removed.

use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

use crate::error::LockError;

/// Lock file for `bucket` under `dir`: `<dir>/s3_sync_<bucket>`.
pub fn lock_path(dir: &Path, bucket: &str) -> PathBuf {
    dir.join(format!("s3_sync_{bucket}"))
}

/// Exclusive lock on one bucket, released on drop.
#[derive(Debug)]
pub struct BucketLock {
    file: File,
    path: PathBuf,
}

impl BucketLock {
    /// Take the lock without waiting. Fails with [`LockError::Contended`]
    /// if any other open file description holds it.
    pub fn try_acquire(dir: &Path, bucket: &str) -> Result<Self, LockError> {
        let path = lock_path(dir, bucket);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::Io { path: path.clone(), source })?;

        match file.try_lock() {
            Ok(()) => Ok(BucketLock { file, path }),
            Err(TryLockError::WouldBlock) => Err(LockError::Contended(path)),
            Err(TryLockError::Error(source)) => Err(LockError::Io { path, source }),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BucketLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock anyway.
        let _ = self.file.unlock();
    }
}
