//! Cross-process ID generator (C12).
//!
//! Acquires an OS-level exclusive lock on a dedicated lock file, reloads
//! the counter from its on-disk snapshot, takes the next integer, advances
//! and persists it, then releases the lock. Falls back to a UUID if the
//! lock can't be acquired, so a generator race never blocks the caller.
//! IDs are always returned as strings at the interface boundary.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;

use crate::error::IdGenError;

/// Generates sequential, collision-free IDs backed by a counter file guarded
/// by an exclusive OS file lock. One instance should be shared per process;
/// the internal mutex serializes lock acquisition across tasks in-process,
/// the file lock serializes it across processes.
pub struct IdGenerator {
    lock_path: PathBuf,
    acquire: Mutex<()>,
}

impl IdGenerator {
    pub fn new(lock_path: impl Into<PathBuf>) -> Self {
        Self {
            lock_path: lock_path.into(),
            acquire: Mutex::new(()),
        }
    }

    /// Produce the next ID for `prefix` (e.g. "assessment", "batch").
    ///
    /// Returns a UUID instead of a counter value if the lock file is held
    /// by another process, rather than blocking the caller.
    pub fn next_id(&self, prefix: &str) -> String {
        let _in_process_guard = self.acquire.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match self.next_counter_value() {
            Ok(n) => format!("{prefix}-{n}"),
            Err(_) => format!("{prefix}-{}", uuid::Uuid::new_v4()),
        }
    }

    fn next_counter_value(&self) -> Result<u64, IdGenError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.lock_path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(IdGenError::LockUnavailable);
        }

        let result = (|| {
            let mut contents = String::new();
            file.seek(SeekFrom::Start(0))?;
            file.read_to_string(&mut contents)?;

            let current: u64 = contents.trim().parse().unwrap_or(0);
            let next = current + 1;

            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(next.to_string().as_bytes())?;
            file.sync_all()?;

            Ok(next)
        })();

        let _ = fs2::FileExt::unlock(&file);
        result
    }
}

pub fn default_lock_path(data_dir: &Path) -> PathBuf {
    data_dir.join("id_counter.lock")
}
