//! Lock files guarding a log.
//!
//! Two lock files live next to the log directory:
//!
//! - `~<stem>.writer.lock`: held by the single writer for as long as it
//!   appends. A second writer fails immediately with [`StorageError::Busy`].
//! - `~<stem>.lock`: held around every flush and every read. Acquirers retry
//!   with exponential backoff and give up with [`StorageError::Timeout`].
//!
//! Both are created with `create_new`, so acquisition is atomic on the
//! filesystem. A lock file is removed when its guard is dropped.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::layout::lock_path;

const WRITER_SUFFIX: &str = ".writer.lock";
const ACCESS_SUFFIX: &str = ".lock";

/// Create `path` exclusively. `Ok(None)` when it already exists.
fn try_create(path: &Path) -> Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            // The owner's pid helps when cleaning up after a crash.
            writeln!(file, "{}", std::process::id())?;
            Ok(Some(file))
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn release(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(lock = %path.display(), error = %e, "failed to remove lock file");
    } else {
        debug!(lock = %path.display(), "released lock");
    }
}

/// Exclusive writer ownership of a log.
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    /// Take writer ownership of the log at `target`, failing fast if taken.
    pub fn acquire(target: &Path) -> Result<Self> {
        let path = lock_path(target, WRITER_SUFFIX);
        match try_create(&path)? {
            Some(_) => {
                debug!(lock = %path.display(), "acquired writer lock");
                Ok(Self { path })
            }
            None => Err(StorageError::Busy(target.to_path_buf())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        release(&self.path);
    }
}

/// Short-lived access to a log for one flush or one read.
#[derive(Debug)]
pub struct AccessLock {
    path: PathBuf,
}

impl AccessLock {
    /// Wait for access to the log at `target`, with bounded backoff.
    pub fn acquire(target: &Path, config: &StorageConfig) -> Result<Self> {
        let path = lock_path(target, ACCESS_SUFFIX);
        let start = Instant::now();
        let mut delay = config.retry_delay;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if try_create(&path)?.is_some() {
                if attempts > 1 {
                    debug!(lock = %path.display(), attempts, "acquired access lock after waiting");
                }
                return Ok(Self { path });
            }

            let waited = start.elapsed();
            if waited >= config.file_timeout {
                warn!(lock = %path.display(), attempts, "gave up waiting for access lock");
                return Err(StorageError::Timeout {
                    path: target.to_path_buf(),
                    waited,
                });
            }
            thread::sleep(delay.min(config.file_timeout - waited));
            delay = (delay * 2).min(config.max_retry_delay);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AccessLock {
    fn drop(&mut self) {
        release(&self.path);
    }
}
