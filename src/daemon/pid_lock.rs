//! Single-instance lock: a PID file held under an advisory exclusive lock for as long as the
//! daemon runs.
//!
//! A PID file whose lock nobody holds is left over from a daemon that died and is ignored.

use crate::error_handling::types::LockError;
use fs2::FileExt;
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// A daemon found through its PID file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningDaemon {
    pub pid: i32,
    pub path: PathBuf,
}

/// The lock held by the running daemon. Released on drop, [`PidLock::release`] also removes the
/// file.
#[derive(Debug)]
pub struct PidLock {
    file: File,
    path: PathBuf,
}

impl PidLock {
    /// Locks the first usable candidate and writes `pid` into it.
    ///
    /// Candidates that cannot be opened are skipped.
    ///
    /// # Errors
    ///
    /// * `LockError::AlreadyLocked` if a candidate is locked by another process
    /// * `LockError::WriteFailed` if the PID cannot be written
    /// * `LockError::NoUsablePath` if no candidate could be opened
    pub fn acquire(candidates: &[PathBuf], pid: i32) -> Result<Self, LockError> {
        for path in candidates {
            let mut file = match OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .mode(0o644)
                .open(path)
            {
                Ok(file) => file,
                Err(e) => {
                    debug!("Cannot open PID file {}: {}", path.display(), e);
                    continue;
                }
            };

            if file.try_lock_exclusive().is_err() {
                return Err(LockError::AlreadyLocked(path.clone()));
            }

            if let Err(e) = write_pid(&mut file, pid) {
                let _ = file.unlock();
                return Err(LockError::WriteFailed(path.clone(), e));
            }

            debug!("PID {} written to {}", pid, path.display());
            return Ok(Self {
                file,
                path: path.clone(),
            });
        }
        Err(LockError::NoUsablePath)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlocks and deletes the PID file.
    pub fn release(self) -> Result<(), LockError> {
        let _ = self.file.unlock();
        remove(&self.path)
    }

    /// The daemon currently holding the lock on one of `candidates`, if any.
    pub fn find(candidates: &[PathBuf]) -> Result<Option<RunningDaemon>, LockError> {
        for path in candidates {
            let mut file = match File::open(path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    debug!("Cannot open PID file {}: {}", path.display(), e);
                    continue;
                }
            };

            if file.try_lock_exclusive().is_ok() {
                debug!("Stale PID file {}", path.display());
                let _ = file.unlock();
                continue;
            }

            let mut text = String::new();
            file.read_to_string(&mut text)
                .map_err(|e| LockError::ReadFailed(path.clone(), e))?;
            match text.trim().parse::<i32>() {
                Ok(pid) if pid > 0 => {
                    return Ok(Some(RunningDaemon {
                        pid,
                        path: path.clone(),
                    }))
                }
                _ => warn!(
                    "PID file {} is locked but holds no PID: {:?}",
                    path.display(),
                    text.trim()
                ),
            }
        }
        Ok(None)
    }
}

fn write_pid(file: &mut File, pid: i32) -> io::Result<()> {
    file.set_len(0)?;
    file.write_all(format!("{}\n", pid).as_bytes())?;
    file.flush()
}

/// Deletes a PID file. A file that is already gone is fine.
pub fn remove(path: &Path) -> Result<(), LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LockError::RemoveFailed(path.to_path_buf(), e)),
    }
}
