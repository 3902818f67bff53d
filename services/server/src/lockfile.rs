//! Single-instance advisory lock: an exclusive file lock on a well-known
//! path, holding the current process id as its contents, with stale-lock
//! reclaim when the recorded pid is dead.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sysinfo::{Pid, System};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another instance is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("opening lock file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Holds an exclusive advisory lock on a file for the lifetime of the guard.
/// Releasing happens on drop.
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Acquire the lock at `path`, creating the file if needed. Retries once
    /// after reclaiming a stale lock (a recorded pid that is no longer a
    /// live process).
    pub fn acquire(path: &Path) -> Result<LockGuard, LockError> {
        for attempt in 0..2 {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|source| LockError::Io {
                    path: path.display().to_string(),
                    source,
                })?;

            if file.try_lock_exclusive().is_ok() {
                write_pid(&mut file, std::process::id())?;
                return Ok(LockGuard {
                    file,
                    path: path.to_owned(),
                });
            }

            let recorded_pid = read_pid(&mut file);
            drop(file);

            match recorded_pid {
                Some(pid) if process_is_alive(pid) => {
                    return Err(LockError::AlreadyRunning(pid));
                }
                Some(_) | None if attempt == 0 => {
                    // Stale lock (dead pid) or an unreadable/empty file from
                    // a crashed instance: remove it and retry once.
                    let _ = std::fs::remove_file(path);
                }
                _ => {
                    return Err(LockError::AlreadyRunning(recorded_pid.unwrap_or(0)));
                }
            }
        }
        unreachable!("loop always returns within two attempts")
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

fn write_pid(file: &mut File, pid: u32) -> Result<(), LockError> {
    file.set_len(0).map_err(|source| LockError::Io {
        path: "<lockfile>".to_owned(),
        source,
    })?;
    file.seek(SeekFrom::Start(0)).map_err(|source| LockError::Io {
        path: "<lockfile>".to_owned(),
        source,
    })?;
    write!(file, "{pid}").map_err(|source| LockError::Io {
        path: "<lockfile>".to_owned(),
        source,
    })
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn process_is_alive(pid: u32) -> bool {
    let mut system = System::new_all();
    system.refresh_all();
    system.process(Pid::from_u32(pid)).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_allows_reacquisition() {
        let dir = std::env::temp_dir().join(format!("picoradar-lock-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.pid");

        {
            let _guard = LockGuard::acquire(&path).unwrap();
            assert!(LockGuard::acquire(&path).is_err());
        }

        assert!(LockGuard::acquire(&path).is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn stale_lock_with_a_dead_pid_is_reclaimed() {
        let dir =
            std::env::temp_dir().join(format!("picoradar-lock-stale-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stale.pid");

        // A pid astronomically unlikely to be alive, written without ever
        // taking the advisory lock, simulating a crash that left the file
        // behind but never held the flock.
        std::fs::write(&path, "999999").unwrap();

        let guard = LockGuard::acquire(&path);
        assert!(guard.is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }
}
