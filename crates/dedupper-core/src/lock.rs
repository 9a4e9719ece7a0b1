//! Lock coordination.
//!
//! - [`KeyLocks`]: process-local exclusive keys (content hash, destination path),
//!   polled at a fixed interval with a bounded number of attempts.
//! - [`FileLock`]: an OS file lock on a lock file shared by independent
//!   processes. Waits indefinitely; a holder record older than the stale
//!   duration is reclaimed.
//! - [`LockCoordinator`]: both of the above plus the global write lock.

use crate::classify::LOCK_SUFFIX;
use crate::config::LockConfig;
use crate::error::{Error, Result};
use dashmap::DashSet;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone)]
pub struct KeyLocks {
    held: Arc<DashSet<String>>,
    poll_interval: Duration,
    max_retries: u32,
    force: bool,
}

/// Releases its key on drop. A forced guard never owned the key.
#[derive(Debug)]
pub struct KeyGuard {
    held: Arc<DashSet<String>>,
    key: String,
    exclusive: bool,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        if self.exclusive {
            self.held.remove(&self.key);
            trace!("Released key lock {}", self.key);
        }
    }
}

impl KeyLocks {
    pub fn new(config: &LockConfig) -> Self {
        Self {
            held: Arc::new(DashSet::new()),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_retries: config.max_retries,
            force: config.force,
        }
    }

    pub fn try_acquire(&self, key: &str) -> Option<KeyGuard> {
        if self.held.insert(key.to_string()) {
            trace!("Acquired key lock {}", key);
            Some(KeyGuard {
                held: Arc::clone(&self.held),
                key: key.to_string(),
                exclusive: true,
            })
        } else {
            None
        }
    }

    /// Poll until `key` is free. Fails after `max_retries` attempts unless
    /// `force` is set, in which case the caller proceeds without exclusivity.
    pub fn acquire(&self, key: &str) -> Result<KeyGuard> {
        let mut attempts = 0u32;
        loop {
            if let Some(guard) = self.try_acquire(key) {
                return Ok(guard);
            }
            attempts += 1;
            if attempts > self.max_retries {
                if self.force {
                    warn!("Forcing key lock {} after {} attempts", key, attempts);
                    return Ok(KeyGuard {
                        held: Arc::clone(&self.held),
                        key: key.to_string(),
                        exclusive: false,
                    });
                }
                return Err(Error::LockTimeout {
                    key: key.to_string(),
                    attempts,
                });
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Acquire several keys in a stable order. Empty keys are skipped.
    pub fn acquire_many(&self, keys: &[String]) -> Result<Vec<KeyGuard>> {
        let mut sorted: Vec<&String> = keys.iter().filter(|k| !k.is_empty()).collect();
        sorted.sort();
        sorted.dedup();
        let mut guards = Vec::with_capacity(sorted.len());
        for key in sorted {
            guards.push(self.acquire(key)?);
        }
        Ok(guards)
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains(key)
    }
}

#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    poll_interval: Duration,
    stale: Duration,
}

/// Holds the OS lock on the lock file. Dropping it clears the holder record
/// and unlocks; the file itself stays in place.
#[derive(Debug)]
pub struct FileLockGuard {
    path: PathBuf,
    file: File,
}

impl FileLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.set_len(0) {
            warn!("Failed to clear file lock {}: {}", self.path.display(), e);
        }
        match FileExt::unlock(&self.file) {
            Ok(()) => trace!("Released file lock {}", self.path.display()),
            Err(e) => warn!("Failed to release file lock {}: {}", self.path.display(), e),
        }
    }
}

impl FileLock {
    pub fn new(path: PathBuf, config: &LockConfig) -> Self {
        Self {
            path,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            stale: Duration::from_millis(config.stale_ms),
        }
    }

    /// Lock file for a named resource under `dir`, e.g. `<dir>/process.dplock`.
    pub fn named(dir: &Path, name: &str, config: &LockConfig) -> Self {
        Self::new(dir.join(format!("{}.{}", name, LOCK_SUFFIX)), config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
    }

    /// Take the lock without waiting. A holder whose record is older than the
    /// stale duration is abandoned: its file is unlinked and a fresh one locked.
    pub fn try_acquire(&self) -> Result<Option<FileLockGuard>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        for _ in 0..2 {
            let file = self.open()?;
            if try_lock(&file)? {
                // A reclaim may have replaced the file between open and lock.
                if is_current(&file, &self.path)? {
                    return self.claim(file).map(Some);
                }
                continue;
            }
            if !is_stale(&self.path, self.stale) {
                return Ok(None);
            }
            warn!("Reclaiming stale file lock {}", self.path.display());
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Wait until the lock is ours.
    pub fn acquire(&self) -> Result<FileLockGuard> {
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Record this process as the holder. A leftover record means the last
    /// holder exited without releasing.
    fn claim(&self, mut file: File) -> Result<FileLockGuard> {
        let mut previous = String::new();
        file.read_to_string(&mut previous)?;
        if let Some(pid) = previous.lines().next().filter(|l| !l.trim().is_empty()) {
            warn!(
                "Reclaiming file lock {} left by process {}",
                self.path.display(),
                pid
            );
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}\n{}", std::process::id(), now)?;
        file.flush()?;
        debug!("Acquired file lock {}", self.path.display());
        Ok(FileLockGuard {
            path: self.path.clone(),
            file,
        })
    }
}

fn try_lock(file: &File) -> io::Result<bool> {
    match FileExt::try_lock_exclusive(file) {
        Ok(()) => Ok(true),
        Err(e)
            if e.kind() == io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
        {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Whether `path` still names the file behind `file`.
#[cfg(unix)]
fn is_current(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let locked = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(current.dev() == locked.dev() && current.ino() == locked.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn is_current(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

/// A lock file is stale once its modification time is older than `stale`.
pub fn is_stale(path: &Path, stale: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age > stale)
        .unwrap_or(false)
}

/// Held across the mutating tail of one file's processing.
pub struct WriteGuard<'a> {
    _file: FileLockGuard,
    _local: MutexGuard<'a, ()>,
}

pub struct LockCoordinator {
    keys: KeyLocks,
    write: Mutex<()>,
    process_lock: FileLock,
}

impl LockCoordinator {
    pub fn new(db_base_path: &Path, config: &LockConfig) -> Self {
        Self {
            keys: KeyLocks::new(config),
            write: Mutex::new(()),
            process_lock: FileLock::named(db_base_path, "process", config),
        }
    }

    pub fn keys(&self) -> &KeyLocks {
        &self.keys
    }

    /// Read locks for one file: its content hash and its destination path.
    pub fn lock_file(&self, hash: &str, to_path: &Path) -> Result<Vec<KeyGuard>> {
        let mut keys = Vec::with_capacity(2);
        if !hash.is_empty() {
            keys.push(format!("hash:{}", hash));
        }
        if !to_path.as_os_str().is_empty() {
            keys.push(format!("path:{}", to_path.display()));
        }
        self.keys.acquire_many(&keys)
    }

    /// Global write lock: in-process first, then the cross-process lock file.
    pub fn lock_write(&self) -> Result<WriteGuard<'_>> {
        let local = self.write.lock().unwrap_or_else(|e| e.into_inner());
        let file = self.process_lock.acquire()?;
        Ok(WriteGuard {
            _file: file,
            _local: local,
        })
    }
}
