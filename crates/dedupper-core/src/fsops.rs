use crate::config::{AppConfig, DeleteMode, FsConfig};
use crate::error::{Error, Result};
use crate::platform;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Filesystem mutations with retry on busy files. In dry-run mode every
/// operation is logged and skipped.
#[derive(Debug, Clone)]
pub struct FileOps {
    fs: FsConfig,
    delete_mode: DeleteMode,
    quarantine_path: PathBuf,
    dry_run: bool,
}

impl FileOps {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            fs: config.fs.clone(),
            delete_mode: config.delete_mode,
            quarantine_path: config.quarantine_path.clone(),
            dry_run: config.dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run `op`, retrying while it fails with a busy error. Only the first
    /// retry is logged.
    fn retry_busy<T>(&self, what: &str, path: &Path, mut op: impl FnMut() -> io::Result<T>) -> Result<T> {
        let mut attempts = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if platform::is_busy_error(&e) && attempts < self.fs.busy_retries => {
                    if attempts == 0 {
                        warn!("{} busy, retrying: {}", what, path.display());
                    }
                    attempts += 1;
                    thread::sleep(Duration::from_millis(self.fs.busy_delay_ms));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn create_dir_all(&self, dir: &Path) -> Result<()> {
        if self.dry_run {
            debug!("[dry-run] mkdir {}", dir.display());
            return Ok(());
        }
        fs::create_dir_all(dir)?;
        Ok(())
    }

    /// Rename `from` to `to`, creating parent directories. Falls back to copy
    /// and remove across filesystems.
    pub fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        if self.dry_run {
            info!("[dry-run] move {} -> {}", from.display(), to.display());
            return Ok(());
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        let renamed = self.retry_busy("rename", from, || match fs::rename(from, to) {
            Ok(()) => Ok(true),
            Err(e) if platform::is_cross_device_error(&e) => Ok(false),
            Err(e) => Err(e),
        })?;
        if !renamed {
            debug!("cross-device move {} -> {}", from.display(), to.display());
            fs::copy(from, to)?;
            self.retry_busy("remove", from, || fs::remove_file(from))?;
        }
        debug!("moved {} -> {}", from.display(), to.display());
        Ok(())
    }

    /// Delete according to the configured mode, or unconditionally erase.
    pub fn delete(&self, path: &Path, erase: bool) -> Result<()> {
        if self.dry_run {
            info!("[dry-run] delete {}", path.display());
            return Ok(());
        }
        if !path.exists() && fs::symlink_metadata(path).is_err() {
            debug!("already gone: {}", path.display());
            return Ok(());
        }
        let mode = if erase { DeleteMode::Erase } else { self.delete_mode };
        match mode {
            DeleteMode::Erase => self.retry_busy("remove", path, || fs::remove_file(path))?,
            DeleteMode::Trash => trash::delete(path)
                .map_err(|e| Error::Other(format!("trash error for {}: {}", path.display(), e)))?,
            DeleteMode::Quarantine => {
                let name = path
                    .file_name()
                    .ok_or_else(|| Error::Other(format!("no file name: {}", path.display())))?;
                let dest = unique_destination(&self.quarantine_path.join(name));
                self.move_file(path, &dest)?;
            }
        }
        if !self.wait_until_gone(path) {
            warn!("still present after delete: {}", path.display());
        }
        Ok(())
    }

    /// Poll a bounded number of times until `path` no longer exists.
    pub fn wait_until_gone(&self, path: &Path) -> bool {
        for _ in 0..=self.fs.gone_poll_retries {
            if fs::symlink_metadata(path).is_err() {
                return true;
            }
            thread::sleep(Duration::from_millis(self.fs.busy_delay_ms));
        }
        false
    }

    pub fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        if self.dry_run {
            debug!("[dry-run] symlink {} -> {}", link.display(), target.display());
            return Ok(());
        }
        if fs::symlink_metadata(link).is_ok() {
            fs::remove_file(link)?;
        }
        platform::symlink_file(target, link)?;
        Ok(())
    }
}

/// `path` itself if free, else `<stem>_<n><ext>` for the first free `n`.
pub fn unique_destination(path: &Path) -> PathBuf {
    if fs::symlink_metadata(path).is_err() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    (1..)
        .map(|n| parent.join(format!("{}_{}{}", stem, n, ext)))
        .find(|candidate| fs::symlink_metadata(candidate).is_err())
        .unwrap_or_else(|| path.to_path_buf())
}
