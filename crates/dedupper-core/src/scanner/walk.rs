use dashmap::DashSet;
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::error;

/// Directory traversal options.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub ignore_globs: Vec<String>,
    /// Directories never entered, such as the store directory.
    pub skip_dirs: Vec<PathBuf>,
}

/// Collect every regular file below `root`, or `root` itself when it is a
/// file. Skips symlinks, 0-byte files and paths matching an ignore glob.
/// The result is sorted so runs are reproducible.
pub fn collect_files(root: &Path, options: &WalkOptions) -> io::Result<Vec<PathBuf>> {
    let ignore_patterns: Vec<Pattern> = options
        .ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();
    let skip_dirs: Vec<PathBuf> = options
        .skip_dirs
        .iter()
        .map(|d| fs::canonicalize(d).unwrap_or_else(|_| d.clone()))
        .collect();
    let walker = Walker {
        ignore_patterns,
        skip_dirs,
        files: DashSet::new(),
    };

    let metadata = fs::symlink_metadata(root)?;
    if metadata.is_file() {
        walker.add_file(root, metadata.len());
    } else if metadata.is_dir() {
        walker.visit_dirs(root)?;
    }

    let mut files: Vec<PathBuf> = walker.files.into_iter().collect();
    files.sort();
    Ok(files)
}

struct Walker {
    ignore_patterns: Vec<Pattern>,
    skip_dirs: Vec<PathBuf>,
    files: DashSet<PathBuf>,
}

impl Walker {
    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    fn is_skipped_dir(&self, dir: &Path) -> bool {
        let canonical = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        self.skip_dirs.iter().any(|skip| canonical == *skip)
    }

    fn add_file(&self, path: &Path, len: u64) {
        if len > 0 && !self.is_ignored(path) {
            self.files.insert(path.to_path_buf());
        }
    }

    fn visit_dirs(&self, dir: &Path) -> io::Result<()> {
        if self.is_ignored(dir) || self.is_skipped_dir(dir) {
            return Ok(());
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                if err.kind() == io::ErrorKind::PermissionDenied {
                    error!(
                        "Access denied reading directory {}: {}",
                        dir.display(),
                        err
                    );
                    return Ok(());
                } else {
                    return Err(io::Error::new(
                        err.kind(),
                        format!("Error reading directory {}: {}", dir.display(), err),
                    ));
                }
            }
        };

        entries.par_bridge().try_for_each(|entry_result| {
            let entry = entry_result.map_err(|err| {
                io::Error::new(
                    err.kind(),
                    format!(
                        "Error reading entry in directory {}: {}",
                        dir.display(),
                        err
                    ),
                )
            })?;

            let path = entry.path();
            let metadata = fs::symlink_metadata(&path).map_err(|err| {
                io::Error::new(
                    err.kind(),
                    format!("Error getting metadata for {}: {}", path.display(), err),
                )
            })?;

            if metadata.file_type().is_symlink() {
                return Ok(());
            }
            if metadata.is_dir() {
                self.visit_dirs(&path)?;
            } else if metadata.is_file() {
                self.add_file(&path, metadata.len());
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_skips_db_and_ignored() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("db")).unwrap();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("db/image.sqlite3"), b"db").unwrap();
        fs::write(root.join("a/one.jpg"), b"1").unwrap();
        fs::write(root.join("a/b/two.jpg"), b"2").unwrap();
        fs::write(root.join("a/b/skip.tmp"), b"3").unwrap();
        fs::write(root.join("a/empty.jpg"), b"").unwrap();

        let options = WalkOptions {
            ignore_globs: vec!["**/*.tmp".to_string()],
            skip_dirs: vec![root.join("db")],
        };
        let files = collect_files(root, &options).unwrap();
        assert_eq!(files, vec![root.join("a/b/two.jpg"), root.join("a/one.jpg")]);
    }

    #[test]
    fn test_single_file_root() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("x.jpg");
        fs::write(&file, b"x").unwrap();
        let files = collect_files(&file, &WalkOptions::default()).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("x.jpg");
        fs::write(&file, b"x").unwrap();
        std::os::unix::fs::symlink(&file, tmp.path().join("link.jpg")).unwrap();
        let files = collect_files(tmp.path(), &WalkOptions::default()).unwrap();
        assert_eq!(files, vec![file]);
    }
}
