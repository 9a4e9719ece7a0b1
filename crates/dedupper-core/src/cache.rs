use crate::classify::{sidecar_path, CACHE_SUFFIX};
use crate::error::Result;
use crate::model::FileRecord;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{trace, warn};

/// Per-file metadata cache kept in a `<path>.dpcache` JSON sidecar.
///
/// An entry is only valid for the path it was written for and the size the
/// file had at that time; anything else is a miss.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    enabled: bool,
}

impl MetadataCache {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn load(&self, path: &Path, size: u64) -> Result<Option<FileRecord>> {
        if !self.enabled {
            return Ok(None);
        }
        let sidecar = sidecar_path(path, CACHE_SUFFIX);
        let text = match fs::read_to_string(&sidecar) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: FileRecord = match serde_json::from_str(&text) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring unreadable cache {}: {}", sidecar.display(), e);
                return Ok(None);
            }
        };
        if record.from_path != path || record.size != size {
            trace!("Cache for {} is stale", path.display());
            return Ok(None);
        }
        trace!("Cache hit for {}", path.display());
        Ok(Some(record))
    }

    pub fn store(&self, record: &FileRecord) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let sidecar = sidecar_path(&record.from_path, CACHE_SUFFIX);
        fs::write(&sidecar, serde_json::to_string(record)?)?;
        Ok(())
    }

    /// Remove the sidecar of `path`, if any.
    pub fn clean(&self, path: &Path) -> Result<()> {
        let sidecar = sidecar_path(path, CACHE_SUFFIX);
        match fs::remove_file(&sidecar) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassifyType, FileState};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn record(path: PathBuf) -> FileRecord {
        FileRecord {
            hash: "abc".to_string(),
            p_hash: None,
            d_hash: None,
            width: 10,
            height: 20,
            ratio: 0.5,
            damaged: false,
            size: 42,
            timestamp: 0,
            name: "a.jpg".to_string(),
            from_path: path,
            to_path: PathBuf::new(),
            file_type: ClassifyType::Image,
            state: FileState::Accepted,
        }
    }

    #[test]
    fn test_store_and_load() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("a.jpg");
        let cache = MetadataCache::new(true);
        cache.store(&record(path.clone())).unwrap();
        let loaded = cache.load(&path, 42).unwrap().unwrap();
        assert_eq!(loaded.hash, "abc");
    }

    #[test]
    fn test_invalidated_by_path_and_size() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("a.jpg");
        let cache = MetadataCache::new(true);
        cache.store(&record(path.clone())).unwrap();
        assert!(cache.load(&path, 43).unwrap().is_none());

        let moved = tmp.path().join("b.jpg");
        fs::rename(sidecar_path(&path, CACHE_SUFFIX), sidecar_path(&moved, CACHE_SUFFIX)).unwrap();
        assert!(cache.load(&moved, 42).unwrap().is_none());
    }

    #[test]
    fn test_clean_is_idempotent() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("a.jpg");
        let cache = MetadataCache::new(true);
        cache.store(&record(path.clone())).unwrap();
        cache.clean(&path).unwrap();
        cache.clean(&path).unwrap();
        assert!(cache.load(&path, 42).unwrap().is_none());
    }
}
