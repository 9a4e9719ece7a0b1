//! Interfaces of the external collaborators the engine depends on.
//!
//! Media probing, perceptual hashing, acceptability classification and image
//! statistics live outside this crate. Calls are blocking and are made from
//! worker threads.

use crate::error::{Error, Result};
use crate::model::{ClassifyType, FileRecord};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Raw facts about a file's content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentInfo {
    pub hash: String,
    pub width: u32,
    pub height: u32,
    pub damaged: bool,
    /// Capture time in epoch milliseconds, when the inspector knows it.
    pub timestamp: Option<i64>,
}

impl ContentInfo {
    pub fn ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerceptualHashes {
    pub p_hash: String,
    pub d_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentStatistic {
    pub entropy: f64,
    pub quality: f64,
    pub mean: f64,
}

pub trait ContentInspector: Send + Sync {
    fn read_info(&self, path: &Path, file_type: ClassifyType) -> Result<ContentInfo>;

    /// `None` when the file has no perceptual hash (non-image, unreadable).
    fn calculate_perceptual_hash(&self, path: &Path) -> Result<Option<PerceptualHashes>>;
}

pub trait AcceptabilityClassifier: Send + Sync {
    fn is_acceptable(&self, record: &FileRecord) -> Result<bool>;
}

pub trait StatisticComparator: Send + Sync {
    fn statistic(&self, path: &Path) -> Result<ContentStatistic>;
}

/// Accepts everything.
pub struct AcceptAll;

impl AcceptabilityClassifier for AcceptAll {
    fn is_acceptable(&self, _record: &FileRecord) -> Result<bool> {
        Ok(true)
    }
}

/// Has no statistics; every comparison is treated as "no rejection signal".
pub struct NoStatistics;

impl StatisticComparator for NoStatistics {
    fn statistic(&self, path: &Path) -> Result<ContentStatistic> {
        Err(Error::Collaborator(format!(
            "no statistic comparator for {}",
            path.display()
        )))
    }
}

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Content hash only: blake3 of the full file. Dimensions are unknown and no
/// perceptual hash is produced.
pub struct BasicInspector;

impl BasicInspector {
    pub fn hash_file(path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

impl ContentInspector for BasicInspector {
    fn read_info(&self, path: &Path, _file_type: ClassifyType) -> Result<ContentInfo> {
        let hash = Self::hash_file(path)?;
        let timestamp = path
            .metadata()?
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64);
        Ok(ContentInfo {
            hash,
            timestamp,
            ..ContentInfo::default()
        })
    }

    fn calculate_perceptual_hash(&self, _path: &Path) -> Result<Option<PerceptualHashes>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_basic_inspector_hashes_content() {
        let tmp = tempdir().unwrap();
        let a = tmp.path().join("a.bin");
        let b = tmp.path().join("b.bin");
        fs::write(&a, b"same content").unwrap();
        fs::write(&b, b"same content").unwrap();
        let info_a = BasicInspector.read_info(&a, ClassifyType::Unknown).unwrap();
        let info_b = BasicInspector.read_info(&b, ClassifyType::Unknown).unwrap();
        assert_eq!(info_a.hash, info_b.hash);
        assert_eq!(info_a.hash.len(), 64);
        assert!(info_a.timestamp.is_some());
    }

    #[test]
    fn test_ratio_of_unknown_size_is_zero() {
        assert_eq!(ContentInfo::default().ratio(), 0.0);
        let info = ContentInfo {
            width: 300,
            height: 200,
            ..ContentInfo::default()
        };
        assert!((info.ratio() - 1.5).abs() < f64::EPSILON);
    }
}
