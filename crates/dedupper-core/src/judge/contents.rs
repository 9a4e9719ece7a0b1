use super::RejectDetector;
use crate::config::QualityConfig;
use crate::model::{ClassifyType, FileRecord, ReasonType};

/// Damage and minimum-quality rejection. Checks run in order: damaged, file
/// size, resolution, long side. Unknown dimensions skip the pixel checks.
pub struct ContentsPolicy {
    image: QualityConfig,
    video: QualityConfig,
}

impl ContentsPolicy {
    pub fn new(image: QualityConfig, video: QualityConfig) -> Self {
        Self { image, video }
    }

    fn quality(&self, file_type: ClassifyType) -> Option<&QualityConfig> {
        match file_type {
            ClassifyType::Image => Some(&self.image),
            ClassifyType::Video => Some(&self.video),
            _ => None,
        }
    }
}

impl RejectDetector for ContentsPolicy {
    fn detect(&self, file: &FileRecord) -> Option<ReasonType> {
        if file.damaged {
            return Some(ReasonType::Damaged);
        }
        let quality = self.quality(file.file_type)?;
        if quality.min_file_size > 0 && file.size < quality.min_file_size {
            return Some(ReasonType::LowFileSize);
        }
        if quality.min_resolution > 0 && file.pixels() > 0 && file.pixels() < quality.min_resolution {
            return Some(ReasonType::LowResolution);
        }
        if quality.min_long_side > 0 && file.long_side() > 0 && file.long_side() < quality.min_long_side
        {
            return Some(ReasonType::LowLongSide);
        }
        None
    }
}
