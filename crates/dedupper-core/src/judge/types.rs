use crate::classify::sidecar_target;
use crate::model::{ActionType, ClassifyType, FileRecord, JudgeResult, ReasonType};

/// Decisions for types that never reach the hash stages.
pub fn judge_special_type(file: &FileRecord) -> Option<JudgeResult> {
    match file.file_type {
        ClassifyType::Unknown => Some(JudgeResult::new(
            ActionType::Hold,
            ReasonType::UnknownFileType,
        )),
        ClassifyType::Scrap => Some(JudgeResult::new(
            ActionType::Delete,
            ReasonType::ScrapFileType,
        )),
        ClassifyType::DedupperCache => {
            if sidecar_target(&file.from_path).exists() {
                Some(JudgeResult::new(
                    ActionType::Hold,
                    ReasonType::KeepDedupperFile,
                ))
            } else {
                Some(JudgeResult::new(
                    ActionType::Delete,
                    ReasonType::SweepDedupperFile,
                ))
            }
        }
        ClassifyType::DedupperLock => Some(JudgeResult::new(
            ActionType::Delete,
            ReasonType::SweepDedupperFile,
        )),
        ClassifyType::Image | ClassifyType::Video => None,
    }
}
