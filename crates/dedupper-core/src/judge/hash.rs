use crate::model::{ActionType, FileRecord, FileState, JudgeResult, ReasonType, StoredRecord};

/// Exact content hash hit.
pub fn judge_hash_match(
    file: &FileRecord,
    stored: &StoredRecord,
    transfer: bool,
    recovery: bool,
) -> JudgeResult {
    if transfer && stored.state == FileState::Accepted && file.state.is_keeping() {
        return JudgeResult::matched(
            ActionType::Transfer,
            stored.clone(),
            ReasonType::HashMatchTransfer,
        );
    }
    if recovery && stored.state.is_accepted() && !stored.to_path.exists() {
        return JudgeResult::matched(
            ActionType::Save,
            stored.clone(),
            ReasonType::HashMatchRecovery,
        );
    }
    JudgeResult::matched(ActionType::Delete, stored.clone(), ReasonType::HashMatch)
}
