use crate::marker::{self, FileMarker, MarkerSet};
use crate::model::{ActionType, FileRecord, JudgeResult, ReasonType, StoredRecord};
use tracing::debug;

/// Dispatch on a marker token or marker directory, ignoring all hash logic.
pub fn judge_marker(
    file: &FileRecord,
    by_hash: Option<&StoredRecord>,
    by_p_hash: &[StoredRecord],
    by_name: &[StoredRecord],
) -> Option<JudgeResult> {
    let markers = marker::extract(&file.from_path);
    let primary = markers.primary()?;
    debug!("{} carries marker {:?}", file.from_path.display(), primary);

    let with_hash_match = |action: ActionType, reason: ReasonType| match by_hash {
        Some(stored) => JudgeResult::matched(action, stored.clone(), reason),
        None => JudgeResult::new(action, reason),
    };

    let result = match primary {
        FileMarker::Hold => JudgeResult::new(ActionType::Hold, ReasonType::FileMarkHold),
        FileMarker::Block => with_hash_match(ActionType::Delete, ReasonType::FileMarkBlock),
        FileMarker::Dedupe => with_hash_match(ActionType::Delete, ReasonType::FileMarkDedupe),
        FileMarker::Erase => JudgeResult::new(ActionType::Delete, ReasonType::FileMarkErase),
        FileMarker::Save => JudgeResult::new(ActionType::Save, ReasonType::FileMarkSave),
        FileMarker::Replace => targeted(
            ActionType::Replace,
            ReasonType::FileMarkReplace,
            &markers,
            by_p_hash,
            by_name,
        ),
        FileMarker::Transfer => targeted(
            ActionType::Transfer,
            ReasonType::FileMarkTransfer,
            &markers,
            by_p_hash,
            by_name,
        ),
    };
    Some(result)
}

/// Replace/transfer need a target: the numbered candidate when a hint is
/// given, else the nearest one. Without any candidate the file is held.
fn targeted(
    action: ActionType,
    reason: ReasonType,
    markers: &MarkerSet,
    by_p_hash: &[StoredRecord],
    by_name: &[StoredRecord],
) -> JudgeResult {
    let candidates = if by_p_hash.is_empty() { by_name } else { by_p_hash };
    let target = markers
        .index()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| candidates.get(i))
        .or_else(|| candidates.first());
    match target {
        Some(target) => JudgeResult::matched(action, target.clone(), reason),
        None => JudgeResult::new(ActionType::Hold, reason),
    }
}
