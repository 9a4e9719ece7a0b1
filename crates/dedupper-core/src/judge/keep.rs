use crate::model::{ActionType, FileState, ReasonType};

/// Retarget a REPLACE/DELETE decision when either side is in the keeping state.
///
/// | incoming \ matched | not keeping       | keeping          |
/// |--------------------|-------------------|------------------|
/// | not keeping        | unchanged         | REPLACE → SAVE   |
/// | keeping            | → TRANSFER        | → SAVE           |
///
/// Without `transfer` the keeping/not-keeping cell falls back to SAVE.
pub fn retarget(
    action: ActionType,
    reason: ReasonType,
    incoming: FileState,
    matched: FileState,
    transfer: bool,
) -> (ActionType, ReasonType) {
    if !matches!(action, ActionType::Replace | ActionType::Delete) {
        return (action, reason);
    }
    match (incoming.is_keeping(), matched.is_keeping()) {
        (false, false) => (action, reason),
        (false, true) => match action {
            ActionType::Replace => (ActionType::Save, ReasonType::PHashMatchKeeping),
            _ => (action, reason),
        },
        (true, false) if transfer => (ActionType::Transfer, ReasonType::PHashMatchTransfer),
        (true, _) => (ActionType::Save, ReasonType::PHashMatchKeeping),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: FileState = FileState::Accepted;
    const K: FileState = FileState::Keeping;

    #[test]
    fn test_matrix() {
        let r = ReasonType::PHashMatch;
        assert_eq!(
            retarget(ActionType::Replace, r, A, A, true),
            (ActionType::Replace, r)
        );
        assert_eq!(
            retarget(ActionType::Replace, r, A, K, true),
            (ActionType::Save, ReasonType::PHashMatchKeeping)
        );
        assert_eq!(
            retarget(ActionType::Delete, ReasonType::PHashRejectNewer, A, K, true),
            (ActionType::Delete, ReasonType::PHashRejectNewer)
        );
        assert_eq!(
            retarget(ActionType::Delete, ReasonType::PHashRejectNewer, K, A, true),
            (ActionType::Transfer, ReasonType::PHashMatchTransfer)
        );
        assert_eq!(
            retarget(ActionType::Replace, r, K, A, false),
            (ActionType::Save, ReasonType::PHashMatchKeeping)
        );
        assert_eq!(
            retarget(ActionType::Delete, r, K, K, true),
            (ActionType::Save, ReasonType::PHashMatchKeeping)
        );
    }

    #[test]
    fn test_other_actions_untouched() {
        assert_eq!(
            retarget(ActionType::Hold, ReasonType::PHashMayBe, FileState::Keeping, FileState::Accepted, true),
            (ActionType::Hold, ReasonType::PHashMayBe)
        );
    }
}
