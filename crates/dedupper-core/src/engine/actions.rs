//! Execution of a judgment against the filesystem and the store.
//!
//! Runs under the global write lock. Store rows are updated before the file
//! they describe is moved or removed.

use super::ProcessContext;
use crate::classify::library_destination;
use crate::error::{Error, Result};
use crate::fsops::unique_destination;
use crate::marker::{self, FileMarker, MarkerSet};
use crate::model::{ActionType, FileRecord, FileState, JudgeResult, ReasonType, StoredRecord};
use crate::storage::validate_record;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Whether executing `result` writes `file` into the store.
pub fn needs_perceptual_hash(file: &FileRecord, result: &JudgeResult) -> bool {
    if !file.file_type.uses_perceptual_hash() {
        return false;
    }
    match result.action {
        ActionType::Save | ActionType::Replace | ActionType::Transfer => true,
        ActionType::Delete => result.reason.tombstone_state().is_some(),
        ActionType::Hold | ActionType::Relocate => false,
    }
}

pub fn execute(ctx: &ProcessContext, file: &FileRecord, result: &JudgeResult) -> Result<()> {
    match result.action {
        ActionType::Delete => delete(ctx, file, result.reason),
        ActionType::Save => save(ctx, file, result),
        ActionType::Replace => replace(ctx, file, required_match(file, result)?),
        ActionType::Transfer => transfer(ctx, file, required_match(file, result)?),
        ActionType::Relocate => relocate(ctx, file, required_match(file, result)?),
        ActionType::Hold => hold(ctx, file, result),
    }
}

fn required_match<'a>(file: &FileRecord, result: &'a JudgeResult) -> Result<&'a StoredRecord> {
    result.matched.as_ref().ok_or_else(|| {
        Error::Other(format!(
            "{} for {} has no matched record",
            result.action,
            file.from_path.display()
        ))
    })
}

fn delete(ctx: &ProcessContext, file: &FileRecord, reason: ReasonType) -> Result<()> {
    if let Some(state) = reason.tombstone_state() {
        if !file.file_type.is_forgettable() {
            ctx.store.with_database(file.file_type, |db| {
                if db.query_by_hash(&file.hash)?.is_some() {
                    db.update_state(&file.hash, state)?;
                } else {
                    let mut tombstone = file.clone();
                    tombstone.state = state;
                    db.insert(&tombstone, false)?;
                }
                Ok(())
            })?;
            debug!("Tombstoned {} as {:?}", file.hash, state);
        }
    }
    info!("DELETE {} ({})", file.from_path.display(), reason);
    ctx.fs
        .delete(&file.from_path, reason == ReasonType::FileMarkErase)
}

/// Destination inside the library. Manual mode never renames, so an occupied
/// destination is an error there. `freed` is a path about to be vacated.
fn resolve_destination(
    ctx: &ProcessContext,
    file: &FileRecord,
    wanted: PathBuf,
    freed: Option<&Path>,
) -> Result<PathBuf> {
    if wanted == file.from_path
        || freed == Some(wanted.as_path())
        || fs::symlink_metadata(&wanted).is_err()
    {
        return Ok(wanted);
    }
    if ctx.config.manual {
        return Err(Error::DestinationOccupied(wanted.display().to_string()));
    }
    Ok(unique_destination(&wanted))
}

/// Insert `file` at `dest`, then move it there.
fn store_and_move(ctx: &ProcessContext, file: &FileRecord, dest: &Path) -> Result<()> {
    let mut stored = file.clone();
    stored.to_path = dest.to_path_buf();
    ctx.store
        .with_database(file.file_type, |db| db.insert(&stored, true))?;
    if dest != file.from_path {
        ctx.fs.move_file(&file.from_path, dest)?;
    }
    ctx.report.record_saved(dest);
    Ok(())
}

fn save(ctx: &ProcessContext, file: &FileRecord, result: &JudgeResult) -> Result<()> {
    let wanted = match (&result.matched, result.reason) {
        (Some(matched), ReasonType::HashMatchRecovery) => matched.to_path.clone(),
        _ => file.to_path.clone(),
    };
    let dest = resolve_destination(ctx, file, wanted, None)?;
    info!("SAVE {} -> {} ({})", file.from_path.display(), dest.display(), result.reason);
    store_and_move(ctx, file, &dest)
}

/// The new file takes the old occupant's slot, keeping its own extension.
fn replace(ctx: &ProcessContext, file: &FileRecord, old: &StoredRecord) -> Result<()> {
    let wanted = match file.from_path.extension() {
        Some(ext) => old.to_path.with_extension(ext),
        None => old.to_path.clone(),
    };
    info!(
        "REPLACE {} -> {} (was {})",
        file.from_path.display(),
        wanted.display(),
        old.to_path.display()
    );
    supersede(ctx, file, old, wanted)
}

fn transfer(ctx: &ProcessContext, file: &FileRecord, old: &StoredRecord) -> Result<()> {
    info!(
        "TRANSFER {} -> {} (was {})",
        file.from_path.display(),
        file.to_path.display(),
        old.to_path.display()
    );
    supersede(ctx, file, old, file.to_path.clone())
}

/// Retire `old` and store `file` at `wanted`. Everything that can reject the
/// new row is checked before the old file or row is touched.
fn supersede(ctx: &ProcessContext, file: &FileRecord, old: &StoredRecord, wanted: PathBuf) -> Result<()> {
    validate_record(file)?;
    let dest = resolve_destination(ctx, file, wanted, Some(&old.to_path))?;
    ctx.fs.delete(&old.to_path, false)?;
    ctx.store
        .with_database(file.file_type, |db| db.update_state(&old.hash, FileState::Deduped))?;
    store_and_move(ctx, file, &dest)
}

/// Move to where the matched row says the file belongs and take over its
/// stored facts.
fn relocate(ctx: &ProcessContext, file: &FileRecord, matched: &StoredRecord) -> Result<()> {
    let wanted = library_destination(
        &ctx.config,
        file.file_type,
        matched.state,
        matched.timestamp,
        &matched.name,
    );
    let dest = resolve_destination(ctx, file, wanted, None)?;
    let relocated = FileRecord {
        p_hash: matched.p_hash.clone(),
        d_hash: matched.d_hash.clone(),
        width: matched.width,
        height: matched.height,
        ratio: matched.ratio,
        timestamp: matched.timestamp,
        name: matched.name.clone(),
        state: matched.state,
        ..file.clone()
    };
    info!("RELOCATE {} -> {}", file.from_path.display(), dest.display());
    store_and_move(ctx, &relocated, &dest)
}

/// Marker for a pending intent, used in held file names and symlinks.
fn intent_marker(action: ActionType, reason: ReasonType) -> Option<FileMarker> {
    match action {
        ActionType::Hold => Some(FileMarker::Hold),
        ActionType::Save => Some(FileMarker::Save),
        ActionType::Replace => Some(FileMarker::Replace),
        ActionType::Transfer => Some(FileMarker::Transfer),
        ActionType::Delete => match reason.tombstone_state() {
            Some(FileState::Blocked) => Some(FileMarker::Block),
            Some(_) => Some(FileMarker::Dedupe),
            None => Some(FileMarker::Erase),
        },
        ActionType::Relocate => None,
    }
}

/// Pending intent of a hold without candidates.
fn pending_marker(reason: ReasonType) -> Option<FileMarker> {
    match reason {
        ReasonType::Damaged
        | ReasonType::LowFileSize
        | ReasonType::LowResolution
        | ReasonType::LowLongSide
        | ReasonType::DeepLearning => Some(FileMarker::Erase),
        ReasonType::FileMarkReplace => Some(FileMarker::Replace),
        ReasonType::FileMarkTransfer => Some(FileMarker::Transfer),
        _ => None,
    }
}

/// Marked name for a held file. An earlier hold of the same name is never
/// overwritten: the stem gets a `_<n>` suffix, or manual mode fails.
fn held_destination(
    ctx: &ProcessContext,
    file: &FileRecord,
    dir: &Path,
    stem: String,
    ext: &str,
    markers: &MarkerSet,
) -> Result<(PathBuf, String)> {
    let held = marker::mark(&file.from_path, markers);
    if held == file.from_path || fs::symlink_metadata(&held).is_err() {
        return Ok((held, stem));
    }
    if ctx.config.manual {
        return Err(Error::DestinationOccupied(held.display().to_string()));
    }
    let mut n = 1;
    loop {
        let numbered = format!("{}_{}", stem, n);
        let candidate = marker::mark(&dir.join(format!("{}{}", numbered, ext)), markers);
        if fs::symlink_metadata(&candidate).is_err() {
            return Ok((candidate, numbered));
        }
        n += 1;
    }
}

fn hold(ctx: &ProcessContext, file: &FileRecord, result: &JudgeResult) -> Result<()> {
    if matches!(
        result.reason,
        ReasonType::KeepDedupperFile
            | ReasonType::UnknownFileType
            | ReasonType::HashMismatchRelocate
            | ReasonType::FileMarkHold
    ) {
        debug!("HOLD {} left in place ({})", file.from_path.display(), result.reason);
        return Ok(());
    }
    let dir = file
        .from_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut intents: Vec<FileMarker> = if result.sub_results.is_empty() {
        pending_marker(result.reason).into_iter().collect()
    } else {
        result
            .sub_results
            .iter()
            .filter_map(|s| intent_marker(s.action, s.reason))
            .collect()
    };
    // With several candidates the links carry the intents; the file keeps `h`.
    let mut markers = MarkerSet::new().with(FileMarker::Hold);
    if result.sub_results.len() <= 1 {
        for intent in &intents {
            markers = markers.with(*intent);
        }
    }

    let stem = Path::new(&file.name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.name.clone());
    let ext = Path::new(&file.name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let (held, stem) = held_destination(ctx, file, &dir, stem, &ext, &markers)?;
    info!(
        "HOLD {} -> {} ({})",
        file.from_path.display(),
        held.display(),
        result.reason
    );
    if held != file.from_path {
        ctx.fs.move_file(&file.from_path, &held)?;
    }

    for (n, sub) in result.sub_results.iter().enumerate() {
        let Some(intent) = intent_marker(sub.action, sub.reason) else {
            continue;
        };
        let link = marker::mark(
            &dir.join(format!("{}#{}{}", stem, n + 1, ext)),
            &MarkerSet::new().with(intent),
        );
        ctx.fs.symlink(&sub.matched.to_path, &link)?;
    }

    intents.sort();
    intents.dedup();
    for intent in intents.into_iter().filter(|m| *m != FileMarker::Hold) {
        ctx.fs.create_dir_all(&dir.join(intent.dir_name()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_markers() {
        assert_eq!(
            intent_marker(ActionType::Delete, ReasonType::PHashRejectNewer),
            Some(FileMarker::Dedupe)
        );
        assert_eq!(
            intent_marker(ActionType::Delete, ReasonType::FileMarkBlock),
            Some(FileMarker::Block)
        );
        assert_eq!(
            intent_marker(ActionType::Delete, ReasonType::Damaged),
            Some(FileMarker::Erase)
        );
        assert_eq!(
            intent_marker(ActionType::Replace, ReasonType::PHashMatch),
            Some(FileMarker::Replace)
        );
        assert_eq!(intent_marker(ActionType::Relocate, ReasonType::HashMatchRelocate), None);
    }

    #[test]
    fn test_pending_marker() {
        assert_eq!(pending_marker(ReasonType::LowResolution), Some(FileMarker::Erase));
        assert_eq!(pending_marker(ReasonType::PHashMayBe), None);
    }
}
