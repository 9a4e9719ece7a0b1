use super::hamming::hamming_distance;
use super::sqlite::Database;
use crate::error::{Error, Result};
use crate::marker;
use crate::model::{FileRecord, FileState, StoredRecord};
use rusqlite::{params, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

const COLUMNS: &str =
    "hash, p_hash, d_hash, width, height, ratio, timestamp, name, to_path, from_path, size, state";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let division: i64 = row.get(11)?;
    let state = FileState::from_division(division).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            11,
            rusqlite::types::Type::Integer,
            format!("unknown state division {}", division).into(),
        )
    })?;
    Ok(StoredRecord {
        hash: row.get(0)?,
        p_hash: row.get(1)?,
        d_hash: row.get(2)?,
        width: row.get::<_, i64>(3)? as u32,
        height: row.get::<_, i64>(4)? as u32,
        ratio: row.get(5)?,
        timestamp: row.get(6)?,
        name: row.get(7)?,
        to_path: PathBuf::from(row.get::<_, String>(8)?),
        from_path: PathBuf::from(row.get::<_, String>(9)?),
        size: row.get::<_, i64>(10)? as u64,
        state,
        p_hash_distance: None,
        d_hash_distance: None,
    })
}

/// Rejects rows the store must never hold: image rows without numeric
/// perceptual hashes.
pub fn validate_record(record: &FileRecord) -> Result<()> {
    if record.file_type.uses_perceptual_hash() && !record.has_perceptual_hashes() {
        return Err(Error::InvalidRecord(format!(
            "{} has no numeric perceptual hashes",
            record.from_path.display()
        )));
    }
    Ok(())
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl Database {
    // ── Lookups ──────────────────────────────────────────────────

    pub fn query_by_hash(&self, hash: &str) -> Result<Option<StoredRecord>> {
        if hash.is_empty() {
            return Ok(None);
        }
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {} FROM {} WHERE hash = ?1",
            COLUMNS,
            self.table()
        ))?;
        match stmt.query_row(params![hash], row_to_record) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Accepted rows inside the ratio window whose p_hash distance is under
    /// the configured threshold, nearest first. Both distances are attached.
    pub fn query_by_p_hash(
        &self,
        p_hash: &str,
        d_hash: Option<&str>,
        ratio: f64,
        from_path: &Path,
    ) -> Result<Vec<StoredRecord>> {
        let epsilon = self.search.ratio_epsilon;
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {} FROM {} WHERE ratio BETWEEN ?1 AND ?2 AND state >= ?3",
            COLUMNS,
            self.table()
        ))?;
        let rows = stmt
            .query_map(
                params![
                    ratio - epsilon,
                    ratio + epsilon,
                    FileState::Accepted.division()
                ],
                row_to_record,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let scanned = rows.len();

        let from_dir = from_path.parent();
        let mut hits: Vec<StoredRecord> = rows
            .into_iter()
            .filter(|row| !(self.search.ignore_same_dir && row.from_path.parent() == from_dir))
            .filter_map(|mut row| {
                let distance = hamming_distance(Some(p_hash), row.p_hash.as_deref())?;
                if distance >= self.search.threshold {
                    return None;
                }
                row.p_hash_distance = Some(distance);
                row.d_hash_distance = hamming_distance(d_hash, row.d_hash.as_deref());
                Some(row)
            })
            .collect();
        hits.sort_by_key(|row| row.p_hash_distance);

        debug!(
            "p_hash query on {}: {} rows in ratio window, {} hits",
            self.table(),
            scanned,
            hits.len()
        );
        Ok(hits)
    }

    pub fn query_by_name(&self, name: &str) -> Result<Vec<StoredRecord>> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {} FROM {} WHERE name = ?1",
            COLUMNS,
            self.table()
        ))?;
        let rows = stmt
            .query_map(params![name], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn count(&self) -> Result<i64> {
        let count = self.connection().query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Upsert keyed by hash. Image rows must carry numeric perceptual hashes.
    pub fn insert(&self, record: &FileRecord, replace: bool) -> Result<()> {
        validate_record(record)?;
        if self.dry_run {
            info!(
                "[dry-run] insert {} into {} as {:?}",
                record.to_path.display(),
                self.table(),
                record.state
            );
            return Ok(());
        }

        let verb = if replace {
            "INSERT OR REPLACE"
        } else {
            "INSERT OR IGNORE"
        };
        self.connection().execute(
            &format!(
                "{} INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                verb,
                self.table(),
                COLUMNS
            ),
            params![
                record.hash,
                record.p_hash,
                record.d_hash,
                record.width as i64,
                record.height as i64,
                record.ratio,
                record.timestamp,
                record.name,
                path_text(&record.to_path),
                path_text(&marker::strip(&record.from_path)),
                record.size as i64,
                record.state.division(),
            ],
        )?;
        trace!("Inserted {} into {}", record.hash, self.table());
        Ok(())
    }

    pub fn update_state(&self, hash: &str, state: FileState) -> Result<usize> {
        if self.dry_run {
            info!("[dry-run] set {} in {} to {:?}", hash, self.table(), state);
            return Ok(0);
        }
        let updated = self.connection().execute(
            &format!("UPDATE {} SET state = ?1 WHERE hash = ?2", self.table()),
            params![state.division(), hash],
        )?;
        Ok(updated)
    }

    /// Idempotent row removal.
    pub fn delete(&self, hash: &str) -> Result<()> {
        if self.dry_run {
            info!("[dry-run] delete {} from {}", hash, self.table());
            return Ok(());
        }
        self.connection().execute(
            &format!("DELETE FROM {} WHERE hash = ?1", self.table()),
            params![hash],
        )?;
        Ok(())
    }
}
