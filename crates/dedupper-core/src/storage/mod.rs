pub mod hamming;
pub mod queries;
pub mod sqlite;

pub use hamming::hamming_distance;
pub use queries::validate_record;
pub use sqlite::Database;

use crate::config::{AppConfig, PHashConfig};
use crate::error::Result;
use crate::model::ClassifyType;
use std::path::PathBuf;

/// Opens one store connection per logical operation and closes it on every
/// exit path when the closure returns.
#[derive(Debug, Clone)]
pub struct Store {
    base: PathBuf,
    search: PHashConfig,
    dry_run: bool,
}

impl Store {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            base: config.db_base_path.clone(),
            search: config.p_hash.clone(),
            dry_run: config.dry_run,
        }
    }

    pub fn with_database<T, F>(&self, file_type: ClassifyType, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T>,
    {
        let db = Database::open(&self.base, file_type, self.search.clone(), self.dry_run)?;
        f(&db)
    }
}
