//! Process orchestration.
//!
//! Per file: collect metadata (cache first), take the hash/destination key
//! locks, look the file up in its store, judge it, take the global write
//! lock, fill any missing perceptual hash, execute the action, release the
//! locks and clean the sidecar cache.

pub mod actions;

use crate::cache::MetadataCache;
use crate::classify::{self, library_destination};
use crate::collab::{
    AcceptAll, AcceptabilityClassifier, BasicInspector, ContentInspector, NoStatistics,
    StatisticComparator,
};
use crate::config::{self, AppConfig};
use crate::error::{Error, Result};
use crate::fsops::FileOps;
use crate::judge::Judge;
use crate::lock::LockCoordinator;
use crate::marker;
use crate::model::{ActionType, FileRecord, FileState, JudgeResult, ReasonType, StoredRecord};
use crate::progress::{ProgressReporter, SilentReporter};
use crate::report::ProcessReport;
use crate::scanner::{self, WalkOptions};
use crate::storage::Store;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, UNIX_EPOCH};
use tracing::{debug, error, info, instrument, warn};

/// The external collaborators of one run.
#[derive(Clone)]
pub struct Collaborators {
    pub inspector: Arc<dyn ContentInspector>,
    pub classifier: Arc<dyn AcceptabilityClassifier>,
    pub comparator: Arc<dyn StatisticComparator>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            inspector: Arc::new(BasicInspector),
            classifier: Arc::new(AcceptAll),
            comparator: Arc::new(NoStatistics),
        }
    }
}

/// Everything one run owns: locks, store access, cache, judge and report.
/// Dropping it releases every process-local lock.
pub struct ProcessContext {
    pub config: Arc<AppConfig>,
    pub locks: LockCoordinator,
    pub store: Store,
    pub cache: MetadataCache,
    pub judge: Judge,
    pub inspector: Arc<dyn ContentInspector>,
    pub fs: FileOps,
    pub report: ProcessReport,
}

impl ProcessContext {
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Result<Self> {
        let config = Arc::new(config);
        let judge = Judge::new(
            Arc::clone(&config),
            collaborators.classifier,
            collaborators.comparator,
        )?;
        Ok(Self {
            locks: LockCoordinator::new(&config.db_base_path, &config.lock),
            store: Store::new(&config),
            cache: MetadataCache::new(config.cache && !config.dry_run),
            fs: FileOps::new(&config),
            report: ProcessReport::new(),
            inspector: collaborators.inspector,
            judge,
            config,
        })
    }
}

pub struct ProcessEngine {
    context: ProcessContext,
    progress: Arc<dyn ProgressReporter>,
}

impl ProcessEngine {
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Result<Self> {
        Ok(Self {
            context: ProcessContext::new(config, collaborators)?,
            progress: Arc::new(SilentReporter),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn context(&self) -> &ProcessContext {
        &self.context
    }

    pub fn report(&self) -> &ProcessReport {
        &self.context.report
    }

    /// Process several targets after dropping any nested inside another.
    pub fn process_all(&self, targets: &[PathBuf]) -> Result<bool> {
        let roots = config::non_overlapping_directories(targets.to_vec());
        info!("Processing targets: {:?}", roots);
        let mut ok = true;
        for root in roots {
            ok &= self.process(&root)?;
        }
        Ok(ok)
    }

    /// Process one file or a whole tree. Returns whether every file
    /// succeeded; a failing file never stops the others.
    pub fn process(&self, target: &Path) -> Result<bool> {
        let config = &self.context.config;
        let options = WalkOptions {
            ignore_globs: config.ignore_patterns.clone(),
            skip_dirs: vec![config.db_base_path.clone()],
        };
        let files = scanner::collect_files(target, &options)?;
        info!("Collected {} files under {}", files.len(), target.display());
        self.progress.on_collect_complete(files.len());

        let start = Instant::now();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_workers.max(1))
            .build()
            .map_err(|e| Error::Other(format!("worker pool: {}", e)))?;
        let outcomes: Vec<bool> =
            pool.install(|| files.par_iter().map(|path| self.handle(path)).collect());

        let failed = outcomes.iter().filter(|ok| !**ok).count();
        let duration = start.elapsed().as_secs_f64();
        info!(
            "Processed {} files in {:.2}s, {} failed",
            outcomes.len(),
            duration,
            failed
        );
        self.progress.on_process_complete(outcomes.len(), duration);
        Ok(failed == 0)
    }

    fn handle(&self, path: &Path) -> bool {
        match self.process_file(path) {
            Ok(result) => {
                self.progress.on_file_complete(path, result.action, result.reason);
                true
            }
            Err(e) => {
                error!("Failed to process {}: {}", path.display(), e);
                self.context.report.record(ReasonType::ProcessError, path);
                self.progress
                    .on_file_complete(path, ActionType::Hold, ReasonType::ProcessError);
                false
            }
        }
    }

    /// Handle one file end to end.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn process_file(&self, path: &Path) -> Result<JudgeResult> {
        let ctx = &self.context;
        let mut file = self.collect(path)?;

        let key_guards = ctx.locks.lock_file(&file.hash, &file.to_path)?;
        let (by_hash, by_p_hash, by_name) = self.lookup(&mut file)?;
        let result = ctx
            .judge
            .detect(&file, by_hash.as_ref(), &by_p_hash, &by_name)?;

        let write_guard = if ctx.config.p_hash.ignore_same_dir {
            None
        } else {
            Some(ctx.locks.lock_write()?)
        };
        if actions::needs_perceptual_hash(&file, &result) {
            self.fill_perceptual_hash(&mut file)?;
        }
        actions::execute(ctx, &file, &result)?;
        drop(write_guard);
        drop(key_guards);

        if !ctx.config.dry_run {
            if let Err(e) = ctx.cache.clean(path) {
                warn!("Failed to clean cache of {}: {}", path.display(), e);
            }
        }
        ctx.report.record(result.reason, path);
        Ok(result)
    }

    fn collect(&self, path: &Path) -> Result<FileRecord> {
        let ctx = &self.context;
        let metadata = fs::metadata(path)?;
        let size = metadata.len();
        let file_type = classify::classify(path, &ctx.config.scrap);
        let state = if ctx.config.keep {
            FileState::Keeping
        } else {
            FileState::Accepted
        };
        let name = path
            .file_name()
            .map(|n| marker::strip_name(&n.to_string_lossy()))
            .unwrap_or_default();
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let mut record = FileRecord {
            hash: String::new(),
            p_hash: None,
            d_hash: None,
            width: 0,
            height: 0,
            ratio: 0.0,
            damaged: false,
            size,
            timestamp: modified,
            name,
            from_path: path.to_path_buf(),
            to_path: PathBuf::new(),
            file_type,
            state,
        };
        if file_type.is_forgettable() {
            return Ok(record);
        }

        match ctx.cache.load(path, size)? {
            Some(cached) => {
                record.hash = cached.hash;
                record.p_hash = cached.p_hash;
                record.d_hash = cached.d_hash;
                record.width = cached.width;
                record.height = cached.height;
                record.ratio = cached.ratio;
                record.damaged = cached.damaged;
                record.timestamp = cached.timestamp;
            }
            None => {
                let info = ctx.inspector.read_info(path, file_type)?;
                record.ratio = info.ratio();
                record.hash = info.hash;
                record.width = info.width;
                record.height = info.height;
                record.damaged = info.damaged;
                record.timestamp = info.timestamp.unwrap_or(modified);
                self.store_cache(&record);
            }
        }
        record.to_path = library_destination(
            &ctx.config,
            file_type,
            state,
            record.timestamp,
            &record.name,
        );
        debug!(
            "Collected {} ({}, {} bytes, hash {})",
            path.display(),
            file_type,
            size,
            record.hash
        );
        Ok(record)
    }

    fn store_cache(&self, record: &FileRecord) {
        if let Err(e) = self.context.cache.store(record) {
            warn!("Failed to cache {}: {}", record.from_path.display(), e);
        }
    }

    /// Compute perceptual hashes once, for images that lack them.
    fn fill_perceptual_hash(&self, file: &mut FileRecord) -> Result<()> {
        if !file.file_type.uses_perceptual_hash() || file.has_perceptual_hashes() {
            return Ok(());
        }
        if let Some(hashes) = self.context.inspector.calculate_perceptual_hash(&file.from_path)? {
            file.p_hash = Some(hashes.p_hash);
            file.d_hash = Some(hashes.d_hash);
            self.store_cache(file);
        }
        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn lookup(
        &self,
        file: &mut FileRecord,
    ) -> Result<(Option<StoredRecord>, Vec<StoredRecord>, Vec<StoredRecord>)> {
        if file.file_type.is_forgettable() {
            return Ok((None, Vec::new(), Vec::new()));
        }
        let ctx = &self.context;
        let by_hash = ctx
            .store
            .with_database(file.file_type, |db| db.query_by_hash(&file.hash))?;
        if ctx.config.relocate {
            return Ok((by_hash, Vec::new(), Vec::new()));
        }

        let marked = !marker::extract(&file.from_path).is_empty();
        let mut by_p_hash = Vec::new();
        if file.file_type.uses_perceptual_hash() && (by_hash.is_none() || marked) {
            self.fill_perceptual_hash(file)?;
            if let Some(p_hash) = file.p_hash.as_deref() {
                by_p_hash = ctx.store.with_database(file.file_type, |db| {
                    db.query_by_p_hash(p_hash, file.d_hash.as_deref(), file.ratio, &file.from_path)
                })?;
            }
        }

        let by_name = if file.file_type.uses_perceptual_hash() {
            Vec::new()
        } else {
            ctx.store
                .with_database(file.file_type, |db| db.query_by_name(&file.name))?
        };
        debug!(
            "Lookup for {}: hash hit {}, {} p_hash hits, {} name hits",
            file.from_path.display(),
            by_hash.is_some(),
            by_p_hash.len(),
            by_name.len()
        );
        Ok((by_hash, by_p_hash, by_name))
    }
}
