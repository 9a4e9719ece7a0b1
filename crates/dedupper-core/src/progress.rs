use crate::model::{ActionType, ReasonType};
use std::path::Path;

/// Trait for reporting processing progress.
///
/// The CLI implements it with an indicatif bar. All methods have default
/// no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_collect_complete(&self, _total_files: usize) {}
    fn on_file_complete(&self, _path: &Path, _action: ActionType, _reason: ReasonType) {}
    fn on_process_complete(&self, _processed: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
