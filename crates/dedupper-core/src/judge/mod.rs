//! The decision cascade.
//!
//! `Judge::detect` is a pure function of the candidate, its store lookups and
//! the configuration. The only calls it makes are to the injected
//! acceptability classifier and statistic comparator.

pub mod contents;
pub mod hash;
pub mod keep;
pub mod marker;
pub mod path;
pub mod phash;
pub mod types;

use crate::collab::{AcceptabilityClassifier, StatisticComparator};
use crate::config::AppConfig;
use crate::error::Result;
use crate::model::{
    ActionType, FileRecord, JudgeResult, JudgeSubResult, ReasonType, StoredRecord,
};
use contents::ContentsPolicy;
use path::PathPolicy;
use phash::PHashResolver;
use std::sync::Arc;
use tracing::debug;

/// A policy that can reject a file on its own facts.
pub trait RejectDetector: Send + Sync {
    fn detect(&self, file: &FileRecord) -> Option<ReasonType>;
}

pub struct Judge {
    config: Arc<AppConfig>,
    path: PathPolicy,
    contents: ContentsPolicy,
    classifier: Arc<dyn AcceptabilityClassifier>,
    comparator: Arc<dyn StatisticComparator>,
}

impl Judge {
    pub fn new(
        config: Arc<AppConfig>,
        classifier: Arc<dyn AcceptabilityClassifier>,
        comparator: Arc<dyn StatisticComparator>,
    ) -> Result<Self> {
        let path = PathPolicy::new(&config.ng_file_name, &config.ng_dir_path)?;
        let contents = ContentsPolicy::new(config.image.clone(), config.video.clone());
        Ok(Self {
            config,
            path,
            contents,
            classifier,
            comparator,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// First matching rule wins.
    pub fn detect(
        &self,
        file: &FileRecord,
        by_hash: Option<&StoredRecord>,
        by_p_hash: &[StoredRecord],
        by_name: &[StoredRecord],
    ) -> Result<JudgeResult> {
        let result = self.cascade(file, by_hash, by_p_hash, by_name)?;
        debug!(
            "{} -> {} ({}), {} sub-results",
            file.from_path.display(),
            result.action,
            result.reason,
            result.sub_results.len()
        );
        Ok(result)
    }

    fn cascade(
        &self,
        file: &FileRecord,
        by_hash: Option<&StoredRecord>,
        by_p_hash: &[StoredRecord],
        by_name: &[StoredRecord],
    ) -> Result<JudgeResult> {
        if self.config.relocate {
            return Ok(match by_hash {
                Some(stored) => JudgeResult::matched(
                    ActionType::Relocate,
                    stored.clone(),
                    ReasonType::HashMatchRelocate,
                ),
                None => JudgeResult::new(ActionType::Hold, ReasonType::HashMismatchRelocate),
            });
        }

        if let Some(reason) = self.path.detect(file) {
            return Ok(JudgeResult::new(ActionType::Delete, reason));
        }

        if let Some(result) = types::judge_special_type(file) {
            return Ok(result);
        }

        if let Some(result) = marker::judge_marker(file, by_hash, by_p_hash, by_name) {
            return Ok(result);
        }

        if let Some(reason) = self.contents.detect(file) {
            return Ok(JudgeResult::new(self.delete_or_hold(), reason));
        }

        if let Some(stored) = by_hash {
            return Ok(hash::judge_hash_match(
                file,
                stored,
                self.config.transfer,
                self.config.recovery,
            ));
        }

        if !self.classifier.is_acceptable(file)? {
            return Ok(JudgeResult::new(self.delete_or_hold(), ReasonType::DeepLearning));
        }

        if !by_p_hash.is_empty() {
            return Ok(self.judge_p_hash(file, by_p_hash));
        }

        let accepted: Vec<&StoredRecord> = by_name.iter().filter(|s| s.state.is_accepted()).collect();
        if !accepted.is_empty() {
            let sub_results = accepted
                .into_iter()
                .map(|s| JudgeSubResult {
                    action: ActionType::Hold,
                    matched: s.clone(),
                    reason: ReasonType::FileNameMatch,
                })
                .collect();
            return Ok(JudgeResult::new(ActionType::Hold, ReasonType::FileNameMatch)
                .with_sub_results(sub_results));
        }

        Ok(JudgeResult::new(ActionType::Save, ReasonType::NoProblem))
    }

    fn delete_or_hold(&self) -> ActionType {
        if self.config.instant_delete {
            ActionType::Delete
        } else {
            ActionType::Hold
        }
    }

    fn judge_p_hash(&self, file: &FileRecord, candidates: &[StoredRecord]) -> JudgeResult {
        let resolver = PHashResolver {
            config: &self.config.p_hash,
            statistic: &self.config.statistic,
            comparator: self.comparator.as_ref(),
        };
        let mut result = resolver.resolve(file, candidates);
        if let Some(matched) = &result.matched {
            let (action, reason) = keep::retarget(
                result.action,
                result.reason,
                file.state,
                matched.state,
                self.config.transfer,
            );
            result.action = action;
            result.reason = reason;
        }
        result
    }
}
