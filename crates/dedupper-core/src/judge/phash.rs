//! Resolution of perceptual-hash hits.
//!
//! Each candidate gets an outcome from a fixed rule order. Outcomes other than
//! HOLD are softened to HOLD unless both hashes are within their exact
//! thresholds, and the raw outcome is kept as the pending intent. Across
//! candidates a DELETE wins, then REPLACE/TRANSFER, else the file is held with
//! every pending intent attached.

use crate::collab::{ContentStatistic, StatisticComparator};
use crate::config::{PHashConfig, StatisticConfig};
use crate::model::{ActionType, FileRecord, JudgeResult, JudgeSubResult, ReasonType, StoredRecord};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Factors {
    pub same_dir: bool,
    pub accessible: bool,
    pub low_resolution: bool,
    pub low_file_size: bool,
    pub equal_pixels: bool,
    pub newer: bool,
    pub valid_distance: bool,
    pub p_exact: bool,
    pub d_exact: bool,
    /// Either distance is zero; statistics are not consulted.
    pub hash_equal: bool,
}

impl Factors {
    pub fn compute(file: &FileRecord, stored: &StoredRecord, config: &PHashConfig) -> Self {
        let file_pixels = file.pixels() as f64;
        let stored_pixels = stored.pixels() as f64;
        let (p, d) = (stored.p_hash_distance, stored.d_hash_distance);
        Self {
            same_dir: file.from_dir() == stored.from_path.parent(),
            accessible: stored.to_path.exists(),
            low_resolution: file_pixels < stored_pixels * config.resolution_ratio,
            low_file_size: (file.size as f64) < stored.size as f64 * config.file_size_ratio,
            equal_pixels: file.pixels() == stored.pixels(),
            newer: file.timestamp > stored.timestamp,
            valid_distance: p.is_some() && d.is_some(),
            p_exact: p.is_some_and(|p| p < config.exact_threshold),
            d_exact: d.is_some_and(|d| d < config.d_hash_exact_threshold),
            hash_equal: p == Some(0) || d == Some(0),
        }
    }

    pub fn is_may_be(&self) -> bool {
        !(self.p_exact && self.d_exact)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct StatisticVerdict {
    different_mean: bool,
    low_entropy: bool,
    low_quality: bool,
}

#[derive(Debug, Clone)]
struct CandidateJudge {
    effective: ActionType,
    intent: ActionType,
    reason: ReasonType,
    record: StoredRecord,
}

pub struct PHashResolver<'a> {
    pub config: &'a PHashConfig,
    pub statistic: &'a StatisticConfig,
    pub comparator: &'a dyn StatisticComparator,
}

impl PHashResolver<'_> {
    pub fn resolve(&self, file: &FileRecord, candidates: &[StoredRecord]) -> JudgeResult {
        let judged: Vec<CandidateJudge> = candidates
            .iter()
            .map(|stored| self.judge_candidate(file, stored))
            .collect();

        if let Some(c) = judged.iter().find(|c| c.effective == ActionType::Delete) {
            return JudgeResult::matched(ActionType::Delete, c.record.clone(), c.reason);
        }
        if let Some(c) = judged
            .iter()
            .find(|c| matches!(c.effective, ActionType::Replace | ActionType::Transfer))
        {
            return JudgeResult::matched(c.effective, c.record.clone(), c.reason);
        }

        let sub_results = judged
            .into_iter()
            .map(|c| JudgeSubResult {
                action: c.intent,
                matched: c.record,
                reason: c.reason,
            })
            .collect();
        JudgeResult::new(ActionType::Hold, ReasonType::PHashMayBe).with_sub_results(sub_results)
    }

    fn judge_candidate(&self, file: &FileRecord, stored: &StoredRecord) -> CandidateJudge {
        let factors = Factors::compute(file, stored, self.config);
        let (intent, reason) = self.outcome(file, stored, &factors);
        let effective = if factors.is_may_be() && intent != ActionType::Hold {
            ActionType::Hold
        } else {
            intent
        };
        trace!(
            "candidate {} for {}: {:?} -> {} / {} ({})",
            stored.hash,
            file.from_path.display(),
            factors,
            intent,
            effective,
            reason
        );
        CandidateJudge {
            effective,
            intent,
            reason,
            record: stored.clone(),
        }
    }

    fn outcome(
        &self,
        file: &FileRecord,
        stored: &StoredRecord,
        factors: &Factors,
    ) -> (ActionType, ReasonType) {
        if !factors.valid_distance {
            return (ActionType::Hold, ReasonType::ProcessError);
        }
        if factors.low_resolution {
            return (ActionType::Delete, ReasonType::PHashRejectLowResolution);
        }
        if factors.low_file_size {
            return (ActionType::Delete, ReasonType::PHashRejectLowFileSize);
        }
        if factors.equal_pixels && factors.newer {
            return (ActionType::Delete, ReasonType::PHashRejectNewer);
        }
        if !factors.accessible {
            return (ActionType::Hold, ReasonType::PHashMatchLostFile);
        }
        if !factors.hash_equal {
            if let Some(verdict) = self.compare_statistics(file, stored) {
                if verdict.different_mean {
                    return (ActionType::Save, ReasonType::PHashRejectDifferentMean);
                }
                if verdict.low_entropy {
                    return (ActionType::Delete, ReasonType::PHashRejectLowEntropy);
                }
                if verdict.low_quality {
                    return (ActionType::Delete, ReasonType::PHashRejectLowQuality);
                }
            }
        }
        (ActionType::Replace, ReasonType::PHashMatch)
    }

    /// A failing comparator means "no rejection signal".
    fn compare_statistics(&self, file: &FileRecord, stored: &StoredRecord) -> Option<StatisticVerdict> {
        let incoming = self.comparator.statistic(&file.from_path);
        let existing = self.comparator.statistic(&stored.to_path);
        match (incoming, existing) {
            (Ok(incoming), Ok(existing)) => Some(self.verdict(&incoming, &existing)),
            (Err(e), _) | (_, Err(e)) => {
                debug!(
                    "Statistic comparison skipped for {}: {}",
                    file.from_path.display(),
                    e
                );
                None
            }
        }
    }

    fn verdict(&self, incoming: &ContentStatistic, existing: &ContentStatistic) -> StatisticVerdict {
        StatisticVerdict {
            different_mean: (incoming.mean - existing.mean).abs() > self.statistic.mean_threshold,
            low_entropy: incoming.entropy < existing.entropy - self.statistic.entropy_threshold,
            low_quality: incoming.quality < existing.quality,
        }
    }
}
