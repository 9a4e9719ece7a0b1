use crate::model::ReasonType;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Outcomes accumulated over one run. Owned by the run's context, so
/// independent runs never share it. Reporting only reads it.
#[derive(Debug, Default)]
pub struct ProcessReport {
    reasons: Mutex<Vec<(ReasonType, PathBuf)>>,
    saved: Mutex<Vec<PathBuf>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub counts: BTreeMap<ReasonType, usize>,
    pub saved: usize,
    pub errors: usize,
}

impl ReportSummary {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl ProcessReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, reason: ReasonType, path: &Path) {
        if let Ok(mut reasons) = self.reasons.lock() {
            reasons.push((reason, path.to_path_buf()));
        }
    }

    pub fn record_saved(&self, path: &Path) {
        if let Ok(mut saved) = self.saved.lock() {
            saved.push(path.to_path_buf());
        }
    }

    pub fn reasons(&self) -> Vec<(ReasonType, PathBuf)> {
        self.reasons.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn saved(&self) -> Vec<PathBuf> {
        self.saved.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn summary(&self) -> ReportSummary {
        let mut counts = BTreeMap::new();
        for (reason, _) in self.reasons() {
            *counts.entry(reason).or_insert(0) += 1;
        }
        ReportSummary {
            errors: counts.get(&ReasonType::ProcessError).copied().unwrap_or(0),
            saved: self.saved().len(),
            counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let report = ProcessReport::new();
        report.record(ReasonType::HashMatch, Path::new("a.jpg"));
        report.record(ReasonType::HashMatch, Path::new("b.jpg"));
        report.record(ReasonType::ProcessError, Path::new("c.jpg"));
        report.record(ReasonType::NoProblem, Path::new("d.jpg"));
        report.record_saved(Path::new("lib/d.jpg"));

        let summary = report.summary();
        assert_eq!(summary.counts[&ReasonType::HashMatch], 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.total(), 4);
    }
}
