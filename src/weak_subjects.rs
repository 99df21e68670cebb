//! Weak-subject detection from normalized exam scores.

use std::collections::BTreeMap;

use crate::config::DEFAULT_WEAK_THRESHOLD;
use crate::models::{round_to, PerformanceRecord, Subject, WeakSubjectRecord};

/// Flags (student, subject) pairs whose mean normalized score is below a threshold.
#[derive(Debug, Clone)]
pub struct WeakSubjectDetector {
    threshold: f64,
}

impl Default for WeakSubjectDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WEAK_THRESHOLD)
    }
}

impl WeakSubjectDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Averages every exam of a (student, subject) pair, scales to a percentage
    /// rounded to two decimals, and keeps the pairs below the threshold.
    /// Output is ordered by student then subject.
    pub fn detect(
        &self,
        performance: &[PerformanceRecord],
        _subjects: &[Subject],
    ) -> Vec<WeakSubjectRecord> {
        average_scores(performance)
            .into_iter()
            .filter(|record| record.avg_score < self.threshold)
            .collect()
    }
}

/// Mean normalized score per (student, subject), as a percentage.
pub fn average_scores(performance: &[PerformanceRecord]) -> Vec<WeakSubjectRecord> {
    let mut groups: BTreeMap<(&str, &str), (f64, usize)> = BTreeMap::new();
    for record in performance {
        let entry = groups
            .entry((record.student_id.as_str(), record.subject_id.as_str()))
            .or_insert((0.0, 0));
        entry.0 += record.normalized_score();
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|((student_id, subject_id), (total, count))| WeakSubjectRecord {
            student_id: student_id.to_string(),
            subject_id: subject_id.to_string(),
            avg_score: round_to(total / count as f64 * 100.0, 2),
        })
        .collect()
}

/// Runs the detector with the default threshold.
pub fn detect(performance: &[PerformanceRecord], subjects: &[Subject]) -> Vec<WeakSubjectRecord> {
    WeakSubjectDetector::default().detect(performance, subjects)
}
