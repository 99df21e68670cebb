//! Academic risk classification.
//!
//! Per-student features are aggregated from the performance table and fed to
//! a forest classifier. The classifier is an explicit service that moves from
//! untrained to trained exactly once; later calls reuse the fitted model.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, OnceLock};

use ndarray::Array2;
use serde::Serialize;

use crate::config::ForestConfig;
use crate::error::{AnalyticsError, Result};
use crate::model::{calculate_accuracy, RandomForest, RiskModel};
use crate::models::{
    finite_or, PerformanceRecord, RiskAssessment, RiskLevel, Subject, DEFAULT_DIFFICULTY,
};

pub const FEATURE_NAMES: [&str; 4] = [
    "avg_marks",
    "avg_weighted_marks",
    "avg_attendance",
    "exams_taken",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentFeatures {
    pub student_id: String,
    pub avg_marks: f64,
    pub avg_weighted_marks: f64,
    pub avg_attendance: f64,
    pub exams_taken: usize,
}

/// Feature rows ordered by student id, with their rule-based labels.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub students: Vec<StudentFeatures>,
    pub features: Array2<f64>,
    pub labels: Vec<RiskLevel>,
}

impl FeatureTable {
    pub fn build(performance: &[PerformanceRecord], subjects: &[Subject]) -> Self {
        let difficulty: HashMap<&str, f64> = subjects
            .iter()
            .map(|s| (s.subject_id.as_str(), s.difficulty()))
            .collect();

        // (marks, weighted marks, attendance, count)
        let mut totals: BTreeMap<&str, (f64, f64, f64, usize)> = BTreeMap::new();
        for record in performance {
            let factor = difficulty
                .get(record.subject_id.as_str())
                .copied()
                .unwrap_or(DEFAULT_DIFFICULTY);
            let marks = record.marks();
            let entry = totals.entry(record.student_id.as_str()).or_insert((0.0, 0.0, 0.0, 0));
            entry.0 += marks;
            entry.1 += marks * factor;
            entry.2 += record.attendance();
            entry.3 += 1;
        }

        let students: Vec<StudentFeatures> = totals
            .into_iter()
            .map(|(student_id, (marks, weighted, attendance, count))| {
                let n = count as f64;
                StudentFeatures {
                    student_id: student_id.to_string(),
                    avg_marks: finite_or(marks / n, 0.0),
                    avg_weighted_marks: finite_or(weighted / n, 0.0),
                    avg_attendance: finite_or(attendance / n, 0.0),
                    exams_taken: count,
                }
            })
            .collect();

        let mut features = Array2::zeros((students.len(), FEATURE_NAMES.len()));
        for (i, s) in students.iter().enumerate() {
            features[[i, 0]] = s.avg_marks;
            features[[i, 1]] = s.avg_weighted_marks;
            features[[i, 2]] = s.avg_attendance;
            features[[i, 3]] = s.exams_taken as f64;
        }
        let labels = students
            .iter()
            .map(|s| RiskLevel::from_avg_marks(s.avg_marks))
            .collect();

        Self {
            students,
            features,
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub trained: bool,
    /// Self-prediction accuracy on the training rows
    pub accuracy: Option<f64>,
    pub features: Vec<&'static str>,
}

/// Risk classifier service holding a lazily trained model.
pub struct RiskClassifier {
    config: ForestConfig,
    model: OnceLock<Box<dyn RiskModel>>,
    accuracy: OnceLock<f64>,
    training: Mutex<()>,
}

impl RiskClassifier {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            model: OnceLock::new(),
            accuracy: OnceLock::new(),
            training: Mutex::new(()),
        }
    }

    /// Starts in the trained state with a caller-supplied model.
    pub fn with_model(model: impl RiskModel + 'static) -> Self {
        let classifier = Self::new(ForestConfig::default());
        let _ = classifier.model.set(Box::new(model));
        classifier
    }

    pub fn is_trained(&self) -> bool {
        self.model.get().is_some()
    }

    /// Trains on the first call only; every later call returns the existing model.
    pub fn ensure_trained(
        &self,
        features: &Array2<f64>,
        labels: &[RiskLevel],
    ) -> Result<&dyn RiskModel> {
        if let Some(model) = self.model.get() {
            return Ok(&**model);
        }

        let _guard = self
            .training
            .lock()
            .map_err(|_| AnalyticsError::ModelTraining("training lock poisoned".into()))?;
        if let Some(model) = self.model.get() {
            return Ok(&**model);
        }

        let mut distribution = [0usize; RiskLevel::COUNT];
        for label in labels {
            distribution[label.index()] += 1;
        }
        tracing::info!(
            rows = features.nrows(),
            high = distribution[RiskLevel::High.index()],
            medium = distribution[RiskLevel::Medium.index()],
            low = distribution[RiskLevel::Low.index()],
            n_trees = self.config.n_trees,
            max_depth = self.config.max_depth,
            "training risk forest"
        );

        let forest = RandomForest::fit(features, labels, &self.config)?;
        let accuracy = calculate_accuracy(&forest.classify(features), labels);
        tracing::info!("risk forest trained, self-prediction accuracy {:.2}%", accuracy * 100.0);

        let _ = self.accuracy.set(accuracy);
        let _ = self.model.set(Box::new(forest));
        self.model
            .get()
            .map(|m| &**m)
            .ok_or(AnalyticsError::ModelNotTrained)
    }

    pub fn predict(&self, features: &Array2<f64>) -> Result<Vec<RiskLevel>> {
        let model = self.model.get().ok_or(AnalyticsError::ModelNotTrained)?;
        Ok(model.classify(features))
    }

    /// Predicts risk for every row in `table`. `risk_score` is the student's average marks.
    pub fn score(&self, table: &FeatureTable) -> Result<Vec<RiskAssessment>> {
        if table.is_empty() {
            return Ok(Vec::new());
        }
        let levels = self.predict(&table.features)?;
        Ok(table
            .students
            .iter()
            .zip(levels)
            .map(|(student, risk_level)| RiskAssessment {
                student_id: student.student_id.clone(),
                risk_level,
                risk_score: student.avg_marks,
            })
            .collect())
    }

    /// Builds features, trains on first use and predicts on the same rows.
    pub fn assess(
        &self,
        performance: &[PerformanceRecord],
        subjects: &[Subject],
    ) -> Result<Vec<RiskAssessment>> {
        let table = FeatureTable::build(performance, subjects);
        if table.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_trained(&table.features, &table.labels)?;
        self.score(&table)
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            trained: self.is_trained(),
            accuracy: self.accuracy.get().copied(),
            features: FEATURE_NAMES.to_vec(),
        }
    }
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExamType;

    struct FixedModel(RiskLevel);

    impl RiskModel for FixedModel {
        fn classify(&self, features: &Array2<f64>) -> Vec<RiskLevel> {
            vec![self.0; features.nrows()]
        }
    }

    fn exam(student: &str, subject: &str, marks: f64, attendance: f64) -> PerformanceRecord {
        PerformanceRecord {
            student_id: student.to_string(),
            subject_id: subject.to_string(),
            exam_type: ExamType::EndSem,
            marks_obtained: marks,
            max_marks: 100.0,
            attendance,
            exam_date: None,
        }
    }

    fn subject(id: &str, difficulty: f64) -> Subject {
        Subject {
            subject_id: id.to_string(),
            name: id.to_string(),
            semester: 1,
            branch: "CE".to_string(),
            credits: 4,
            difficulty_factor: difficulty,
        }
    }

    fn small_classifier() -> RiskClassifier {
        RiskClassifier::new(ForestConfig {
            n_trees: 30,
            max_depth: 6,
            seed: 42,
        })
    }

    #[test]
    fn features_aggregate_per_student() {
        let performance = vec![
            exam("S00002", "SUB001", 80.0, 90.0),
            exam("S00001", "SUB001", 40.0, 70.0),
            exam("S00001", "SUB002", 60.0, 80.0),
            exam("S00001", "SUB404", 50.0, 60.0),
        ];
        let subjects = vec![subject("SUB001", 0.5), subject("SUB002", 0.8)];
        let table = FeatureTable::build(&performance, &subjects);

        assert_eq!(table.len(), 2);
        let s1 = &table.students[0];
        assert_eq!(s1.student_id, "S00001");
        assert_eq!(s1.avg_marks, 50.0);
        // 40*0.5 + 60*0.8 + 50*1.0 (unmatched subject) = 118
        assert!((s1.avg_weighted_marks - 118.0 / 3.0).abs() < 1e-9);
        assert_eq!(s1.avg_attendance, 70.0);
        assert_eq!(s1.exams_taken, 3);
        assert_eq!(table.labels, vec![RiskLevel::Medium, RiskLevel::Low]);
        assert_eq!(table.features[[1, 1]], 40.0);
    }

    #[test]
    fn one_assessment_per_student_with_avg_marks_as_score() {
        let performance = vec![
            exam("S00001", "SUB001", 92.0, 95.0),
            exam("S00001", "SUB002", 88.0, 90.0),
            exam("S00002", "SUB001", 62.0, 80.0),
            exam("S00003", "SUB001", 30.0, 60.0),
            exam("S00003", "SUB002", 36.0, 62.0),
        ];
        let classifier = small_classifier();
        let risk = classifier.assess(&performance, &[]).unwrap();

        let ids: Vec<&str> = risk.iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["S00001", "S00002", "S00003"]);
        assert_eq!(risk[0].risk_score, 90.0);
        assert_eq!(risk[1].risk_score, 62.0);
        assert_eq!(risk[2].risk_score, 33.0);
    }

    #[test]
    fn trains_once_and_reuses_model() {
        let classifier = small_classifier();
        assert!(!classifier.is_trained());

        let first = vec![exam("S00001", "SUB001", 20.0, 50.0)];
        let risk = classifier.assess(&first, &[]).unwrap();
        assert_eq!(risk[0].risk_level, RiskLevel::High);
        assert!(classifier.is_trained());

        // A second table with a different label is scored by the first model.
        let second = vec![exam("S00009", "SUB001", 95.0, 99.0)];
        let risk = classifier.assess(&second, &[]).unwrap();
        assert_eq!(risk[0].risk_level, RiskLevel::High);
        assert_eq!(risk[0].risk_score, 95.0);
    }

    #[test]
    fn injected_model_is_used_without_training() {
        let classifier = RiskClassifier::with_model(FixedModel(RiskLevel::Medium));
        assert!(classifier.is_trained());
        let performance = vec![
            exam("S00001", "SUB001", 99.0, 99.0),
            exam("S00002", "SUB001", 5.0, 10.0),
        ];
        let risk = classifier.assess(&performance, &[]).unwrap();
        assert!(risk.iter().all(|r| r.risk_level == RiskLevel::Medium));
        assert_eq!(classifier.info().accuracy, None);
    }

    #[test]
    fn predict_before_training_fails() {
        let classifier = small_classifier();
        let err = classifier.predict(&Array2::zeros((1, 4))).unwrap_err();
        assert!(matches!(err, AnalyticsError::ModelNotTrained));
    }

    #[test]
    fn empty_performance_skips_training() {
        let classifier = small_classifier();
        assert!(classifier.assess(&[], &[]).unwrap().is_empty());
        assert!(!classifier.is_trained());
    }

    #[test]
    fn concurrent_callers_share_one_model() {
        let classifier = std::sync::Arc::new(small_classifier());
        let performance = vec![
            exam("S00001", "SUB001", 90.0, 95.0),
            exam("S00002", "SUB001", 60.0, 80.0),
            exam("S00003", "SUB001", 30.0, 60.0),
        ];

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let classifier = classifier.clone();
                let performance = performance.clone();
                std::thread::spawn(move || classifier.assess(&performance, &[]).unwrap())
            })
            .collect();
        let results: Vec<Vec<RiskAssessment>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert!(classifier.info().trained);
    }
}
