use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_MARKS: f64 = 100.0;
pub const DEFAULT_DIFFICULTY: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExamType {
    IA1,
    IA2,
    EndSem,
    Lab,
    Other(String),
}

impl From<&str> for ExamType {
    fn from(s: &str) -> Self {
        match s.trim() {
            "IA1" => ExamType::IA1,
            "IA2" => ExamType::IA2,
            "EndSem" => ExamType::EndSem,
            "Lab" => ExamType::Lab,
            other => ExamType::Other(other.to_string()),
        }
    }
}

impl FromStr for ExamType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ExamType::from(s))
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamType::IA1 => f.write_str("IA1"),
            ExamType::IA2 => f.write_str("IA2"),
            ExamType::EndSem => f.write_str("EndSem"),
            ExamType::Lab => f.write_str("Lab"),
            ExamType::Other(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub student_id: String,
    pub subject_id: String,
    pub exam_type: ExamType,
    pub marks_obtained: f64,
    pub max_marks: f64,
    pub attendance: f64,
    pub exam_date: Option<NaiveDate>,
}

impl PerformanceRecord {
    /// Marks with non-finite values coerced to 0.
    pub fn marks(&self) -> f64 {
        finite_or(self.marks_obtained, 0.0)
    }

    /// Maximum marks, treating zero, negative or non-finite values as 100.
    pub fn max_marks_or_default(&self) -> f64 {
        if self.max_marks.is_finite() && self.max_marks > 0.0 {
            self.max_marks
        } else {
            DEFAULT_MAX_MARKS
        }
    }

    pub fn attendance(&self) -> f64 {
        finite_or(self.attendance, 0.0)
    }

    pub fn normalized_score(&self) -> f64 {
        self.marks() / self.max_marks_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub subject_id: String,
    pub name: String,
    pub semester: i32,
    pub branch: String,
    pub credits: i32,
    pub difficulty_factor: f64,
}

impl Subject {
    pub fn difficulty(&self) -> f64 {
        if self.difficulty_factor.is_finite() && self.difficulty_factor > 0.0 {
            self.difficulty_factor
        } else {
            DEFAULT_DIFFICULTY
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    pub name: String,
    pub current_semester: i32,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakSubjectRecord {
    pub student_id: String,
    pub subject_id: String,
    pub avg_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucketing rule used to derive training labels from average marks.
    pub fn from_avg_marks(avg_marks: f64) -> Self {
        if avg_marks >= 75.0 {
            RiskLevel::Low
        } else if avg_marks >= 50.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    /// Class index used by the classifier (alphabetical: High, Low, Medium).
    pub fn index(self) -> usize {
        match self {
            RiskLevel::High => 0,
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(RiskLevel::High),
            1 => Some(RiskLevel::Low),
            2 => Some(RiskLevel::Medium),
            _ => None,
        }
    }

    pub const COUNT: usize = 3;
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => f.write_str("Low"),
            RiskLevel::Medium => f.write_str("Medium"),
            RiskLevel::High => f.write_str("High"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub student_id: String,
    pub risk_level: RiskLevel,
    /// The student's average marks, kept for display
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlanEntry {
    pub student_id: String,
    pub subject_id: String,
    pub focus_area: String,
    pub scheduled_date: NaiveDate,
    pub priority_score: f64,
}

pub(crate) fn finite_or(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        default
    }
}

/// Rounds to a fixed number of decimal places, ties to even.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(marks: f64, max_marks: f64) -> PerformanceRecord {
        PerformanceRecord {
            student_id: "S00001".to_string(),
            subject_id: "SUB001".to_string(),
            exam_type: ExamType::IA1,
            marks_obtained: marks,
            max_marks,
            attendance: 80.0,
            exam_date: None,
        }
    }

    #[test]
    fn zero_and_nan_max_marks_default_to_hundred() {
        assert_eq!(record(40.0, 0.0).max_marks_or_default(), 100.0);
        assert_eq!(record(40.0, f64::NAN).max_marks_or_default(), 100.0);
        assert_eq!(record(20.0, 50.0).normalized_score(), 0.4);
    }

    #[test]
    fn nan_marks_count_as_zero() {
        assert_eq!(record(f64::NAN, 100.0).normalized_score(), 0.0);
    }

    #[test]
    fn risk_buckets_follow_boundaries() {
        assert_eq!(RiskLevel::from_avg_marks(75.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_avg_marks(74.99), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_avg_marks(50.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_avg_marks(49.99), RiskLevel::High);
    }

    #[test]
    fn halves_round_to_even() {
        assert_eq!(round_to(52.125, 2), 52.12);
        assert_eq!(round_to(45.25, 1), 45.2);
        assert_eq!(round_to(45.35, 1), 45.4);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(-0.125, 2), -0.12);
    }

    #[test]
    fn risk_index_round_trips() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            assert_eq!(RiskLevel::from_index(level.index()), Some(level));
        }
        assert_eq!(RiskLevel::from_index(7), None);
    }

    #[test]
    fn unknown_exam_type_is_preserved() {
        let parsed: ExamType = "Quiz".parse().unwrap();
        assert_eq!(parsed, ExamType::Other("Quiz".to_string()));
        assert_eq!(parsed.to_string(), "Quiz");
    }
}
