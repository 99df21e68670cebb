//! Deterministic mentorship insight reports.
//!
//! A report combines the risk assessment, the weak subjects and the study
//! plan of one student into a fixed sequence of text lines. Every section has
//! a fallback line, so empty inputs still produce valid guidance.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{
    round_to, RiskAssessment, RiskLevel, StudyPlanEntry, Student, Subject, WeakSubjectRecord,
    DEFAULT_DIFFICULTY,
};

pub const MAX_FOCUS_SUBJECTS: usize = 3;
pub const MAX_PLAN_ITEMS: usize = 5;

/// A weak subject joined with the subject's display name and difficulty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusSubject {
    pub student_id: String,
    pub subject_id: String,
    pub name: Option<String>,
    pub avg_score: f64,
    pub difficulty_factor: Option<f64>,
}

impl FocusSubject {
    pub fn difficulty(&self) -> f64 {
        match self.difficulty_factor {
            Some(f) if f.is_finite() => f,
            _ => DEFAULT_DIFFICULTY,
        }
    }

    /// Ranking key for the report: lowest combined value surfaces first.
    pub fn priority_score(&self) -> f64 {
        let avg = if self.avg_score.is_finite() { self.avg_score } else { 0.0 };
        avg * self.difficulty()
    }

    fn label(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.subject_id.as_str(),
        }
    }
}

impl From<WeakSubjectRecord> for FocusSubject {
    fn from(record: WeakSubjectRecord) -> Self {
        Self {
            student_id: record.student_id,
            subject_id: record.subject_id,
            name: None,
            avg_score: record.avg_score,
            difficulty_factor: None,
        }
    }
}

/// Left-joins weak subjects with the subject table.
pub fn join_subjects(weak: &[WeakSubjectRecord], subjects: &[Subject]) -> Vec<FocusSubject> {
    let by_id: HashMap<&str, &Subject> =
        subjects.iter().map(|s| (s.subject_id.as_str(), s)).collect();
    weak.iter()
        .map(|record| {
            let subject = by_id.get(record.subject_id.as_str());
            FocusSubject {
                student_id: record.student_id.clone(),
                subject_id: record.subject_id.clone(),
                name: subject.map(|s| s.name.clone()),
                avg_score: record.avg_score,
                difficulty_factor: subject.map(|s| s.difficulty()),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            Trend::Improving
        } else if slope < 0.0 {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    fn line(self) -> &'static str {
        match self {
            Trend::Improving => "Performance trend: Improving 📈",
            Trend::Declining => "Performance trend: Declining 📉",
            Trend::Stable => "Performance trend: Stable ➖",
        }
    }
}

/// Slope of the least-squares line through `(i, values[i])`.
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }
    numerator / denominator
}

fn strategy(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "Strategy: Daily revision, reduce backlog, focus on fundamentals.",
        RiskLevel::Medium => "Strategy: Strengthen weak subjects to move into Low Risk.",
        RiskLevel::Low => "Strategy: Maintain consistency and aim for excellence.",
    }
}

/// Formats a number the way the dashboard shows it: integral values keep one
/// decimal place (`45.0`), others use the shortest form (`0.7`).
pub fn display_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MentorshipReport {
    pub lines: Vec<String>,
}

impl MentorshipReport {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Default, Clone)]
pub struct MentorshipSynthesizer;

impl MentorshipSynthesizer {
    pub fn new() -> Self {
        MentorshipSynthesizer
    }

    pub fn synthesize(
        &self,
        student: Option<&Student>,
        risk: Option<&RiskAssessment>,
        weak: &[FocusSubject],
        plan: &[StudyPlanEntry],
    ) -> String {
        self.build_report(student, risk, weak, plan).text()
    }

    pub fn build_report(
        &self,
        student: Option<&Student>,
        risk: Option<&RiskAssessment>,
        weak: &[FocusSubject],
        plan: &[StudyPlanEntry],
    ) -> MentorshipReport {
        if let Some(student) = student {
            tracing::debug!(
                student_id = %student.student_id,
                weak = weak.len(),
                plan = plan.len(),
                "synthesizing mentorship report"
            );
        }
        let mut lines = Vec::new();

        match risk {
            Some(r) => lines.push(format!(
                "Academic Risk Level: {} (Score: {})",
                r.risk_level,
                display_number(round_to(r.risk_score, 2))
            )),
            None => lines.push("Academic Risk Level: Not Available".to_string()),
        }

        // The trend below reads this same ordering.
        let ranked = rank_focus_subjects(weak);
        if ranked.is_empty() {
            lines.push("No weak subjects detected. Maintain current performance.".to_string());
        } else {
            lines.push("Priority focus subjects:".to_string());
            for subject in ranked.iter().take(MAX_FOCUS_SUBJECTS) {
                lines.push(format!(
                    "- {}: Avg {}, Difficulty {}",
                    subject.label(),
                    display_number(round_to(subject.avg_score, 1)),
                    display_number(subject.difficulty())
                ));
            }
        }

        if plan.is_empty() {
            lines.push("No immediate study plan required.".to_string());
        } else {
            let mut upcoming: Vec<&StudyPlanEntry> = plan.iter().collect();
            upcoming.sort_by_key(|entry| entry.scheduled_date);
            lines.push("Upcoming study focus:".to_string());
            for entry in upcoming.into_iter().take(MAX_PLAN_ITEMS) {
                lines.push(format!(
                    "- {} on {}",
                    entry.subject_id,
                    entry.scheduled_date.format("%Y-%m-%d")
                ));
            }
        }

        if ranked.len() > 1 {
            let scores: Vec<f64> = ranked
                .iter()
                .map(|s| if s.avg_score.is_finite() { s.avg_score } else { 0.0 })
                .collect();
            lines.push(trend(&scores).line().to_string());
        }

        if let Some(r) = risk {
            lines.push(strategy(r.risk_level).to_string());
        }

        MentorshipReport { lines }
    }
}

/// Stable ascending sort by `avg_score * difficulty_factor`.
pub fn rank_focus_subjects(weak: &[FocusSubject]) -> Vec<&FocusSubject> {
    let mut ranked: Vec<&FocusSubject> = weak.iter().collect();
    ranked.sort_by(|a, b| {
        a.priority_score()
            .partial_cmp(&b.priority_score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

pub fn trend(scores: &[f64]) -> Trend {
    Trend::from_slope(linear_regression_slope(scores))
}

pub fn synthesize(
    student: Option<&Student>,
    risk: Option<&RiskAssessment>,
    weak: &[FocusSubject],
    plan: &[StudyPlanEntry],
) -> String {
    MentorshipSynthesizer::new().synthesize(student, risk, weak, plan)
}
