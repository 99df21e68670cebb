//! Runs the four analytics stages over the input tables.
//!
//! Every invocation recomputes all derived tables; only the risk model is
//! kept between runs.

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::data::Tables;
use crate::error::Result;
use crate::mentorship::{join_subjects, FocusSubject, MentorshipSynthesizer};
use crate::models::{RiskAssessment, StudyPlanEntry, Student, WeakSubjectRecord};
use crate::risk::RiskClassifier;
use crate::study_plan::StudyPlanScheduler;
use crate::weak_subjects::WeakSubjectDetector;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutput {
    pub weak_subjects: Vec<WeakSubjectRecord>,
    pub risk: Vec<RiskAssessment>,
    pub study_plan: Vec<StudyPlanEntry>,
}

/// Everything the presentation layer shows for one student.
#[derive(Debug, Clone, Serialize)]
pub struct StudentGuidance {
    pub student_id: String,
    pub student: Option<Student>,
    pub risk: Option<RiskAssessment>,
    pub weak_subjects: Vec<FocusSubject>,
    pub study_plan: Vec<StudyPlanEntry>,
    pub report: String,
}

pub struct Pipeline {
    detector: WeakSubjectDetector,
    classifier: RiskClassifier,
    scheduler: StudyPlanScheduler,
    synthesizer: MentorshipSynthesizer,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_classifier(config, RiskClassifier::new(config.forest.clone()))
    }

    /// Uses a caller-built classifier, e.g. one with an injected model.
    pub fn with_classifier(config: &PipelineConfig, classifier: RiskClassifier) -> Self {
        Self {
            detector: WeakSubjectDetector::new(config.weak_threshold),
            classifier,
            scheduler: StudyPlanScheduler::new(config.focus_area.clone()),
            synthesizer: MentorshipSynthesizer::new(),
        }
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    pub fn run(&self, tables: &Tables) -> Result<PipelineOutput> {
        self.run_at(tables, Local::now().date_naive())
    }

    /// Same as [`Pipeline::run`] with an explicit "today" for the study plan.
    pub fn run_at(&self, tables: &Tables, today: NaiveDate) -> Result<PipelineOutput> {
        let weak_subjects = self.detector.detect(&tables.performance, &tables.subjects);
        let risk = self.classifier.assess(&tables.performance, &tables.subjects)?;
        let study_plan = self.scheduler.schedule_from(&weak_subjects, today);

        tracing::debug!(
            weak = weak_subjects.len(),
            risk = risk.len(),
            plan = study_plan.len(),
            "pipeline run complete"
        );

        Ok(PipelineOutput {
            weak_subjects,
            risk,
            study_plan,
        })
    }

    /// Filters the run output to one student and synthesizes their report.
    pub fn guidance(
        &self,
        tables: &Tables,
        output: &PipelineOutput,
        student_id: &str,
    ) -> StudentGuidance {
        let weak: Vec<WeakSubjectRecord> = output
            .weak_subjects
            .iter()
            .filter(|w| w.student_id == student_id)
            .cloned()
            .collect();
        let weak_subjects = join_subjects(&weak, &tables.subjects);
        let risk = output.risk.iter().find(|r| r.student_id == student_id).cloned();
        let study_plan: Vec<StudyPlanEntry> = output
            .study_plan
            .iter()
            .filter(|p| p.student_id == student_id)
            .cloned()
            .collect();
        let student = tables.student(student_id).cloned();

        let report = self
            .synthesizer
            .synthesize(student.as_ref(), risk.as_ref(), &weak_subjects, &study_plan);

        StudentGuidance {
            student_id: student_id.to_string(),
            student,
            risk,
            weak_subjects,
            study_plan,
            report,
        }
    }

    /// Guidance for every student in the students table.
    pub fn all_guidance(&self, tables: &Tables, output: &PipelineOutput) -> Vec<StudentGuidance> {
        tables
            .students
            .iter()
            .map(|s| self.guidance(tables, output, &s.student_id))
            .collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}
