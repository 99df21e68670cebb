//! Student success analytics.
//!
//! Turns exam records into per-student guidance through four stages:
//! weak-subject detection, risk classification, study-plan scheduling and
//! mentorship report synthesis.

pub mod config;
pub mod data;
pub mod enhancer;
pub mod error;
pub mod mentorship;
pub mod model;
pub mod models;
pub mod pipeline;
pub mod risk;
pub mod server;
pub mod study_plan;
pub mod weak_subjects;

pub use config::{EnhancerConfig, ForestConfig, HfConfig, PipelineConfig};
pub use data::Tables;
pub use enhancer::{enhance_or_fallback, HfEnhancer, InsightEnhancer, OllamaEnhancer};
pub use error::{AnalyticsError, Result};
pub use mentorship::{FocusSubject, MentorshipSynthesizer};
pub use model::{RandomForest, RiskModel};
pub use models::{
    ExamType, PerformanceRecord, RiskAssessment, RiskLevel, StudyPlanEntry, Student, Subject,
    WeakSubjectRecord,
};
pub use pipeline::{Pipeline, PipelineOutput, StudentGuidance};
pub use risk::{FeatureTable, RiskClassifier};
pub use study_plan::StudyPlanScheduler;
pub use weak_subjects::WeakSubjectDetector;
