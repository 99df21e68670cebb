//! Revision scheduling for weak subjects.

use std::collections::BTreeMap;

use chrono::{Duration, Local, NaiveDate};

use crate::config::DEFAULT_FOCUS_AREA;
use crate::models::{round_to, StudyPlanEntry, WeakSubjectRecord};

#[derive(Debug, Clone)]
pub struct StudyPlanScheduler {
    focus_area: String,
}

impl Default for StudyPlanScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FOCUS_AREA)
    }
}

impl StudyPlanScheduler {
    pub fn new(focus_area: impl Into<String>) -> Self {
        Self {
            focus_area: focus_area.into(),
        }
    }

    /// Schedules from the local date; the first entry lands tomorrow.
    pub fn schedule(&self, weak: &[WeakSubjectRecord]) -> Vec<StudyPlanEntry> {
        self.schedule_from(weak, Local::now().date_naive())
    }

    /// Per student, the most urgent subject (lowest average) is scheduled on
    /// `today + 1`, the next on `today + 2`, and so on. Equal priorities keep
    /// their input order.
    pub fn schedule_from(
        &self,
        weak: &[WeakSubjectRecord],
        today: NaiveDate,
    ) -> Vec<StudyPlanEntry> {
        let mut groups: BTreeMap<&str, Vec<(&WeakSubjectRecord, f64)>> = BTreeMap::new();
        for record in weak {
            groups
                .entry(record.student_id.as_str())
                .or_default()
                .push((record, priority_score(record.avg_score)));
        }

        let mut plan = Vec::with_capacity(weak.len());
        for (student_id, mut rows) in groups {
            rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            for (offset, (record, priority)) in rows.into_iter().enumerate() {
                plan.push(StudyPlanEntry {
                    student_id: student_id.to_string(),
                    subject_id: record.subject_id.clone(),
                    focus_area: self.focus_area.clone(),
                    scheduled_date: today + Duration::days(offset as i64 + 1),
                    priority_score: round_to(priority, 2),
                });
            }
        }
        plan
    }
}

/// Scheduling urgency: lower averages give higher priority.
pub fn priority_score(avg_score: f64) -> f64 {
    100.0 - avg_score
}

pub fn schedule(weak: &[WeakSubjectRecord]) -> Vec<StudyPlanEntry> {
    StudyPlanScheduler::default().schedule(weak)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weak(student: &str, subject: &str, avg: f64) -> WeakSubjectRecord {
        WeakSubjectRecord {
            student_id: student.to_string(),
            subject_id: subject.to_string(),
            avg_score: avg,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn lowest_average_is_scheduled_first() {
        let records = vec![weak("S00001", "SUB055", 55.0), weak("S00001", "SUB045", 45.0)];
        let plan = StudyPlanScheduler::default().schedule_from(&records, day(2024, 1, 31));

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].subject_id, "SUB045");
        assert_eq!(plan[0].priority_score, 55.0);
        assert_eq!(plan[0].scheduled_date, day(2024, 2, 1));
        assert_eq!(plan[1].subject_id, "SUB055");
        assert_eq!(plan[1].priority_score, 45.0);
        assert_eq!(plan[1].scheduled_date, day(2024, 2, 2));
        assert!(plan.iter().all(|e| e.focus_area == "Concept Revision + Practice"));
    }

    #[test]
    fn each_student_starts_tomorrow() {
        let records = vec![
            weak("S00002", "SUB001", 30.0),
            weak("S00001", "SUB001", 50.0),
            weak("S00002", "SUB002", 20.0),
        ];
        let today = day(2024, 5, 10);
        let plan = StudyPlanScheduler::default().schedule_from(&records, today);

        let s1: Vec<_> = plan.iter().filter(|e| e.student_id == "S00001").collect();
        let s2: Vec<_> = plan.iter().filter(|e| e.student_id == "S00002").collect();
        assert_eq!(s1.len(), 1);
        assert_eq!(s1[0].scheduled_date, day(2024, 5, 11));
        assert_eq!(s2.len(), 2);
        assert_eq!(s2[0].subject_id, "SUB002");
        assert_eq!(s2[0].scheduled_date, day(2024, 5, 11));
        assert_eq!(s2[1].scheduled_date, day(2024, 5, 12));
    }

    #[test]
    fn ties_keep_input_order() {
        let records = vec![
            weak("S00001", "SUB003", 40.0),
            weak("S00001", "SUB001", 40.0),
            weak("S00001", "SUB002", 40.0),
        ];
        let plan = StudyPlanScheduler::default().schedule_from(&records, day(2024, 1, 1));
        let order: Vec<&str> = plan.iter().map(|e| e.subject_id.as_str()).collect();
        assert_eq!(order, vec!["SUB003", "SUB001", "SUB002"]);
    }

    #[test]
    fn empty_input_gives_empty_plan() {
        assert!(schedule(&[]).is_empty());
    }

    #[test]
    fn custom_focus_area_is_applied() {
        let plan = StudyPlanScheduler::new("Past papers")
            .schedule_from(&[weak("S00001", "SUB001", 10.0)], day(2024, 1, 1));
        assert_eq!(plan[0].focus_area, "Past papers");
    }
}
