//! CSV loading for the student, subject and performance tables.
//!
//! Headers and values are whitespace-trimmed. Numeric fields never fail a
//! row: unparseable values fall back to their defaults. A missing required
//! column is reported as [`AnalyticsError::MissingField`].

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{Reader, ReaderBuilder, StringRecord, Trim};

use crate::error::{AnalyticsError, Result};
use crate::models::{
    ExamType, PerformanceRecord, Student, Subject, DEFAULT_DIFFICULTY, DEFAULT_MAX_MARKS,
};

/// All three input tables, as handed to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub students: Vec<Student>,
    pub subjects: Vec<Subject>,
    pub performance: Vec<PerformanceRecord>,
}

impl Tables {
    /// Loads `students.csv`, `subjects.csv` and `performance.csv` from `dir`.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let tables = Self {
            students: load_students(dir.join("students.csv"))?,
            subjects: load_subjects(dir.join("subjects.csv"))?,
            performance: load_performance(dir.join("performance.csv"))?,
        };
        tracing::info!(
            students = tables.students.len(),
            subjects = tables.subjects.len(),
            performance = tables.performance.len(),
            dir = %dir.display(),
            "loaded input tables"
        );
        Ok(tables)
    }

    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.student_id == student_id)
    }
}

struct Columns {
    entity: &'static str,
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(entity: &'static str, headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        Self { entity, index }
    }

    fn required(&self, field: &'static str) -> Result<usize> {
        self.index.get(field).copied().ok_or(AnalyticsError::MissingField {
            entity: self.entity,
            field,
        })
    }

    fn optional(&self, field: &str) -> Option<usize> {
        self.index.get(field).copied()
    }
}

fn field(record: &StringRecord, column: Option<usize>) -> &str {
    column.and_then(|i| record.get(i)).map(str::trim).unwrap_or("")
}

fn parse_number(raw: &str, default: f64) -> f64 {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => default,
    }
}

fn parse_int(raw: &str) -> i32 {
    raw.parse::<i32>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i32))
        .unwrap_or(0)
}

fn reader<R: Read>(rdr: R) -> Reader<R> {
    ReaderBuilder::new().trim(Trim::All).flexible(true).from_reader(rdr)
}

pub fn load_students<P: AsRef<Path>>(path: P) -> Result<Vec<Student>> {
    read_students(std::fs::File::open(path)?)
}

pub fn read_students<R: Read>(source: R) -> Result<Vec<Student>> {
    let mut rdr = reader(source);
    let cols = Columns::new("students", rdr.headers()?);
    let id = cols.required("student_id")?;
    let name = cols.optional("name");
    let semester = cols.optional("current_semester");
    let branch = cols.optional("branch");

    let mut students = Vec::new();
    for result in rdr.records() {
        let record = result?;
        students.push(Student {
            student_id: field(&record, Some(id)).to_string(),
            name: field(&record, name).to_string(),
            current_semester: parse_int(field(&record, semester)),
            branch: field(&record, branch).to_string(),
        });
    }
    Ok(students)
}

pub fn load_subjects<P: AsRef<Path>>(path: P) -> Result<Vec<Subject>> {
    read_subjects(std::fs::File::open(path)?)
}

pub fn read_subjects<R: Read>(source: R) -> Result<Vec<Subject>> {
    let mut rdr = reader(source);
    let cols = Columns::new("subjects", rdr.headers()?);
    let id = cols.required("subject_id")?;
    let name = cols.optional("name");
    let semester = cols.optional("semester");
    let branch = cols.optional("branch");
    let credits = cols.optional("credits");
    let difficulty = cols.optional("difficulty_factor");
    if difficulty.is_none() {
        tracing::debug!(
            "subjects table has no difficulty_factor column, using {DEFAULT_DIFFICULTY}"
        );
    }

    let mut subjects = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let factor = parse_number(field(&record, difficulty), DEFAULT_DIFFICULTY);
        subjects.push(Subject {
            subject_id: field(&record, Some(id)).to_string(),
            name: field(&record, name).to_string(),
            semester: parse_int(field(&record, semester)),
            branch: field(&record, branch).to_string(),
            credits: parse_int(field(&record, credits)),
            difficulty_factor: if factor > 0.0 { factor } else { DEFAULT_DIFFICULTY },
        });
    }
    Ok(subjects)
}

pub fn load_performance<P: AsRef<Path>>(path: P) -> Result<Vec<PerformanceRecord>> {
    read_performance(std::fs::File::open(path)?)
}

pub fn read_performance<R: Read>(source: R) -> Result<Vec<PerformanceRecord>> {
    let mut rdr = reader(source);
    let cols = Columns::new("performance", rdr.headers()?);
    let student = cols.required("student_id")?;
    let subject = cols.required("subject_id")?;
    let exam_type = cols.optional("exam_type");
    let marks = cols.optional("marks_obtained");
    let max_marks = cols.optional("max_marks");
    let attendance = cols.optional("attendance");
    let exam_date = cols.optional("exam_date");

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let raw_date = field(&record, exam_date);
        let date = if raw_date.is_empty() {
            None
        } else {
            match NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(_) => {
                    tracing::warn!(value = raw_date, "unparseable exam_date, leaving it empty");
                    None
                }
            }
        };
        let max = parse_number(field(&record, max_marks), DEFAULT_MAX_MARKS);

        records.push(PerformanceRecord {
            student_id: field(&record, Some(student)).to_string(),
            subject_id: field(&record, Some(subject)).to_string(),
            exam_type: ExamType::from(field(&record, exam_type)),
            marks_obtained: parse_number(field(&record, marks), 0.0),
            max_marks: if max > 0.0 { max } else { DEFAULT_MAX_MARKS },
            attendance: parse_number(field(&record, attendance), 0.0),
            exam_date: date,
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn performance_values_are_trimmed_and_coerced() {
        let csv = "student_id , subject_id,exam_type,marks_obtained,max_marks,attendance,exam_date\n\
                   S00001 ,SUB001, IA1 ,abc,0, 88 ,2024-03-01\n\
                   S00002,SUB002,Lab,45,,n/a,not-a-date\n";
        let rows = read_performance(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].student_id, "S00001");
        assert_eq!(rows[0].exam_type, ExamType::IA1);
        assert_eq!(rows[0].marks_obtained, 0.0);
        assert_eq!(rows[0].max_marks, 100.0);
        assert_eq!(rows[0].attendance, 88.0);
        assert_eq!(rows[0].exam_date, NaiveDate::from_ymd_opt(2024, 3, 1));

        assert_eq!(rows[1].marks_obtained, 45.0);
        assert_eq!(rows[1].max_marks, 100.0);
        assert_eq!(rows[1].attendance, 0.0);
        assert_eq!(rows[1].exam_date, None);
    }

    #[test]
    fn missing_identifier_column_is_reported() {
        let csv = "subject_id,marks_obtained\nSUB001,40\n";
        let err = read_performance(csv.as_bytes()).unwrap_err();
        match err {
            AnalyticsError::MissingField { entity, field } => {
                assert_eq!(entity, "performance");
                assert_eq!(field, "student_id");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn subjects_without_difficulty_column_default_to_one() {
        let csv = "subject_id,name,semester,branch,credits\nSUB001,Physics I,1,CE,4\n";
        let subjects = read_subjects(csv.as_bytes()).unwrap();
        assert_eq!(subjects[0].difficulty_factor, 1.0);
        assert_eq!(subjects[0].credits, 4);
        assert_eq!(subjects[0].name, "Physics I");
    }

    #[test]
    fn students_parse_semester() {
        let csv = "student_id,name,current_semester,branch\nS00001, Ada Obi ,3,IT\n";
        let students = read_students(csv.as_bytes()).unwrap();
        assert_eq!(students[0].name, "Ada Obi");
        assert_eq!(students[0].current_semester, 3);
    }
}
