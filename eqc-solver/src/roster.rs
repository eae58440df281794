//! Roster loading
//!
//! Reads the school information system export (a JSON array of records with
//! the export's string conventions) and converts it into cleaned
//! [`Student`] values grouped into one [`GradeCohort`] per exit grade.
//!
//! **Conversion rules:**
//! - every string is trimmed
//! - `sped` is set only when the value is exactly "Yes"
//! - `hcp`, `504` and `lap_indicator` are set when the value contains "Yes"
//! - gender is male when the value contains "Male"
//! - attendance accepts "93.5%" or a number and is bucketed once, here

use crate::cohort::GradeCohort;
use crate::{Error, Result};
use eqc_common::{AttendanceBucket, ExitGrade, Race, Student};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// A JSON scalar that may be written as text or as a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextOrNumber {
    Number(serde_json::Number),
    Text(String),
}

impl TextOrNumber {
    fn as_text(&self) -> String {
        match self {
            TextOrNumber::Number(n) => n.to_string(),
            TextOrNumber::Text(s) => s.trim().to_string(),
        }
    }
}

/// One student as exported by the school information system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStudentRecord {
    pub student_id: TextOrNumber,
    pub grade: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default, alias = "504")]
    pub section_504: String,
    #[serde(default)]
    pub lap_indicator: String,
    #[serde(default)]
    pub sped: String,
    #[serde(default)]
    pub hcp: String,
    #[serde(default)]
    pub attendance: Option<TextOrNumber>,
    #[serde(default)]
    pub academic_score: Option<f64>,
    pub race: String,
}

impl RawStudentRecord {
    /// Convert to the canonical student representation
    pub fn to_student(&self) -> Result<Student> {
        let id = self.student_id.as_text();
        let context = |what: &str, e: eqc_common::Error| Error::Roster(format!("student {}: {}: {}", id, what, e));

        let grade: ExitGrade = self.grade.parse().map_err(|e| context("grade", e))?;
        let race: Race = self.race.parse().map_err(|e| context("race", e))?;
        let attendance = match &self.attendance {
            Some(raw) => parse_attendance(raw)
                .map_err(|msg| Error::Roster(format!("student {}: attendance: {}", id, msg)))?,
            None => None,
        };
        let academic_score = self.academic_score.filter(|score| score.is_finite());

        Ok(Student {
            id: id.clone(),
            grade,
            male: self.gender.trim().contains("Male"),
            section_504: self.section_504.trim().contains("Yes"),
            lap: self.lap_indicator.trim().contains("Yes"),
            special_education: self.sped.trim() == "Yes",
            gifted: self.hcp.trim().contains("Yes"),
            attendance,
            academic_score,
            race,
        })
    }
}

/// Parse "93.5%", "93.5" or 93.5 and bucket it
///
/// An empty string means no attendance was recorded.
fn parse_attendance(raw: &TextOrNumber) -> std::result::Result<Option<AttendanceBucket>, String> {
    let percent = match raw {
        TextOrNumber::Number(n) => n.as_f64().ok_or_else(|| format!("'{}' is not a number", n))?,
        TextOrNumber::Text(s) => {
            let cleaned = s.replace('%', "");
            let cleaned = cleaned.trim();
            if cleaned.is_empty() {
                return Ok(None);
            }
            cleaned
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a percentage", s))?
        }
    };
    Ok(AttendanceBucket::from_percentage(percent))
}

/// Parse a JSON roster document into students
///
/// # Errors
/// `Roster` for unconvertible records or duplicate student ids.
pub fn parse_roster(json: &str) -> Result<Vec<Student>> {
    let records: Vec<RawStudentRecord> = serde_json::from_str(json)?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut students = Vec::with_capacity(records.len());
    for record in &records {
        let student = record.to_student()?;
        if !seen.insert(student.id.clone()) {
            return Err(Error::Roster(format!("duplicate student id {}", student.id)));
        }
        students.push(student);
    }

    let unclassified = students.iter().filter(|s| s.attendance.is_none()).count();
    let missing_scores = students.iter().filter(|s| s.academic_score.is_none()).count();
    debug!(
        students = students.len(),
        unclassified_attendance = unclassified,
        missing_scores,
        "Roster converted"
    );
    Ok(students)
}

/// Read and convert a roster file
pub fn load_roster(path: &Path) -> Result<Vec<Student>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Roster(format!("cannot read roster {}: {}", path.display(), e)))?;
    let students = parse_roster(&content)?;
    info!("Loaded {} students from {}", students.len(), path.display());
    Ok(students)
}

/// Group students into cohorts, ordered KG first
///
/// Grades without students produce no cohort.
pub fn group_by_grade(students: Vec<Student>) -> Result<Vec<GradeCohort>> {
    let mut by_grade: BTreeMap<ExitGrade, Vec<Student>> = BTreeMap::new();
    for student in students {
        by_grade.entry(student.grade).or_default().push(student);
    }

    by_grade
        .into_iter()
        .map(|(grade, students)| {
            info!(
                "There are {} students coming into grade {} next year",
                students.len(),
                grade.incoming_grade()
            );
            GradeCohort::new(grade, students)
        })
        .collect()
}
