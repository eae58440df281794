//! Aggregate calculator
//!
//! Derives per-classroom statistics from a roster:
//! - binary-rate attributes: positives / class size
//! - clustered attributes: raw counts
//! - academic score: mean after classroom-local imputation
//! - attendance: mean bucket code over classified students
//! - race: count vector over every race, zero-filled
//!
//! Imputation replaces each missing score with the mean of the known scores
//! in the same classroom. The replacement is permanent: rosters returned by
//! the search carry the imputed values, and the original gaps are not
//! recoverable from them.

use crate::attributes::Attribute;
use crate::cohort::ClassRoster;
use crate::{Error, Result};
use eqc_common::{ExitGrade, Race};
use serde::{Deserialize, Serialize};

/// Summary statistics for one classroom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassroomAggregate {
    pub size: usize,
    pub gender_rate: f64,
    pub iep_rate: f64,
    pub lap_rate: f64,
    pub special_education_count: u32,
    pub gifted_count: u32,
    /// Mean bucket code; `None` when no student has classified attendance
    pub attendance_mean: Option<f64>,
    pub academic_mean: f64,
    /// Indexed by [`Race::index`]
    pub race_counts: [u32; Race::COUNT],
}

impl ClassroomAggregate {
    /// Value compared by the tolerance checker
    pub fn balanced_value(&self, attribute: Attribute) -> Option<f64> {
        match attribute {
            Attribute::Gender => Some(self.gender_rate),
            Attribute::Iep => Some(self.iep_rate),
            Attribute::Lap => Some(self.lap_rate),
            Attribute::Attendance => self.attendance_mean,
            Attribute::AcademicScore => Some(self.academic_mean),
            _ => None,
        }
    }

    /// Count compared by the cluster validator
    pub fn cluster_count(&self, attribute: Attribute) -> Option<u32> {
        match attribute {
            Attribute::SpecialEducation => Some(self.special_education_count),
            Attribute::Gifted => Some(self.gifted_count),
            _ => None,
        }
    }

    pub fn race_count(&self, race: Race) -> u32 {
        self.race_counts[race.index()]
    }
}

/// Fill missing academic scores with the classroom mean
///
/// # Errors
/// `AllMissingScores` when no student in the roster has a score.
// TODO: switch strategy once administrators decide between the classroom
// mean, the grade mean, or a penalizing low score for missing records.
pub fn impute_missing_scores(roster: &ClassRoster, grade: ExitGrade, classroom: usize) -> Result<ClassRoster> {
    let known: Vec<f64> = roster
        .students()
        .iter()
        .filter_map(|s| s.academic_score)
        .collect();

    if known.len() == roster.len() {
        return Ok(roster.clone());
    }
    if known.is_empty() {
        return Err(Error::AllMissingScores { grade, classroom });
    }

    let mean = known.iter().sum::<f64>() / known.len() as f64;
    let students = roster
        .students()
        .iter()
        .map(|s| {
            let mut student = s.clone();
            if student.academic_score.is_none() {
                student.academic_score = Some(mean);
            }
            student
        })
        .collect();
    Ok(ClassRoster::new(students))
}

/// Compute the aggregate of an imputed roster
///
/// # Errors
/// `AllMissingScores` if a score is still missing (roster not imputed, or
/// empty roster).
pub fn aggregate(roster: &ClassRoster, grade: ExitGrade, classroom: usize) -> Result<ClassroomAggregate> {
    let students = roster.students();
    let size = students.len();
    if size == 0 {
        return Err(Error::AllMissingScores { grade, classroom });
    }

    let rate = |attribute: Attribute| {
        let positives = students
            .iter()
            .filter(|s| attribute.flag(s).unwrap_or(false))
            .count();
        positives as f64 / size as f64
    };
    let count = |attribute: Attribute| {
        students
            .iter()
            .filter(|s| attribute.flag(s).unwrap_or(false))
            .count() as u32
    };

    let mut score_sum = 0.0;
    for student in students {
        match student.academic_score {
            Some(score) => score_sum += score,
            None => return Err(Error::AllMissingScores { grade, classroom }),
        }
    }

    let buckets: Vec<f64> = students
        .iter()
        .filter_map(|s| s.attendance.map(|b| f64::from(b.code())))
        .collect();
    let attendance_mean = if buckets.is_empty() {
        None
    } else {
        Some(buckets.iter().sum::<f64>() / buckets.len() as f64)
    };

    let mut race_counts = [0u32; Race::COUNT];
    for student in students {
        race_counts[student.race.index()] += 1;
    }

    Ok(ClassroomAggregate {
        size,
        gender_rate: rate(Attribute::Gender),
        iep_rate: rate(Attribute::Iep),
        lap_rate: rate(Attribute::Lap),
        special_education_count: count(Attribute::SpecialEducation),
        gifted_count: count(Attribute::Gifted),
        attendance_mean,
        academic_mean: score_sum / size as f64,
        race_counts,
    })
}
