//! Error types for eqc-solver
//!
//! Module-specific error types using thiserror; every failure mode of the
//! search is a distinguishable variant.

use eqc_common::ExitGrade;
use std::time::Duration;
use thiserror::Error;

/// Main error type for eqc-solver
#[derive(Error, Debug)]
pub enum Error {
    /// No pattern set exists for the requested key and class count
    #[error("No {constraint} pattern set for {attribute} with {classes} classes")]
    MissingPatternSet {
        constraint: &'static str,
        attribute: String,
        classes: usize,
    },

    /// Class count is zero or exceeds the cohort size
    #[error("Cannot form {classes} classes from {students} students in grade {grade}")]
    InvalidCohortSize {
        grade: ExitGrade,
        classes: usize,
        students: usize,
    },

    /// Search budget exhausted without an acceptable partition
    #[error("Grade {grade}: no acceptable partition after {attempts} attempts ({elapsed:?})")]
    UnboundedSearch {
        grade: ExitGrade,
        attempts: u64,
        elapsed: Duration,
    },

    /// A classroom has no academic score to impute from
    #[error("Grade {grade}, classroom {classroom}: every academic score is missing")]
    AllMissingScores { grade: ExitGrade, classroom: usize },

    /// Pattern table could not be parsed or is malformed
    #[error("Pattern error: {0}")]
    Pattern(String),

    /// Roster record could not be converted
    #[error("Roster error: {0}")]
    Roster(String),

    /// Errors from eqc-common (config, model parsing)
    #[error(transparent)]
    Common(#[from] eqc_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using eqc-solver Error
pub type Result<T> = std::result::Result<T, Error>;
