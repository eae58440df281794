//! # Equitable Classrooms Common Library
//!
//! Shared code for the classroom balancing workspace:
//! - Student domain model (grades, races, attendance buckets)
//! - Error types
//! - Configuration loading (TOML) and tolerance policy

pub mod config;
pub mod error;
pub mod student;

pub use config::{SolverConfig, TolerancePolicy};
pub use error::{Error, Result};
pub use student::{AttendanceBucket, ExitGrade, Race, Student};
