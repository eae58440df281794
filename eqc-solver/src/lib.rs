//! # Equitable Classrooms Solver
//!
//! Partitions each grade's cohort into a fixed number of classrooms so that
//! every classroom is balanced across demographic and academic attributes
//! while respecting staffing cluster and race affinity patterns.
//!
//! **Architecture:** randomized search. Each attempt shuffles the cohort,
//! splits it into contiguous near-equal rosters, imputes missing scores,
//! aggregates every roster and validates the whole partition. A rejected
//! partition is thrown away entirely and a fresh shuffle is drawn.
//!
//! Module map (leaves first):
//! - [`attributes`]: attribute kinds and comparison rules
//! - [`cohort`]: grade cohorts and class rosters
//! - [`partition`]: near-equal contiguous splitting
//! - [`aggregate`]: score imputation and per-classroom statistics
//! - [`patterns`]: administrator pattern tables
//! - [`validation`]: tolerance, cluster and affinity checks
//! - [`search`]: the bounded search loop
//! - [`roster`]: raw roster loading and grade grouping
//! - [`planner`]: class counts and multi-grade orchestration
//! - [`report`]: JSON export and console formatting

pub mod aggregate;
pub mod attributes;
pub mod cohort;
pub mod error;
pub mod partition;
pub mod patterns;
pub mod planner;
pub mod report;
pub mod roster;
pub mod search;
pub mod validation;

pub use aggregate::ClassroomAggregate;
pub use cohort::{ClassRoster, GradeCohort};
pub use error::{Error, Result};
pub use patterns::{PatternBook, PatternKey};
pub use planner::ClassPlanner;
pub use report::{CliFormatter, PlacementReport};
pub use search::{SearchBudget, SearchLoop, SearchOutcome};
