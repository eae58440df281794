//! Partitioner
//!
//! Splits a cohort, in its current order, into `k` contiguous groups as
//! equal in size as possible. When the cohort size is not divisible by `k`,
//! the first `n mod k` groups get one extra student.
//!
//! Randomness is not applied here: callers shuffle the cohort first
//! (see [`GradeCohort::shuffled`]).

use crate::cohort::{ClassRoster, GradeCohort};
use crate::Result;

/// Sizes of the `k` groups for `n` students
///
/// Caller guarantees `k >= 1`.
pub fn group_sizes(n: usize, k: usize) -> Vec<usize> {
    let base = n / k;
    let extra = n % k;
    (0..k).map(|i| if i < extra { base + 1 } else { base }).collect()
}

/// Split `cohort` into exactly `classes` rosters
///
/// # Errors
/// `InvalidCohortSize` when `classes` is 0 or larger than the cohort.
pub fn partition(cohort: &GradeCohort, classes: usize) -> Result<Vec<ClassRoster>> {
    cohort.check_class_count(classes)?;

    let students = cohort.students();
    let mut rosters = Vec::with_capacity(classes);
    let mut start = 0;
    for size in group_sizes(students.len(), classes) {
        let end = start + size;
        rosters.push(ClassRoster::new(students[start..end].to_vec()));
        start = end;
    }
    Ok(rosters)
}
