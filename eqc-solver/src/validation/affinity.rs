//! Affinity validator
//!
//! Each race's per-classroom distribution must match an approved pattern so
//! that no student is isolated without peers of the same race. Races with
//! more students in the grade than the large-group threshold are exempt.
//! Races absent from the grade are still checked (their all-zero vector must
//! be in the pattern set).

use crate::aggregate::ClassroomAggregate;
use crate::patterns::{PatternKey, PatternTable};
use crate::Result;
use eqc_common::Race;
use serde::{Deserialize, Serialize};

/// Outcome for one race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffinityStatus {
    /// Grade-wide total above the threshold
    Exempt,
    Accepted,
    Rejected,
}

/// Result of one race's pattern match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityCheck {
    pub race: Race,
    /// Students of this race across the grade
    pub total: u32,
    /// Per-classroom counts, sorted ascending
    pub counts: Vec<u32>,
    pub status: AffinityStatus,
}

impl AffinityCheck {
    pub fn passed(&self) -> bool {
        self.status != AffinityStatus::Rejected
    }
}

/// Check every race against the affinity pattern table
///
/// Returns no checks for a single classroom.
///
/// # Errors
/// `MissingPatternSet` when a non-exempt race has no set for this class count.
pub fn check_affinity(
    aggregates: &[ClassroomAggregate],
    table: &PatternTable,
    large_group_threshold: u32,
) -> Result<Vec<AffinityCheck>> {
    if aggregates.len() <= 1 {
        return Ok(Vec::new());
    }

    Race::ALL
        .iter()
        .map(|&race| {
            let mut counts: Vec<u32> = aggregates.iter().map(|agg| agg.race_count(race)).collect();
            counts.sort_unstable();
            let total: u32 = counts.iter().sum();

            let status = if total > large_group_threshold {
                AffinityStatus::Exempt
            } else if table.accepts(PatternKey::Race(race), &counts)? {
                AffinityStatus::Accepted
            } else {
                AffinityStatus::Rejected
            };

            Ok(AffinityCheck {
                race,
                total,
                counts,
                status,
            })
        })
        .collect()
}

/// True iff every race is exempt or matches an approved pattern
pub fn affinity_acceptable(
    aggregates: &[ClassroomAggregate],
    table: &PatternTable,
    large_group_threshold: u32,
) -> Result<bool> {
    Ok(check_affinity(aggregates, table, large_group_threshold)?
        .iter()
        .all(AffinityCheck::passed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::ConstraintKind;
    use crate::Error;

    fn agg(white: u32, asian: u32) -> ClassroomAggregate {
        let mut race_counts = [0; Race::COUNT];
        race_counts[Race::White.index()] = white;
        race_counts[Race::Asian.index()] = asian;
        ClassroomAggregate {
            size: (white + asian) as usize,
            gender_rate: 0.5,
            iep_rate: 0.0,
            lap_rate: 0.0,
            special_education_count: 0,
            gifted_count: 0,
            attendance_mean: None,
            academic_mean: 0.0,
            race_counts,
        }
    }

    /// Only all-zero and evenly paired distributions are approved
    fn table() -> PatternTable {
        let mut table = PatternTable::new(ConstraintKind::Affinity);
        table
            .insert(PatternKey::Shared, 2, vec![vec![0, 0], vec![2, 2], vec![0, 2]])
            .unwrap();
        table
    }

    #[test]
    fn test_total_above_threshold_is_exempt() {
        // White total 10 > 9: exempt despite an unapproved 1/9 split
        let aggregates = [agg(1, 2), agg(9, 2)];
        let checks = check_affinity(&aggregates, &table(), 9).unwrap();
        let white = checks.iter().find(|c| c.race == Race::White).unwrap();
        assert_eq!(white.total, 10);
        assert_eq!(white.status, AffinityStatus::Exempt);
        assert!(affinity_acceptable(&aggregates, &table(), 9).unwrap());
    }

    #[test]
    fn test_total_at_threshold_is_checked() {
        // White total 9 == threshold: checked, and 1/8 is not approved
        let aggregates = [agg(1, 2), agg(8, 2)];
        let checks = check_affinity(&aggregates, &table(), 9).unwrap();
        let white = checks.iter().find(|c| c.race == Race::White).unwrap();
        assert_eq!(white.status, AffinityStatus::Rejected);
        assert!(!affinity_acceptable(&aggregates, &table(), 9).unwrap());
    }

    #[test]
    fn test_absent_races_use_zero_vector() {
        let aggregates = [agg(2, 0), agg(2, 2)];
        let checks = check_affinity(&aggregates, &table(), 9).unwrap();
        let native = checks.iter().find(|c| c.race == Race::Native).unwrap();
        assert_eq!(native.counts, vec![0, 0]);
        assert_eq!(native.status, AffinityStatus::Accepted);
        assert!(affinity_acceptable(&aggregates, &table(), 9).unwrap());
    }

    #[test]
    fn test_single_class_passes_without_patterns() {
        let empty = PatternTable::new(ConstraintKind::Affinity);
        assert!(affinity_acceptable(&[agg(1, 1)], &empty, 9).unwrap());
    }

    #[test]
    fn test_missing_pattern_set_is_error() {
        let aggregates = [agg(1, 0), agg(1, 0), agg(0, 0)];
        assert!(matches!(
            affinity_acceptable(&aggregates, &table(), 9),
            Err(Error::MissingPatternSet { constraint: "affinity", classes: 3, .. })
        ));
    }

    #[test]
    fn test_exempt_race_does_not_excuse_missing_set() {
        // White is exempt, but the absent races still need a 3-class set
        let aggregates = [agg(5, 0), agg(6, 0), agg(0, 0)];
        assert!(affinity_acceptable(&aggregates, &table(), 9).is_err());
    }
}
