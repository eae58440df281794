//! Cluster validator
//!
//! Special education and highly capable students are staffed in clusters:
//! the ascending-sorted per-classroom counts must be one of the approved
//! patterns for the grade's class count. A single classroom has nothing to
//! cluster and always passes.

use crate::aggregate::ClassroomAggregate;
use crate::attributes::Attribute;
use crate::patterns::{PatternKey, PatternTable};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Result of one clustered attribute's pattern match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCheck {
    pub attribute: Attribute,
    /// Per-classroom counts, sorted ascending
    pub counts: Vec<u32>,
    pub accepted: bool,
}

/// Check every clustered attribute against the pattern table
///
/// Returns no checks for a single classroom.
///
/// # Errors
/// `MissingPatternSet` when the table has no set for this class count.
pub fn check_clusters(aggregates: &[ClassroomAggregate], table: &PatternTable) -> Result<Vec<ClusterCheck>> {
    if aggregates.len() <= 1 {
        return Ok(Vec::new());
    }

    Attribute::clustered()
        .map(|attribute| {
            let mut counts: Vec<u32> = aggregates
                .iter()
                .filter_map(|agg| agg.cluster_count(attribute))
                .collect();
            counts.sort_unstable();
            let accepted = table.accepts(PatternKey::Attribute(attribute), &counts)?;
            Ok(ClusterCheck {
                attribute,
                counts,
                accepted,
            })
        })
        .collect()
}

/// True iff every clustered attribute matches an approved pattern
pub fn clusters_acceptable(aggregates: &[ClassroomAggregate], table: &PatternTable) -> Result<bool> {
    Ok(check_clusters(aggregates, table)?.iter().all(|check| check.accepted))
}
