//! Partition validation
//!
//! Three independent checks decide whether a candidate partition is
//! accepted; all three must pass:
//! 1. **Tolerance**: balanced attribute spreads within the policy
//! 2. **Clusters**: SPED / HCP counts match staffing patterns
//! 3. **Affinity**: race distributions match affinity patterns
//!
//! [`evaluate`] runs all three and returns a [`Verdict`] that records every
//! individual comparison, so rejected attempts can be explained.

pub mod affinity;
pub mod clusters;
pub mod tolerance;

pub use affinity::{affinity_acceptable, check_affinity, AffinityCheck, AffinityStatus};
pub use clusters::{check_clusters, clusters_acceptable, ClusterCheck};
pub use tolerance::{check_spreads, is_within, within_tolerance, SpreadCheck};

use crate::aggregate::ClassroomAggregate;
use crate::patterns::PatternBook;
use crate::Result;
use eqc_common::TolerancePolicy;
use serde::{Deserialize, Serialize};

/// Every comparison made for one candidate partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub spreads: Vec<SpreadCheck>,
    pub clusters: Vec<ClusterCheck>,
    pub affinity: Vec<AffinityCheck>,
}

impl Verdict {
    pub fn tolerances_passed(&self) -> bool {
        self.spreads.iter().all(|c| c.passed)
    }

    pub fn clusters_passed(&self) -> bool {
        self.clusters.iter().all(|c| c.accepted)
    }

    pub fn affinity_passed(&self) -> bool {
        self.affinity.iter().all(AffinityCheck::passed)
    }

    pub fn accepted(&self) -> bool {
        self.tolerances_passed() && self.clusters_passed() && self.affinity_passed()
    }

    /// Short labels of every failed comparison ("gender", "SPED", "affinity:Asian")
    pub fn failures(&self) -> Vec<String> {
        let spreads = self
            .spreads
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.attribute.to_string());
        let clusters = self
            .clusters
            .iter()
            .filter(|c| !c.accepted)
            .map(|c| format!("cluster:{}", c.attribute));
        let affinity = self
            .affinity
            .iter()
            .filter(|c| !c.passed())
            .map(|c| format!("affinity:{}", c.race));
        spreads.chain(clusters).chain(affinity).collect()
    }
}

/// Run every check on one partition's aggregates
///
/// # Errors
/// `MissingPatternSet` from the cluster or affinity tables.
pub fn evaluate(
    aggregates: &[ClassroomAggregate],
    policy: &TolerancePolicy,
    patterns: &PatternBook,
    large_group_threshold: u32,
) -> Result<Verdict> {
    Ok(Verdict {
        spreads: check_spreads(aggregates, policy),
        clusters: check_clusters(aggregates, &patterns.clusters)?,
        affinity: check_affinity(aggregates, &patterns.affinity, large_group_threshold)?,
    })
}
