//! Tolerance checker
//!
//! For each balanced attribute, the spread (highest minus lowest classroom
//! value) must be within the configured tolerance. The comparison is
//! boundary inclusive and allows for floating-point rounding, so rates of
//! 0.20 and 0.40 pass a 0.20 tolerance even though `0.4 - 0.2` need not be
//! exactly representable.

use crate::aggregate::ClassroomAggregate;
use crate::attributes::Attribute;
use eqc_common::TolerancePolicy;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relative rounding allowance added to every tolerance
pub const CLOSENESS_EPSILON: f64 = 1e-9;

/// Inclusive closeness test: `|a - b| <= tolerance` up to rounding
pub fn is_within(a: f64, b: f64, tolerance: f64) -> bool {
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= tolerance + CLOSENESS_EPSILON * scale
}

/// Result of one attribute's spread comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadCheck {
    pub attribute: Attribute,
    pub min: f64,
    pub max: f64,
    pub tolerance: f64,
    pub passed: bool,
}

impl SpreadCheck {
    pub fn spread(&self) -> f64 {
        self.max - self.min
    }
}

/// Compare every balanced attribute across the classrooms
///
/// Only attendance can lack a value: a classroom with no classified
/// attendance bucket is left out of the attendance spread, and the others
/// are still compared with each other. When no classroom has a value the
/// attribute is omitted.
pub fn check_spreads(aggregates: &[ClassroomAggregate], policy: &TolerancePolicy) -> Vec<SpreadCheck> {
    Attribute::balanced()
        .filter_map(|attribute| {
            let tolerance = attribute.tolerance(policy)?;
            let values: Vec<f64> = aggregates
                .iter()
                .filter_map(|agg| agg.balanced_value(attribute))
                .collect();
            if values.len() < aggregates.len() {
                debug!(
                    attribute = %attribute,
                    skipped = aggregates.len() - values.len(),
                    classrooms = aggregates.len(),
                    "Classrooms without a value left out of the spread"
                );
            }
            let min = values.iter().copied().reduce(f64::min)?;
            let max = values.iter().copied().reduce(f64::max)?;
            Some(SpreadCheck {
                attribute,
                min,
                max,
                tolerance,
                passed: is_within(max, min, tolerance),
            })
        })
        .collect()
}

/// True iff every balanced attribute is within tolerance
pub fn within_tolerance(aggregates: &[ClassroomAggregate], policy: &TolerancePolicy) -> bool {
    check_spreads(aggregates, policy).iter().all(|check| check.passed)
}
