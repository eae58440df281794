//! Attribute model
//!
//! Declares every tracked attribute, its kind, and which check compares it
//! across classrooms:
//!
//! | Kind               | Attributes              | Check                    |
//! |--------------------|-------------------------|--------------------------|
//! | `BinaryRate`       | gender, IEP/504, LAP    | spread of rates          |
//! | `NumericMean`      | academic score          | spread of means          |
//! | `BucketedCategory` | attendance              | spread of mean bucket    |
//! | `ClusteredCount`   | SPED, HCP               | cluster pattern match    |
//! | `RaceCount`        | race                    | affinity pattern match   |

use eqc_common::{Student, TolerancePolicy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistical kind of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    /// Yes/no flag aggregated as positives / class size
    BinaryRate,
    /// Yes/no flag aggregated as a raw count
    ClusteredCount,
    /// Number aggregated as a mean over the class
    NumericMean,
    /// Ordered category aggregated as the mean category code
    BucketedCategory,
    /// Closed category set aggregated as a count vector
    RaceCount,
}

/// How aggregates of one kind are compared across classrooms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Highest minus lowest classroom value must be within tolerance
    Spread,
    /// Sorted per-classroom counts must be an approved pattern
    PatternMembership,
}

impl AttributeKind {
    pub fn comparison(&self) -> Comparison {
        match self {
            AttributeKind::BinaryRate | AttributeKind::NumericMean | AttributeKind::BucketedCategory => {
                Comparison::Spread
            }
            AttributeKind::ClusteredCount | AttributeKind::RaceCount => Comparison::PatternMembership,
        }
    }
}

/// A tracked student attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Gender,
    Iep,
    Lap,
    SpecialEducation,
    Gifted,
    Attendance,
    AcademicScore,
    Race,
}

impl Attribute {
    pub const ALL: [Attribute; 8] = [
        Attribute::Gender,
        Attribute::Iep,
        Attribute::Lap,
        Attribute::SpecialEducation,
        Attribute::Gifted,
        Attribute::Attendance,
        Attribute::AcademicScore,
        Attribute::Race,
    ];

    /// Attributes compared by spread against the tolerance policy
    pub fn balanced() -> impl Iterator<Item = Attribute> {
        Self::ALL
            .into_iter()
            .filter(|a| a.kind().comparison() == Comparison::Spread)
    }

    /// Attributes checked against the staffing cluster patterns
    ///
    /// Race is matched against its own affinity table instead.
    pub fn clustered() -> impl Iterator<Item = Attribute> {
        Self::ALL
            .into_iter()
            .filter(|a| a.kind() == AttributeKind::ClusteredCount)
    }

    pub fn is_clustered(&self) -> bool {
        Self::clustered().any(|a| a == *self)
    }

    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Gender | Attribute::Iep | Attribute::Lap => AttributeKind::BinaryRate,
            Attribute::SpecialEducation | Attribute::Gifted => AttributeKind::ClusteredCount,
            Attribute::Attendance => AttributeKind::BucketedCategory,
            Attribute::AcademicScore => AttributeKind::NumericMean,
            Attribute::Race => AttributeKind::RaceCount,
        }
    }

    /// Short key used in pattern files and reports
    pub fn key(&self) -> &'static str {
        match self {
            Attribute::Gender => "gender",
            Attribute::Iep => "iep",
            Attribute::Lap => "lap",
            Attribute::SpecialEducation => "sped",
            Attribute::Gifted => "hcp",
            Attribute::Attendance => "attendance",
            Attribute::AcademicScore => "academic",
            Attribute::Race => "race",
        }
    }

    /// Parse a pattern-file key ("sped", "hcp")
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL.into_iter().find(|a| a.key().eq_ignore_ascii_case(key))
    }

    /// Configured tolerance, for spread-compared attributes
    pub fn tolerance(&self, policy: &TolerancePolicy) -> Option<f64> {
        match self {
            Attribute::Gender => Some(policy.gender),
            Attribute::Iep => Some(policy.iep),
            Attribute::Lap => Some(policy.lap),
            Attribute::Attendance => Some(policy.attendance),
            Attribute::AcademicScore => Some(policy.academic),
            _ => None,
        }
    }

    /// Flag value for binary and clustered attributes
    pub fn flag(&self, student: &Student) -> Option<bool> {
        match self {
            Attribute::Gender => Some(student.male),
            Attribute::Iep => Some(student.section_504),
            Attribute::Lap => Some(student.lap),
            Attribute::SpecialEducation => Some(student.special_education),
            Attribute::Gifted => Some(student.gifted),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Attribute::Gender => "gender",
            Attribute::Iep => "IEP/504",
            Attribute::Lap => "LAP",
            Attribute::SpecialEducation => "SPED",
            Attribute::Gifted => "HCP",
            Attribute::Attendance => "attendance",
            Attribute::AcademicScore => "academic score",
            Attribute::Race => "race",
        };
        f.write_str(label)
    }
}
