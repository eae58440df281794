//! Student domain model
//!
//! Canonical, already-cleaned representation of one student record. Raw
//! school-information-system strings are converted into these types by the
//! roster loader in `eqc-solver`; everything downstream works only with the
//! closed sets defined here.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Grade a student is finishing this year
///
/// The school export lists the *previous* grade; students move to
/// [`ExitGrade::incoming_grade`] next year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExitGrade {
    #[serde(rename = "KG")]
    Kindergarten,
    #[serde(rename = "01")]
    First,
    #[serde(rename = "02")]
    Second,
    #[serde(rename = "03")]
    Third,
    #[serde(rename = "04")]
    Fourth,
    #[serde(rename = "05")]
    Fifth,
}

impl ExitGrade {
    /// All exit grades in ascending order
    pub const ALL: [ExitGrade; 6] = [
        ExitGrade::Kindergarten,
        ExitGrade::First,
        ExitGrade::Second,
        ExitGrade::Third,
        ExitGrade::Fourth,
        ExitGrade::Fifth,
    ];

    /// Code used by the school export ("KG", "01" .. "05")
    pub fn code(&self) -> &'static str {
        match self {
            ExitGrade::Kindergarten => "KG",
            ExitGrade::First => "01",
            ExitGrade::Second => "02",
            ExitGrade::Third => "03",
            ExitGrade::Fourth => "04",
            ExitGrade::Fifth => "05",
        }
    }

    /// Zero-based position (KG = 0)
    pub fn ordinal(&self) -> u8 {
        match self {
            ExitGrade::Kindergarten => 0,
            ExitGrade::First => 1,
            ExitGrade::Second => 2,
            ExitGrade::Third => 3,
            ExitGrade::Fourth => 4,
            ExitGrade::Fifth => 5,
        }
    }

    /// Grade the cohort enters next year (KG → 1, 05 → 6)
    pub fn incoming_grade(&self) -> u8 {
        self.ordinal() + 1
    }
}

impl fmt::Display for ExitGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ExitGrade {
    type Err = Error;

    /// Accepts the export codes plus unpadded digits ("1" for "01")
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KG" | "K" => Ok(ExitGrade::Kindergarten),
            "01" | "1" => Ok(ExitGrade::First),
            "02" | "2" => Ok(ExitGrade::Second),
            "03" | "3" => Ok(ExitGrade::Third),
            "04" | "4" => Ok(ExitGrade::Fourth),
            "05" | "5" => Ok(ExitGrade::Fifth),
            other => Err(Error::InvalidInput(format!("unknown grade code '{}'", other))),
        }
    }
}

/// Race categories defined by the school information system
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Race {
    Asian,
    Black,
    Hispanic,
    Native,
    Multiple,
    #[serde(rename = "Pacific Islander")]
    PacificIslander,
    White,
}

impl Race {
    /// Number of race categories
    pub const COUNT: usize = 7;

    /// All races, in count-vector order
    pub const ALL: [Race; Race::COUNT] = [
        Race::Asian,
        Race::Black,
        Race::Hispanic,
        Race::Native,
        Race::Multiple,
        Race::PacificIslander,
        Race::White,
    ];

    /// Position of this race in a race count vector
    pub fn index(&self) -> usize {
        match self {
            Race::Asian => 0,
            Race::Black => 1,
            Race::Hispanic => 2,
            Race::Native => 3,
            Race::Multiple => 4,
            Race::PacificIslander => 5,
            Race::White => 6,
        }
    }

    /// Name as spelled in the school export
    pub fn name(&self) -> &'static str {
        match self {
            Race::Asian => "Asian",
            Race::Black => "Black",
            Race::Hispanic => "Hispanic",
            Race::Native => "Native",
            Race::Multiple => "Multiple",
            Race::PacificIslander => "Pacific Islander",
            Race::White => "White",
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Race {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Race::ALL
            .iter()
            .copied()
            .find(|race| race.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidInput(format!("unknown race '{}'", wanted)))
    }
}

/// Historical attendance category
///
/// Kept as its own type so a bucket is never fed back into
/// [`AttendanceBucket::from_percentage`] or averaged as a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttendanceBucket {
    /// Attendance above 90%
    AboveNinety,
    /// Attendance in (80%, 90%]
    EightyToNinety,
    /// Attendance in (3%, 80%]
    BelowEighty,
}

impl AttendanceBucket {
    /// Bucket a raw attendance percentage
    ///
    /// Returns `None` for values at or below 3% (and NaN): those are treated
    /// as missing data rather than real attendance.
    pub fn from_percentage(percent: f64) -> Option<Self> {
        if percent > 90.0 {
            Some(AttendanceBucket::AboveNinety)
        } else if percent > 80.0 {
            Some(AttendanceBucket::EightyToNinety)
        } else if percent > 3.0 {
            Some(AttendanceBucket::BelowEighty)
        } else {
            None
        }
    }

    /// Ordinal code used when averaging buckets across a classroom
    pub fn code(&self) -> u8 {
        match self {
            AttendanceBucket::AboveNinety => 0,
            AttendanceBucket::EightyToNinety => 1,
            AttendanceBucket::BelowEighty => 2,
        }
    }
}

/// One cleaned student record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// Stable student identifier from the school export
    pub id: String,
    pub grade: ExitGrade,
    /// Binary gender flag (true = male)
    pub male: bool,
    /// IEP / "504" accommodation plan
    pub section_504: bool,
    /// Learning assistance program indicator
    pub lap: bool,
    /// Special education enrollment (clustered)
    pub special_education: bool,
    /// Highly capable program enrollment (clustered)
    pub gifted: bool,
    /// `None` when attendance could not be classified
    pub attendance: Option<AttendanceBucket>,
    /// Standardized assessment score, `None` when missing
    pub academic_score: Option<f64>,
    pub race: Race,
}

impl Student {
    /// Create a student with every flag cleared and no attendance or score
    pub fn new(id: impl Into<String>, grade: ExitGrade, race: Race) -> Self {
        Self {
            id: id.into(),
            grade,
            male: false,
            section_504: false,
            lap: false,
            special_education: false,
            gifted: false,
            attendance: None,
            academic_score: None,
            race,
        }
    }

    pub fn with_male(mut self, male: bool) -> Self {
        self.male = male;
        self
    }

    pub fn with_section_504(mut self, flag: bool) -> Self {
        self.section_504 = flag;
        self
    }

    pub fn with_lap(mut self, flag: bool) -> Self {
        self.lap = flag;
        self
    }

    pub fn with_special_education(mut self, flag: bool) -> Self {
        self.special_education = flag;
        self
    }

    pub fn with_gifted(mut self, flag: bool) -> Self {
        self.gifted = flag;
        self
    }

    pub fn with_attendance(mut self, bucket: Option<AttendanceBucket>) -> Self {
        self.attendance = bucket;
        self
    }

    pub fn with_academic_score(mut self, score: Option<f64>) -> Self {
        self.academic_score = score;
        self
    }
}
