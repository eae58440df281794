//! Report generation and formatting
//!
//! **Purpose:** JSON export of next year's classes and console output for
//! the administrator.
//!
//! Classrooms are exported as student ids plus their aggregate; imputed
//! academic scores stay internal to the search and never reach the output.

use crate::aggregate::ClassroomAggregate;
use crate::attributes::Attribute;
use crate::search::{Exhaustion, Placement};
use crate::Result;
use chrono::{DateTime, Utc};
use eqc_common::{ExitGrade, Race, TolerancePolicy};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete placement run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementReport {
    /// Run start timestamp
    pub timestamp: DateTime<Utc>,

    /// Seed that reproduces this run
    pub seed: u64,

    /// Tolerances the classes were balanced with
    pub tolerances: TolerancePolicy,

    /// Affinity exemption threshold
    pub large_group_threshold: u32,

    /// One entry per grade, KG first
    pub grades: Vec<GradeReport>,
}

/// Accepted classes of one grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    pub exit_grade: ExitGrade,

    /// Grade the students enter next year
    pub incoming_grade: u8,

    /// Attempts the search needed
    pub attempts: u64,

    pub elapsed_ms: u64,

    pub classrooms: Vec<ClassroomReport>,
}

/// One classroom of next year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassroomReport {
    pub student_ids: Vec<String>,
    pub aggregate: ClassroomAggregate,
}

impl GradeReport {
    pub fn from_placement(placement: &Placement) -> Self {
        Self {
            exit_grade: placement.grade,
            incoming_grade: placement.grade.incoming_grade(),
            attempts: placement.attempts,
            elapsed_ms: u64::try_from(placement.elapsed.as_millis()).unwrap_or(u64::MAX),
            classrooms: placement
                .rosters
                .iter()
                .zip(&placement.aggregates)
                .map(|(roster, aggregate)| ClassroomReport {
                    student_ids: roster.student_ids(),
                    aggregate: aggregate.clone(),
                })
                .collect(),
        }
    }

    pub fn student_count(&self) -> usize {
        self.classrooms.iter().map(|c| c.student_ids.len()).sum()
    }
}

impl PlacementReport {
    /// Create a report for a finished run
    pub fn new(
        seed: u64,
        tolerances: TolerancePolicy,
        large_group_threshold: u32,
        placements: &[Placement],
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            seed,
            tolerances,
            large_group_threshold,
            grades: placements.iter().map(GradeReport::from_placement).collect(),
        }
    }

    /// Export report to a pretty-printed JSON file
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Import report from JSON file
    pub fn import_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let report: PlacementReport = serde_json::from_reader(file)?;
        Ok(report)
    }
}

/// CLI formatter for placement results
pub struct CliFormatter;

impl CliFormatter {
    /// Format one grade as a table of classrooms
    pub fn format_grade(grade: &GradeReport) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "\nGrade {} (exiting {}): {} students in {} classes, {} attempts, {} ms\n",
            grade.incoming_grade,
            grade.exit_grade,
            grade.student_count(),
            grade.classrooms.len(),
            grade.attempts,
            grade.elapsed_ms
        ));
        output.push_str("Class  Size  Male   IEP    LAP    SPED  HCP  Attend  Score\n");

        for (i, classroom) in grade.classrooms.iter().enumerate() {
            let agg = &classroom.aggregate;
            let attendance = agg
                .attendance_mean
                .map(|mean| format!("{:6.2}", mean))
                .unwrap_or_else(|| format!("{:>6}", "-"));
            output.push_str(&format!(
                "{:5}  {:4}  {:5.2}  {:5.2}  {:5.2}  {:4}  {:3}  {}  {:7.1}\n",
                i + 1,
                agg.size,
                agg.gender_rate,
                agg.iep_rate,
                agg.lap_rate,
                agg.special_education_count,
                agg.gifted_count,
                attendance,
                agg.academic_mean
            ));
        }

        let races: Vec<String> = Race::ALL
            .iter()
            .map(|&race| {
                let counts: Vec<String> = grade
                    .classrooms
                    .iter()
                    .map(|c| c.aggregate.race_count(race).to_string())
                    .collect();
                format!("{} {}", race, counts.join("/"))
            })
            .collect();
        output.push_str(&format!("Race per class: {}\n", races.join(", ")));
        output
    }

    /// Format the closing summary restating the tolerances
    pub fn format_summary(report: &PlacementReport) -> String {
        let tol = &report.tolerances;
        let percent = |value: f64| format!("{}%", value * 100.0);

        let mut output = String::new();
        output.push_str("\nYour classes have been formed with the following tolerances:\n");
        output.push_str(&format!(
            "- Every class within each grade has within {} the same share of boys.\n",
            percent(tol.gender)
        ));
        output.push_str(&format!(
            "- Every class within each grade has within {} the same share of students with an IEP/504 plan.\n",
            percent(tol.iep)
        ));
        output.push_str(&format!(
            "- Every class within each grade has within {} the same share of students with a LAP indicator.\n",
            percent(tol.lap)
        ));
        output.push_str(&format!(
            "- With attendance grouped as above 90%, 80-90% and below 80%, every class's mean attendance category is within {}.\n",
            tol.attendance
        ));
        output.push_str(&format!(
            "- Every class's mean standardized test score is within {} points of the others.\n",
            tol.academic
        ));
        output.push_str(&format!(
            "- {} and {} students are clustered per the cluster file; races with at most {} students in a grade follow the affinity file.\n",
            Attribute::SpecialEducation,
            Attribute::Gifted,
            report.large_group_threshold
        ));
        output.push_str(&format!("Seed: {} (rerun with --seed {} to reproduce)\n", report.seed, report.seed));
        output
    }

    /// Format a grade whose search ran out of budget
    pub fn format_exhaustion(exhaustion: &Exhaustion) -> String {
        let mut output = format!(
            "Grade {} ({} classes): no acceptable classes after {} attempts in {:.1}s\n",
            exhaustion.grade,
            exhaustion.classes,
            exhaustion.attempts,
            exhaustion.elapsed.as_secs_f64()
        );
        output.push_str("Checks that failed most often:\n");
        for (check, count) in exhaustion.most_failed().into_iter().take(5) {
            let share = if exhaustion.attempts == 0 {
                0.0
            } else {
                count as f64 / exhaustion.attempts as f64 * 100.0
            };
            output.push_str(&format!("  {:<24} {:>10} ({:.1}% of attempts)\n", check, count, share));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::ClassRoster;
    use crate::validation::Verdict;
    use eqc_common::Student;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn aggregate(size: usize, white: u32) -> ClassroomAggregate {
        let mut race_counts = [0; Race::COUNT];
        race_counts[Race::White.index()] = white;
        ClassroomAggregate {
            size,
            gender_rate: 0.5,
            iep_rate: 0.1,
            lap_rate: 0.0,
            special_education_count: 2,
            gifted_count: 0,
            attendance_mean: Some(1.25),
            academic_mean: 312.5,
            race_counts,
        }
    }

    fn create_test_placement() -> Placement {
        let roster = |ids: &[&str]| {
            ClassRoster::new(
                ids.iter()
                    .map(|id| Student::new(*id, ExitGrade::Second, Race::White))
                    .collect(),
            )
        };
        Placement {
            grade: ExitGrade::Second,
            rosters: vec![roster(&["a", "b"]), roster(&["c"])],
            aggregates: vec![aggregate(2, 2), aggregate(1, 1)],
            verdict: Verdict {
                spreads: Vec::new(),
                clusters: Vec::new(),
                affinity: Vec::new(),
            },
            attempts: 17,
            elapsed: Duration::from_millis(42),
        }
    }

    fn create_test_report() -> PlacementReport {
        PlacementReport::new(2021, TolerancePolicy::default(), 9, &[create_test_placement()])
    }

    #[test]
    fn test_create_report() {
        let report = create_test_report();
        assert_eq!(report.seed, 2021);
        assert_eq!(report.grades.len(), 1);

        let grade = &report.grades[0];
        assert_eq!(grade.incoming_grade, 3);
        assert_eq!(grade.attempts, 17);
        assert_eq!(grade.elapsed_ms, 42);
        assert_eq!(grade.student_count(), 3);
        assert_eq!(grade.classrooms[0].student_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_json_export_import() {
        let report = create_test_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.json");

        report.export_json(&path).unwrap();
        let imported = PlacementReport::import_json(&path).unwrap();

        assert_eq!(imported, report);
    }

    #[test]
    fn test_format_grade() {
        let report = create_test_report();
        let output = CliFormatter::format_grade(&report.grades[0]);

        assert!(output.contains("Grade 3 (exiting 02): 3 students in 2 classes"));
        assert!(output.contains("312.5"));
        assert!(output.contains("White 2/1"));
    }

    #[test]
    fn test_format_summary_uses_percentages() {
        let output = CliFormatter::format_summary(&create_test_report());
        assert!(output.contains("within 20% the same share of boys"));
        assert!(output.contains("within 25% the same share of students with a LAP"));
        assert!(output.contains("--seed 2021"));
    }

    #[test]
    fn test_format_exhaustion_ranks_checks() {
        let exhaustion = Exhaustion {
            grade: ExitGrade::Kindergarten,
            classes: 3,
            attempts: 200,
            elapsed: Duration::from_secs(2),
            failure_tally: BTreeMap::from([("gender".to_string(), 50), ("cluster:SPED".to_string(), 150)]),
        };
        let output = CliFormatter::format_exhaustion(&exhaustion);

        assert!(output.contains("after 200 attempts"));
        let sped = output.find("cluster:SPED").unwrap();
        let gender = output.find("gender").unwrap();
        assert!(sped < gender);
        assert!(output.contains("75.0% of attempts"));
    }
}
