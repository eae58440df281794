//! End-to-end tests: files on disk → roster → planner → report

use eqc_common::{ExitGrade, SolverConfig};
use eqc_solver::cohort::GradeCohort;
use eqc_solver::planner::{resolve_class_counts, ClassPlanner};
use eqc_solver::report::{CliFormatter, PlacementReport};
use eqc_solver::roster::{group_by_grade, load_roster};
use eqc_solver::{Error, PatternBook};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Pattern file accepting every ascending vector summing to at most `max_total`
fn lenient_pattern_file(max_total: u32) -> String {
    fn extend(prefix: &mut Vec<u32>, classes: usize, remaining: u32, out: &mut Vec<Vec<u32>>) {
        if prefix.len() == classes {
            out.push(prefix.clone());
            return;
        }
        let floor = prefix.last().copied().unwrap_or(0);
        for next in floor..=remaining {
            prefix.push(next);
            extend(prefix, classes, remaining - next, out);
            prefix.pop();
        }
    }

    let mut content = String::new();
    for classes in 2..=3 {
        let mut patterns = Vec::new();
        extend(&mut Vec::new(), classes, max_total, &mut patterns);
        content.push_str(&format!(
            "[[pattern_set]]\nclasses = {}\npatterns = {:?}\n\n",
            classes, patterns
        ));
    }
    content
}

fn roster_json() -> String {
    let races = ["White", "Asian", "Hispanic", "Black", "Multiple"];
    let grades = ["KG", "01"];
    let records: Vec<_> = (0..36)
        .map(|i| {
            json!({
                "student_id": format!("{}", 5000 + i),
                "grade": grades[i % 2],
                "gender": if i % 4 < 2 { "Male" } else { "Female" },
                "504": if i % 9 == 0 { "Yes" } else { "No" },
                "lap_indicator": if i % 6 == 0 { "Yes" } else { "No" },
                "sped": if i % 11 == 0 { "Yes" } else { "No" },
                "hcp": "No",
                "attendance": format!("{}%", 78 + (i * 7) % 22),
                "academic_score": if i == 3 { None } else { Some(2.0 + (i % 5) as f64 * 0.25) },
                "race": races[i % races.len()],
            })
        })
        .collect();
    serde_json::to_string_pretty(&records).unwrap()
}

/// Write config, roster and pattern files into a temp directory
fn write_fixture(dir: &Path, extra_config: &str) -> std::path::PathBuf {
    std::fs::write(dir.join("roster.json"), roster_json()).unwrap();
    std::fs::write(dir.join("clusters.toml"), lenient_pattern_file(12)).unwrap();
    std::fs::write(dir.join("affinity.toml"), lenient_pattern_file(12)).unwrap();

    let config = format!(
        r#"
seed = 99
roster = "roster.json"
output = "classes.json"

[tolerances]
gender = 0.5
lap = 0.5
attendance = 2.0
academic = 5.0

[search]
max_attempts = 20000

[patterns]
clusters = "clusters.toml"
affinity = "affinity.toml"

{}
"#,
        extra_config
    );
    let path = dir.join("config.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn no_prompt() -> Option<fn(&GradeCohort) -> eqc_solver::Result<usize>> {
    None
}

#[tokio::test]
async fn test_pipeline_from_files_to_report() {
    let dir = TempDir::new().unwrap();
    let config_path = write_fixture(dir.path(), "[classes]\nKG = 2\n\"01\" = 3\n");

    let config = SolverConfig::from_file(&config_path).unwrap();
    config.validate().unwrap();

    let roster_path = config.resolve_path(config.roster.as_deref().unwrap());
    let cohorts = group_by_grade(load_roster(&roster_path).unwrap()).unwrap();
    assert_eq!(cohorts.len(), 2);
    assert_eq!(cohorts[0].len(), 18);

    let patterns = PatternBook::load(
        &config.resolve_path(&config.patterns.clusters),
        &config.resolve_path(&config.patterns.affinity),
    )
    .unwrap();
    let counts = resolve_class_counts(&config, &[], &cohorts, no_prompt()).unwrap();
    assert_eq!(counts[&ExitGrade::First], 3);

    let seed = config.seed.unwrap();
    let planner = ClassPlanner::from_config(&config, Arc::new(patterns), seed);
    let placements = planner.solve_all(cohorts, &counts).await.unwrap();

    let report = PlacementReport::new(seed, config.tolerances, config.large_group_threshold, &placements);
    assert_eq!(report.grades.len(), 2);
    assert_eq!(report.grades[0].classrooms.len(), 2);
    assert_eq!(report.grades[1].classrooms.len(), 3);
    assert_eq!(report.grades[1].incoming_grade, 2);
    assert_eq!(report.grades.iter().map(|g| g.student_count()).sum::<usize>(), 36);

    let output = config.resolve_path(config.output.as_deref().unwrap());
    report.export_json(&output).unwrap();
    let imported = PlacementReport::import_json(&output).unwrap();
    assert_eq!(imported.seed, 99);
    assert_eq!(imported.grades, report.grades);

    let summary = CliFormatter::format_summary(&imported);
    assert!(summary.contains("within 50% the same share of boys"));
}

#[tokio::test]
async fn test_same_seed_same_classes() {
    let dir = TempDir::new().unwrap();
    let config_path = write_fixture(dir.path(), "[classes]\nKG = 3\n\"01\" = 2\n");
    let config = SolverConfig::from_file(&config_path).unwrap();
    let patterns = Arc::new(
        PatternBook::load(
            &config.resolve_path(&config.patterns.clusters),
            &config.resolve_path(&config.patterns.affinity),
        )
        .unwrap(),
    );

    let mut runs = Vec::new();
    for _ in 0..2 {
        let cohorts = group_by_grade(load_roster(&dir.path().join("roster.json")).unwrap()).unwrap();
        let counts = resolve_class_counts(&config, &[], &cohorts, no_prompt()).unwrap();
        let planner = ClassPlanner::from_config(&config, Arc::clone(&patterns), 1234);
        let placements = planner.solve_all(cohorts, &counts).await.unwrap();
        let ids: Vec<Vec<Vec<String>>> = placements
            .iter()
            .map(|p| p.rosters.iter().map(|r| r.student_ids()).collect())
            .collect();
        runs.push(ids);
    }
    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn test_missing_three_class_patterns_is_reported() {
    let dir = TempDir::new().unwrap();
    let config_path = write_fixture(dir.path(), "[classes]\nKG = 3\n\"01\" = 3\n");
    // Affinity table only covers two classes
    std::fs::write(
        dir.path().join("affinity.toml"),
        "[[pattern_set]]\nclasses = 2\npatterns = [[0, 0]]\n",
    )
    .unwrap();

    let config = SolverConfig::from_file(&config_path).unwrap();
    let patterns = PatternBook::load(
        &config.resolve_path(&config.patterns.clusters),
        &config.resolve_path(&config.patterns.affinity),
    )
    .unwrap();
    let cohorts = group_by_grade(load_roster(&dir.path().join("roster.json")).unwrap()).unwrap();
    let counts = resolve_class_counts(&config, &[], &cohorts, no_prompt()).unwrap();

    let planner = ClassPlanner::from_config(&config, Arc::new(patterns), 5);
    let result = planner.solve_all(cohorts, &counts).await;
    assert!(matches!(
        result,
        Err(Error::MissingPatternSet {
            constraint: "affinity",
            classes: 3,
            ..
        })
    ));
}

#[test]
fn test_malformed_pattern_file_rejected() {
    let dir = TempDir::new().unwrap();
    let clusters = dir.path().join("clusters.toml");
    let affinity = dir.path().join("affinity.toml");
    std::fs::write(&clusters, "[[pattern_set]]\nclasses = 3\npatterns = [[0, 1]]\n").unwrap();
    std::fs::write(&affinity, lenient_pattern_file(4)).unwrap();

    assert!(matches!(PatternBook::load(&clusters, &affinity), Err(Error::Pattern(_))));
}

#[test]
fn test_missing_roster_file_is_roster_error() {
    let dir = TempDir::new().unwrap();
    let result = load_roster(&dir.path().join("absent.json"));
    assert!(matches!(result, Err(Error::Roster(_))));
}
