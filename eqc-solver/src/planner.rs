//! Multi-grade class planning
//!
//! **Purpose:** decide how many classes each grade gets, check the counts
//! against the cohorts, then run every grade's search concurrently.
//!
//! Class counts come from the configuration `[classes]` table, command-line
//! overrides (which win), and optionally an interactive prompt for grades
//! still without a count. Grades are independent, so each search runs on a
//! tokio blocking worker with its own RNG derived from the run seed and the
//! grade; results are returned in grade order regardless of finish order.

use crate::cohort::GradeCohort;
use crate::patterns::PatternBook;
use crate::search::{seeded_rng, Placement, SearchBudget, SearchLoop, SearchOutcome};
use crate::{Error, Result};
use eqc_common::{ExitGrade, SolverConfig};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{error, info};

/// Odd multiplier spreading grade ordinals across the seed space
const GRADE_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Per-grade RNG seed derived from the run seed
pub fn grade_seed(seed: u64, grade: ExitGrade) -> u64 {
    seed ^ (u64::from(grade.ordinal()) + 1).wrapping_mul(GRADE_SALT)
}

/// Fresh run seed for when none is configured
///
/// Kept within 63 bits: TOML integers are signed, and the printed seed must
/// be reusable as the `seed` setting.
pub fn random_seed() -> u64 {
    rand::random::<u64>() >> 1
}

/// Parse a `GRADE=N` class count override ("KG=3", "01=2")
pub fn parse_class_override(value: &str) -> Result<(ExitGrade, usize)> {
    let (grade, count) = value
        .split_once('=')
        .ok_or_else(|| invalid_override(value, "expected GRADE=N"))?;
    let grade: ExitGrade = grade.parse()?;
    let count: usize = count
        .trim()
        .parse()
        .map_err(|_| invalid_override(value, "class count must be a whole number"))?;
    if count == 0 {
        return Err(invalid_override(value, "class count must be at least 1"));
    }
    Ok((grade, count))
}

fn invalid_override(value: &str, reason: &str) -> Error {
    Error::Common(eqc_common::Error::Config(format!(
        "invalid class count '{}': {}",
        value, reason
    )))
}

/// Ask the administrator for one grade's class count
///
/// Re-asks until a positive whole number is entered.
///
/// # Errors
/// `Io` when the input ends before an answer is given.
pub fn prompt_class_count<R, W>(input: &mut R, output: &mut W, cohort: &GradeCohort) -> Result<usize>
where
    R: BufRead,
    W: Write,
{
    loop {
        write!(
            output,
            "There are {} students coming into grade {} next year. \
             How many classes for this grade would you like to form? ",
            cohort.len(),
            cohort.grade().incoming_grade()
        )?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("no class count entered for grade {}", cohort.grade()),
            )));
        }

        match line.trim().parse::<usize>() {
            Ok(count) if count > 0 => return Ok(count),
            _ => writeln!(output, "Please enter a whole number of classes (1 or more).")?,
        }
    }
}

/// Resolve the class count of every cohort
///
/// Overrides replace configured counts. Grades still missing a count are
/// prompted for when `prompt` is given, otherwise they are a `Config` error.
pub fn resolve_class_counts<F>(
    config: &SolverConfig,
    overrides: &[(ExitGrade, usize)],
    cohorts: &[GradeCohort],
    mut prompt: Option<F>,
) -> Result<BTreeMap<ExitGrade, usize>>
where
    F: FnMut(&GradeCohort) -> Result<usize>,
{
    let mut configured = config.class_counts()?;
    configured.extend(overrides.iter().copied());

    let mut counts = BTreeMap::new();
    for cohort in cohorts {
        let grade = cohort.grade();
        let count = match (configured.get(&grade), prompt.as_mut()) {
            (Some(&count), _) => count,
            (None, Some(ask)) => ask(cohort)?,
            (None, None) => {
                return Err(Error::Common(eqc_common::Error::Config(format!(
                    "no class count for grade {} ({} students); add it under [classes] or pass --classes {}=N",
                    grade,
                    cohort.len(),
                    grade
                ))))
            }
        };
        counts.insert(grade, count);
    }
    Ok(counts)
}

/// Runs the search for every grade of a roster
#[derive(Debug, Clone)]
pub struct ClassPlanner {
    search: SearchLoop,
    seed: u64,
}

impl ClassPlanner {
    pub fn new(search: SearchLoop, seed: u64) -> Self {
        Self { search, seed }
    }

    /// Planner using the config's tolerances, threshold and search budget
    pub fn from_config(config: &SolverConfig, patterns: Arc<PatternBook>, seed: u64) -> Self {
        let search = SearchLoop::new(
            config.tolerances,
            patterns,
            config.large_group_threshold,
            SearchBudget::from_settings(&config.search),
        );
        Self::new(search, seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Pair every cohort with its class count, checking each count first
    ///
    /// # Errors
    /// `Config` for a cohort without a count, `InvalidCohortSize` for a count
    /// the cohort cannot fill.
    pub fn plan(
        cohorts: Vec<GradeCohort>,
        counts: &BTreeMap<ExitGrade, usize>,
    ) -> Result<Vec<(GradeCohort, usize)>> {
        cohorts
            .into_iter()
            .map(|cohort| {
                let classes = *counts.get(&cohort.grade()).ok_or_else(|| {
                    Error::Common(eqc_common::Error::Config(format!(
                        "no class count for grade {}",
                        cohort.grade()
                    )))
                })?;
                cohort.check_class_count(classes)?;
                Ok((cohort, classes))
            })
            .collect()
    }

    /// Search every grade concurrently, returning each grade's outcome in grade order
    pub async fn solve_outcomes(
        &self,
        cohorts: Vec<GradeCohort>,
        counts: &BTreeMap<ExitGrade, usize>,
    ) -> Result<Vec<(ExitGrade, Result<SearchOutcome>)>> {
        let mut planned = Self::plan(cohorts, counts)?;
        planned.sort_by_key(|(cohort, _)| cohort.grade());

        info!(
            "Solving {} grades with seed {} (max {} attempts per grade)",
            planned.len(),
            self.seed,
            self.search.budget().max_attempts
        );

        let handles: Vec<_> = planned
            .into_iter()
            .map(|(cohort, classes)| {
                let grade = cohort.grade();
                let search = self.search.clone();
                let seed = grade_seed(self.seed, grade);
                let handle = tokio::task::spawn_blocking(move || {
                    let mut rng = seeded_rng(seed);
                    search.run(&cohort, classes, &mut rng)
                });
                (grade, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (grade, handle) in handles {
            let outcome = handle
                .await
                .map_err(|e| Error::Internal(format!("Search task for grade {} failed: {}", grade, e)))?;
            outcomes.push((grade, outcome));
        }
        Ok(outcomes)
    }

    /// Search every grade and return the accepted placements in grade order
    ///
    /// Every grade runs to completion; the first failing grade's error is
    /// then returned.
    pub async fn solve_all(
        &self,
        cohorts: Vec<GradeCohort>,
        counts: &BTreeMap<ExitGrade, usize>,
    ) -> Result<Vec<Placement>> {
        collect_placements(self.solve_outcomes(cohorts, counts).await?)
    }
}

/// Turn per-grade outcomes into placements, failing on the first failed grade
pub fn collect_placements(outcomes: Vec<(ExitGrade, Result<SearchOutcome>)>) -> Result<Vec<Placement>> {
    let mut placements = Vec::with_capacity(outcomes.len());
    let mut first_error = None;
    for (grade, outcome) in outcomes {
        match outcome.and_then(SearchOutcome::into_result) {
            Ok(placement) => placements.push(placement),
            Err(e) => {
                error!("Grade {} failed: {}", grade, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(placements),
    }
}
