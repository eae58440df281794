//! Bounded randomized search for one grade
//!
//! **Algorithm:** each attempt walks the phases
//! `Shuffle → Partition → Impute → Aggregate → Validate`. An accepted
//! verdict ends the search; any rejection discards the whole partition and
//! the next attempt starts from a fresh shuffle of the untouched cohort.
//! Attempts never depend on one another except through the shared random
//! stream, so a fixed seed reproduces the exact sequence of candidates.
//! A draw that leaves a classroom without any academic score is rejected
//! like a failed check and tallied as [`MISSING_SCORES_FAILURE`].
//!
//! **Termination:** the search is bounded by a [`SearchBudget`] (attempt cap
//! plus optional wall-clock limit) and reports [`SearchOutcome::Exhausted`]
//! instead of looping forever on unsatisfiable settings.

use crate::aggregate::{aggregate, impute_missing_scores, ClassroomAggregate};
use crate::cohort::{ClassRoster, GradeCohort};
use crate::partition::partition;
use crate::patterns::PatternBook;
use crate::validation::{evaluate, Verdict};
use crate::{Error, Result};
use eqc_common::config::SearchSettings;
use eqc_common::{ExitGrade, TolerancePolicy};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Failure label for draws that leave a classroom with no academic score
pub const MISSING_SCORES_FAILURE: &str = "academic score: missing";

/// Deterministic random source used for every search
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Phases of one search attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Shuffle,
    Partition,
    Impute,
    Aggregate,
    Validate,
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchPhase::Shuffle => "shuffle",
            SearchPhase::Partition => "partition",
            SearchPhase::Impute => "impute",
            SearchPhase::Aggregate => "aggregate",
            SearchPhase::Validate => "validate",
        };
        f.write_str(name)
    }
}

/// Limits on one grade's search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBudget {
    /// Maximum number of candidate partitions
    pub max_attempts: u64,
    /// Optional wall-clock limit, checked after every attempt
    pub time_limit: Option<Duration>,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self::from_settings(&SearchSettings::default())
    }
}

impl SearchBudget {
    /// Budget with an attempt cap and no time limit
    pub fn attempts(max_attempts: u64) -> Self {
        Self {
            max_attempts,
            time_limit: None,
        }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            time_limit: settings.time_limit_secs.map(Duration::from_secs),
        }
    }
}

/// Accepted partition of one grade
#[derive(Debug, Clone)]
pub struct Placement {
    pub grade: ExitGrade,
    /// Rosters with imputed academic scores
    pub rosters: Vec<ClassRoster>,
    pub aggregates: Vec<ClassroomAggregate>,
    pub verdict: Verdict,
    /// Attempts used, including the accepted one
    pub attempts: u64,
    pub elapsed: Duration,
}

/// Budget exhausted without an acceptable partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exhaustion {
    pub grade: ExitGrade,
    pub classes: usize,
    pub attempts: u64,
    pub elapsed: Duration,
    /// How many attempts failed each check
    pub failure_tally: BTreeMap<String, u64>,
}

impl Exhaustion {
    /// Checks ordered from most to least often failed
    pub fn most_failed(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .failure_tally
            .iter()
            .map(|(check, count)| (check.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    pub fn into_error(self) -> Error {
        Error::UnboundedSearch {
            grade: self.grade,
            attempts: self.attempts,
            elapsed: self.elapsed,
        }
    }
}

/// Tagged result of a search
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Accepted(Placement),
    Exhausted(Exhaustion),
}

impl SearchOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SearchOutcome::Accepted(_))
    }

    /// Convert `Exhausted` into `Error::UnboundedSearch`
    pub fn into_result(self) -> Result<Placement> {
        match self {
            SearchOutcome::Accepted(placement) => Ok(placement),
            SearchOutcome::Exhausted(exhaustion) => Err(exhaustion.into_error()),
        }
    }
}

/// One evaluated candidate, as seen by an observer
#[derive(Debug)]
pub struct Attempt<'a> {
    /// 1-based attempt number
    pub number: u64,
    pub rosters: &'a [ClassRoster],
    pub aggregates: &'a [ClassroomAggregate],
    pub verdict: &'a Verdict,
}

/// Fully evaluated candidate partition
#[derive(Debug, Clone)]
pub struct Candidate {
    pub rosters: Vec<ClassRoster>,
    pub aggregates: Vec<ClassroomAggregate>,
    pub verdict: Verdict,
}

/// Outcome of drawing one candidate
#[derive(Debug, Clone)]
pub enum Draw {
    Evaluated(Candidate),
    /// `classroom` received no student with an academic score
    Unscored { classroom: usize },
}

/// Search driver holding the acceptance rules
#[derive(Debug, Clone)]
pub struct SearchLoop {
    policy: TolerancePolicy,
    patterns: Arc<PatternBook>,
    large_group_threshold: u32,
    budget: SearchBudget,
}

impl SearchLoop {
    pub fn new(
        policy: TolerancePolicy,
        patterns: Arc<PatternBook>,
        large_group_threshold: u32,
        budget: SearchBudget,
    ) -> Self {
        Self {
            policy,
            patterns,
            large_group_threshold,
            budget,
        }
    }

    pub fn budget(&self) -> SearchBudget {
        self.budget
    }

    /// Search for an acceptable partition of `cohort` into `classes` rosters
    ///
    /// # Errors
    /// `InvalidCohortSize`, `MissingPatternSet` and `AllMissingScores` abort
    /// the search. `AllMissingScores` is raised up front, only when fewer
    /// students have a score than there are classrooms; its `classroom` is
    /// the first one left unscored even with the scored students spread one
    /// per classroom. Running out of budget is not an error here; it is
    /// reported as [`SearchOutcome::Exhausted`].
    pub fn run<R: Rng + ?Sized>(&self, cohort: &GradeCohort, classes: usize, rng: &mut R) -> Result<SearchOutcome> {
        self.run_with_observer(cohort, classes, rng, |_| {})
    }

    /// Like [`SearchLoop::run`], calling `observer` after every evaluated attempt
    pub fn run_with_observer<R, F>(
        &self,
        cohort: &GradeCohort,
        classes: usize,
        rng: &mut R,
        mut observer: F,
    ) -> Result<SearchOutcome>
    where
        R: Rng + ?Sized,
        F: FnMut(&Attempt<'_>),
    {
        cohort.check_class_count(classes)?;

        let grade = cohort.grade();
        let scored = cohort.students().iter().filter(|s| s.academic_score.is_some()).count();
        if scored < classes {
            return Err(Error::AllMissingScores {
                grade,
                classroom: scored,
            });
        }

        let started = Instant::now();
        let deadline = self.budget.time_limit.and_then(|limit| started.checked_add(limit));
        let mut failure_tally: BTreeMap<String, u64> = BTreeMap::new();
        let mut attempts = 0;

        info!(
            "Attempting to solve the outgoing {} grade: {} students into {} classes",
            grade,
            cohort.len(),
            classes
        );

        while attempts < self.budget.max_attempts {
            attempts += 1;
            match self.attempt(cohort, classes, rng)? {
                Draw::Evaluated(candidate) => {
                    observer(&Attempt {
                        number: attempts,
                        rosters: &candidate.rosters,
                        aggregates: &candidate.aggregates,
                        verdict: &candidate.verdict,
                    });

                    if candidate.verdict.accepted() {
                        let elapsed = started.elapsed();
                        info!(
                            "Grade {} solved after {} attempts in {:.2}s",
                            grade,
                            attempts,
                            elapsed.as_secs_f64()
                        );
                        return Ok(SearchOutcome::Accepted(Placement {
                            grade,
                            rosters: candidate.rosters,
                            aggregates: candidate.aggregates,
                            verdict: candidate.verdict,
                            attempts,
                            elapsed,
                        }));
                    }

                    let failures = candidate.verdict.failures();
                    debug!(grade = %grade, attempt = attempts, failed = ?failures, "Partition rejected");
                    for failure in failures {
                        *failure_tally.entry(failure).or_insert(0) += 1;
                    }
                }
                Draw::Unscored { classroom } => {
                    debug!(
                        grade = %grade,
                        attempt = attempts,
                        classroom,
                        "Partition rejected: classroom has no academic score"
                    );
                    *failure_tally.entry(MISSING_SCORES_FAILURE.to_string()).or_insert(0) += 1;
                }
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!("Grade {}: time limit reached after {} attempts", grade, attempts);
                break;
            }
        }

        let exhaustion = Exhaustion {
            grade,
            classes,
            attempts,
            elapsed: started.elapsed(),
            failure_tally,
        };
        warn!(
            "Grade {}: no acceptable partition in {} attempts; most failed checks: {:?}",
            grade,
            attempts,
            exhaustion.most_failed().into_iter().take(3).collect::<Vec<_>>()
        );
        Ok(SearchOutcome::Exhausted(exhaustion))
    }

    /// Build and evaluate one random candidate
    ///
    /// A roster with nothing to impute from ends the draw early as
    /// [`Draw::Unscored`]; the caller decides whether to retry.
    pub fn attempt<R: Rng + ?Sized>(&self, cohort: &GradeCohort, classes: usize, rng: &mut R) -> Result<Draw> {
        let grade = cohort.grade();

        trace!(phase = %SearchPhase::Shuffle, grade = %grade, "Search phase");
        let shuffled = cohort.shuffled(rng);

        trace!(phase = %SearchPhase::Partition, grade = %grade, "Search phase");
        let rosters = partition(&shuffled, classes)?;

        trace!(phase = %SearchPhase::Impute, grade = %grade, "Search phase");
        let mut imputed = Vec::with_capacity(rosters.len());
        for (i, roster) in rosters.iter().enumerate() {
            match impute_missing_scores(roster, grade, i) {
                Ok(roster) => imputed.push(roster),
                Err(Error::AllMissingScores { classroom, .. }) => return Ok(Draw::Unscored { classroom }),
                Err(e) => return Err(e),
            }
        }
        let rosters = imputed;

        trace!(phase = %SearchPhase::Aggregate, grade = %grade, "Search phase");
        let aggregates = rosters
            .iter()
            .enumerate()
            .map(|(i, roster)| aggregate(roster, grade, i))
            .collect::<Result<Vec<_>>>()?;

        trace!(phase = %SearchPhase::Validate, grade = %grade, "Search phase");
        let verdict = evaluate(&aggregates, &self.policy, &self.patterns, self.large_group_threshold)?;

        Ok(Draw::Evaluated(Candidate {
            rosters,
            aggregates,
            verdict,
        }))
    }
}
