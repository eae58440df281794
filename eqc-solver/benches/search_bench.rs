//! Search throughput benchmark
//!
//! Measures the cost of one candidate partition (shuffle, partition,
//! impute, aggregate, validate) for typical grade sizes, and of a bounded
//! search that never accepts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use eqc_common::{AttendanceBucket, ExitGrade, Race, Student, TolerancePolicy};
use eqc_solver::patterns::{ConstraintKind, PatternTable};
use eqc_solver::search::seeded_rng;
use eqc_solver::{GradeCohort, PatternBook, PatternKey, SearchBudget, SearchLoop};
use std::sync::Arc;

fn cohort(n: usize) -> GradeCohort {
    let students = (0..n)
        .map(|i| {
            Student::new(format!("s{}", i), ExitGrade::Third, Race::ALL[i % Race::COUNT])
                .with_male(i % 2 == 0)
                .with_lap(i % 5 == 0)
                .with_special_education(i % 9 == 0)
                .with_attendance(AttendanceBucket::from_percentage(70.0 + (i % 30) as f64))
                .with_academic_score((i % 13 != 0).then(|| 150.0 + (i % 50) as f64))
        })
        .collect();
    GradeCohort::new(ExitGrade::Third, students).unwrap_or_else(|e| panic!("bench cohort: {}", e))
}

/// Single shared set per class count; most candidates are rejected
fn pattern_book() -> Arc<PatternBook> {
    let mut clusters = PatternTable::new(ConstraintKind::Cluster);
    let mut affinity = PatternTable::new(ConstraintKind::Affinity);
    for classes in 2..=4usize {
        let even = vec![vec![2; classes]];
        clusters.insert(PatternKey::Shared, classes, even.clone()).ok();
        affinity.insert(PatternKey::Shared, classes, even).ok();
    }
    Arc::new(PatternBook::new(clusters, affinity))
}

fn bench_single_attempt(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_attempt");
    let search = SearchLoop::new(TolerancePolicy::default(), pattern_book(), 9, SearchBudget::default());

    for &(students, classes) in &[(40usize, 2usize), (75, 3), (100, 4)] {
        let cohort = cohort(students);
        let mut rng = seeded_rng(42);
        group.bench_with_input(
            BenchmarkId::new("attempt", format!("{}x{}", students, classes)),
            &cohort,
            |b, cohort| b.iter(|| black_box(search.attempt(cohort, classes, &mut rng))),
        );
    }
    group.finish();
}

fn bench_exhausted_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_loop");
    let policy = TolerancePolicy {
        gender: 0.0,
        ..TolerancePolicy::default()
    };
    let search = SearchLoop::new(policy, pattern_book(), 9, SearchBudget::attempts(500));
    let cohort = cohort(75);

    group.bench_function("500_attempts_3_classes", |b| {
        b.iter(|| {
            let mut rng = seeded_rng(7);
            black_box(search.run(&cohort, 3, &mut rng))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_single_attempt, bench_exhausted_search);
criterion_main!(benches);
