//! Grade cohorts and class rosters
//!
//! Both are immutable values: shuffling a cohort yields a new cohort, and
//! imputing a roster yields a new roster.

use crate::{Error, Result};
use eqc_common::{ExitGrade, Student};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// All students finishing one grade
#[derive(Debug, Clone, PartialEq)]
pub struct GradeCohort {
    grade: ExitGrade,
    students: Vec<Student>,
}

impl GradeCohort {
    /// Build a cohort; every student must belong to `grade`
    pub fn new(grade: ExitGrade, students: Vec<Student>) -> Result<Self> {
        if let Some(stray) = students.iter().find(|s| s.grade != grade) {
            return Err(Error::Roster(format!(
                "student {} is in grade {}, not {}",
                stray.id, stray.grade, grade
            )));
        }
        Ok(Self { grade, students })
    }

    pub fn grade(&self) -> ExitGrade {
        self.grade
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Same students in a fresh uniformly random order
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> GradeCohort {
        let mut students = self.students.clone();
        students.shuffle(rng);
        GradeCohort {
            grade: self.grade,
            students,
        }
    }

    /// Reject class counts that cannot be partitioned
    pub fn check_class_count(&self, classes: usize) -> Result<()> {
        if classes == 0 || classes > self.students.len() {
            return Err(Error::InvalidCohortSize {
                grade: self.grade,
                classes,
                students: self.students.len(),
            });
        }
        Ok(())
    }
}

/// Students assigned to one classroom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRoster {
    students: Vec<Student>,
}

impl ClassRoster {
    pub fn new(students: Vec<Student>) -> Self {
        Self { students }
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn student_ids(&self) -> Vec<String> {
        self.students.iter().map(|s| s.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eqc_common::Race;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn cohort(n: usize) -> GradeCohort {
        let students = (0..n)
            .map(|i| Student::new(format!("s{}", i), ExitGrade::Second, Race::White))
            .collect();
        GradeCohort::new(ExitGrade::Second, students).unwrap()
    }

    #[test]
    fn test_new_rejects_student_from_other_grade() {
        let students = vec![
            Student::new("a", ExitGrade::Second, Race::White),
            Student::new("b", ExitGrade::Third, Race::White),
        ];
        assert!(matches!(
            GradeCohort::new(ExitGrade::Second, students),
            Err(Error::Roster(_))
        ));
    }

    #[test]
    fn test_shuffled_is_a_permutation_and_leaves_original_alone() {
        let original = cohort(20);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let shuffled = original.shuffled(&mut rng);

        let mut a: Vec<_> = original.students().iter().map(|s| s.id.clone()).collect();
        let mut b: Vec<_> = shuffled.students().iter().map(|s| s.id.clone()).collect();
        assert_eq!(original.students()[0].id, "s0");
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_check_class_count_bounds() {
        let c = cohort(4);
        assert!(c.check_class_count(1).is_ok());
        assert!(c.check_class_count(4).is_ok());
        assert!(matches!(
            c.check_class_count(0),
            Err(Error::InvalidCohortSize { classes: 0, students: 4, .. })
        ));
        assert!(matches!(
            c.check_class_count(5),
            Err(Error::InvalidCohortSize { classes: 5, .. })
        ));
    }
}
