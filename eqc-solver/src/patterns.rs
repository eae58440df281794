//! Administrator pattern tables
//!
//! A pattern set lists the acceptable ascending-sorted per-classroom count
//! vectors for one class count. Two tables exist: staffing clusters (SPED,
//! HCP) and race affinity. Each table is read from a TOML file:
//!
//! ```toml
//! [[pattern_set]]
//! classes = 3
//! attribute = "sped"        # optional, shared by every attribute when absent
//! patterns = [[0, 0, 3], [0, 1, 2]]
//! ```
//!
//! Lookups prefer an attribute-specific set and fall back to the shared set
//! for the same class count. When neither exists the lookup fails with
//! `MissingPatternSet`; a missing set is never treated as "acceptable".

use crate::attributes::Attribute;
use crate::{Error, Result};
use eqc_common::Race;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Which constraint a table serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Cluster,
    Affinity,
}

impl ConstraintKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Cluster => "cluster",
            ConstraintKind::Affinity => "affinity",
        }
    }

    fn parse_key(&self, raw: &str) -> Result<PatternKey> {
        match self {
            ConstraintKind::Cluster => match Attribute::from_key(raw) {
                Some(attr) if attr.is_clustered() => Ok(PatternKey::Attribute(attr)),
                _ => Err(Error::Pattern(format!(
                    "cluster pattern attribute '{}' must be 'sped' or 'hcp'",
                    raw
                ))),
            },
            ConstraintKind::Affinity => raw
                .parse::<Race>()
                .map(PatternKey::Race)
                .map_err(|e| Error::Pattern(format!("affinity pattern attribute: {}", e))),
        }
    }
}

/// What a pattern set applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternKey {
    /// Applies to every attribute without a dedicated set
    Shared,
    Attribute(Attribute),
    Race(Race),
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternKey::Shared => f.write_str("all attributes"),
            PatternKey::Attribute(attr) => write!(f, "{}", attr),
            PatternKey::Race(race) => write!(f, "{}", race),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PatternFile {
    #[serde(default)]
    pattern_set: Vec<PatternSetEntry>,
}

#[derive(Debug, Deserialize)]
struct PatternSetEntry {
    classes: usize,
    #[serde(default)]
    attribute: Option<String>,
    patterns: Vec<Vec<u32>>,
}

/// Pattern sets of one constraint, keyed by (key, class count)
#[derive(Debug, Clone)]
pub struct PatternTable {
    kind: ConstraintKind,
    sets: BTreeMap<(PatternKey, usize), BTreeSet<Vec<u32>>>,
}

impl PatternTable {
    pub fn new(kind: ConstraintKind) -> Self {
        Self {
            kind,
            sets: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    /// Add patterns for `(key, classes)`, merging with any existing set
    ///
    /// Each pattern is sorted ascending before storing.
    pub fn insert<I>(&mut self, key: PatternKey, classes: usize, patterns: I) -> Result<()>
    where
        I: IntoIterator<Item = Vec<u32>>,
    {
        if classes < 2 {
            return Err(Error::Pattern(format!(
                "{} pattern set for {} declares {} classes; patterns start at 2 classes",
                self.kind.name(),
                key,
                classes
            )));
        }

        let set = self.sets.entry((key, classes)).or_default();
        for mut pattern in patterns {
            if pattern.len() != classes {
                return Err(Error::Pattern(format!(
                    "{} pattern {:?} for {} has {} entries, expected {}",
                    self.kind.name(),
                    pattern,
                    key,
                    pattern.len(),
                    classes
                )));
            }
            pattern.sort_unstable();
            set.insert(pattern);
        }
        Ok(())
    }

    /// Pattern set for `(key, classes)`, falling back to the shared set
    pub fn lookup(&self, key: PatternKey, classes: usize) -> Result<&BTreeSet<Vec<u32>>> {
        self.sets
            .get(&(key, classes))
            .or_else(|| self.sets.get(&(PatternKey::Shared, classes)))
            .ok_or_else(|| Error::MissingPatternSet {
                constraint: self.kind.name(),
                attribute: key.to_string(),
                classes,
            })
    }

    /// Whether the ascending-sorted `counts` vector is an approved pattern
    pub fn accepts(&self, key: PatternKey, sorted_counts: &[u32]) -> Result<bool> {
        let set = self.lookup(key, sorted_counts.len())?;
        Ok(set.contains(sorted_counts))
    }

    /// Class counts that have at least one pattern set
    pub fn class_counts(&self) -> BTreeSet<usize> {
        self.sets.keys().map(|(_, classes)| *classes).collect()
    }

    /// Parse a TOML pattern document
    pub fn from_toml_str(kind: ConstraintKind, content: &str) -> Result<Self> {
        let file: PatternFile = toml::from_str(content)
            .map_err(|e| Error::Pattern(format!("invalid {} pattern file: {}", kind.name(), e)))?;

        let mut table = PatternTable::new(kind);
        for entry in file.pattern_set {
            let key = match entry.attribute.as_deref() {
                Some(raw) => kind.parse_key(raw)?,
                None => PatternKey::Shared,
            };
            table.insert(key, entry.classes, entry.patterns)?;
        }
        Ok(table)
    }

    /// Read a TOML pattern file
    pub fn from_file(kind: ConstraintKind, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Pattern(format!("cannot read {} pattern file {}: {}", kind.name(), path.display(), e))
        })?;
        let table = Self::from_toml_str(kind, &content)?;
        debug!(
            path = %path.display(),
            sets = table.sets.len(),
            "Loaded {} patterns",
            kind.name()
        );
        Ok(table)
    }
}

/// Both pattern tables used by the search
#[derive(Debug, Clone)]
pub struct PatternBook {
    pub clusters: PatternTable,
    pub affinity: PatternTable,
}

impl PatternBook {
    pub fn new(clusters: PatternTable, affinity: PatternTable) -> Self {
        Self { clusters, affinity }
    }

    /// Load both tables from their files
    pub fn load(clusters: &Path, affinity: &Path) -> Result<Self> {
        Ok(Self {
            clusters: PatternTable::from_file(ConstraintKind::Cluster, clusters)?,
            affinity: PatternTable::from_file(ConstraintKind::Affinity, affinity)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLUSTERS: &str = r#"
        [[pattern_set]]
        classes = 3
        patterns = [[3, 0, 0], [1, 1, 1]]

        [[pattern_set]]
        classes = 3
        attribute = "hcp"
        patterns = [[0, 2, 2]]

        [[pattern_set]]
        classes = 2
        patterns = [[0, 2]]
    "#;

    #[test]
    fn test_patterns_are_sorted_on_load() {
        let table = PatternTable::from_toml_str(ConstraintKind::Cluster, CLUSTERS).unwrap();
        let set = table.lookup(PatternKey::Attribute(Attribute::SpecialEducation), 3).unwrap();
        assert!(set.contains(&vec![0, 0, 3]));
        assert!(!set.contains(&vec![3, 0, 0]));
    }

    #[test]
    fn test_attribute_specific_set_wins_over_shared() {
        let table = PatternTable::from_toml_str(ConstraintKind::Cluster, CLUSTERS).unwrap();
        let hcp = PatternKey::Attribute(Attribute::Gifted);
        assert!(table.accepts(hcp, &[0, 2, 2]).unwrap());
        assert!(!table.accepts(hcp, &[1, 1, 1]).unwrap());

        let sped = PatternKey::Attribute(Attribute::SpecialEducation);
        assert!(table.accepts(sped, &[1, 1, 1]).unwrap());
        assert!(!table.accepts(sped, &[0, 2, 2]).unwrap());
    }

    #[test]
    fn test_missing_class_count_is_an_error() {
        let table = PatternTable::from_toml_str(ConstraintKind::Cluster, CLUSTERS).unwrap();
        let result = table.accepts(PatternKey::Attribute(Attribute::Gifted), &[0, 0, 1, 1]);
        assert!(matches!(
            result,
            Err(Error::MissingPatternSet { constraint: "cluster", classes: 4, .. })
        ));
        assert_eq!(table.class_counts().into_iter().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_wrong_pattern_length_rejected() {
        let bad = "[[pattern_set]]\nclasses = 3\npatterns = [[1, 2]]\n";
        assert!(matches!(
            PatternTable::from_toml_str(ConstraintKind::Cluster, bad),
            Err(Error::Pattern(_))
        ));
    }

    #[test]
    fn test_single_class_sets_rejected() {
        let bad = "[[pattern_set]]\nclasses = 1\npatterns = [[4]]\n";
        assert!(PatternTable::from_toml_str(ConstraintKind::Affinity, bad).is_err());
    }

    #[test]
    fn test_affinity_keys_are_races() {
        let doc = r#"
            [[pattern_set]]
            classes = 2
            attribute = "Pacific Islander"
            patterns = [[0, 2]]
        "#;
        let table = PatternTable::from_toml_str(ConstraintKind::Affinity, doc).unwrap();
        assert!(table.accepts(PatternKey::Race(Race::PacificIslander), &[0, 2]).unwrap());
        assert!(table.accepts(PatternKey::Race(Race::White), &[0, 2]).is_err());

        let bad = "[[pattern_set]]\nclasses = 2\nattribute = \"sped\"\npatterns = [[0, 2]]\n";
        assert!(PatternTable::from_toml_str(ConstraintKind::Affinity, bad).is_err());
    }
}
