//! Configuration loading and config file resolution
//!
//! All solver settings live in one TOML file. Every field has a built-in
//! default, so a missing file degrades to the reference configuration with a
//! warning instead of aborting.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `EQC_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/eqc/config.toml`)
//! 4. Compiled defaults (fallback)

use crate::student::ExitGrade;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "EQC_CONFIG";

/// Complete solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Run seed; a random seed is drawn when absent
    pub seed: Option<u64>,

    /// Races with more students than this in a grade skip the affinity check
    pub large_group_threshold: u32,

    /// Roster JSON file (CLI overrides)
    pub roster: Option<PathBuf>,

    /// Report JSON file (CLI overrides)
    pub output: Option<PathBuf>,

    pub tolerances: TolerancePolicy,

    pub search: SearchSettings,

    pub patterns: PatternPaths,

    /// Classes to form per exit grade, keyed by grade code ("KG", "01", ...)
    pub classes: BTreeMap<String, usize>,

    pub logging: LoggingConfig,

    /// Directory of the file this config was read from
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            seed: None,
            large_group_threshold: 9,
            roster: None,
            output: None,
            tolerances: TolerancePolicy::default(),
            search: SearchSettings::default(),
            patterns: PatternPaths::default(),
            classes: BTreeMap::new(),
            logging: LoggingConfig::default(),
            base_dir: None,
        }
    }
}

/// Maximum allowed spread (highest minus lowest classroom value) per
/// balanced attribute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TolerancePolicy {
    /// Rate of male students
    pub gender: f64,
    /// Rate of students with an IEP/504 plan
    pub iep: f64,
    /// Rate of students with a LAP indicator
    pub lap: f64,
    /// Mean attendance bucket code
    pub attendance: f64,
    /// Mean academic score
    pub academic: f64,
}

impl Default for TolerancePolicy {
    fn default() -> Self {
        Self {
            gender: 0.20,
            iep: 1.0,
            lap: 0.25,
            attendance: 0.30,
            academic: 0.25,
        }
    }
}

impl TolerancePolicy {
    /// Reject negative or non-finite tolerances
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("gender", self.gender),
            ("iep", self.iep),
            ("lap", self.lap),
            ("attendance", self.attendance),
            ("academic", self.academic),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!(
                    "tolerances.{}: value {} must be a finite number >= 0",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Search budget settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Maximum candidate partitions tried per grade
    pub max_attempts: u64,
    /// Optional wall-clock limit per grade (seconds)
    pub time_limit_secs: Option<u64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 1_000_000,
            time_limit_secs: None,
        }
    }
}

/// Locations of the administrator pattern tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternPaths {
    /// Staffing cluster patterns (SPED / HCP)
    pub clusters: PathBuf,
    /// Race affinity patterns
    pub affinity: PathBuf,
}

impl Default for PatternPaths {
    fn default() -> Self {
        Self {
            clusters: PathBuf::from("sped_clusters.toml"),
            affinity: PathBuf::from("race_affinity_clusters.toml"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserConfig(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Resolve the config file location following the priority order
    ///
    /// Only the platform default location is probed for existence; explicit
    /// paths are returned as given so a typo surfaces as a load error.
    pub fn resolve(cli_arg: Option<&Path>) -> Self {
        if let Some(path) = cli_arg {
            return ConfigSource::CommandLine(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return ConfigSource::Environment(PathBuf::from(path));
            }
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                return ConfigSource::UserConfig(path);
            }
        }

        ConfigSource::Defaults
    }

    /// File path, if this source names one
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(p) | ConfigSource::Environment(p) | ConfigSource::UserConfig(p) => {
                Some(p.as_path())
            }
            ConfigSource::Defaults => None,
        }
    }
}

/// Platform config file location (`<config_dir>/eqc/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("eqc").join("config.toml"))
}

impl SolverConfig {
    /// Resolve and load the configuration
    ///
    /// Returns the validated config together with the source it came from.
    pub fn load(cli_arg: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let source = ConfigSource::resolve(cli_arg);
        let config = match source.path() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => {
                warn!("No configuration file found, using built-in defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok((config, source))
    }

    /// Read a config file; relative paths inside it resolve against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.tolerances.validate()?;
        if self.search.max_attempts == 0 {
            return Err(Error::Config("search.max_attempts must be at least 1".to_string()));
        }
        if self.search.time_limit_secs == Some(0) {
            return Err(Error::Config("search.time_limit_secs must be at least 1".to_string()));
        }
        for (code, count) in &self.classes {
            code.parse::<ExitGrade>()
                .map_err(|e| Error::Config(format!("classes.{}: {}", code, e)))?;
            if *count == 0 {
                return Err(Error::Config(format!("classes.{}: class count must be at least 1", code)));
            }
        }
        Ok(())
    }

    /// Class counts keyed by parsed grade
    pub fn class_counts(&self) -> Result<BTreeMap<ExitGrade, usize>> {
        self.classes
            .iter()
            .map(|(code, count)| {
                let grade = code
                    .parse::<ExitGrade>()
                    .map_err(|e| Error::Config(format!("classes.{}: {}", code, e)))?;
                Ok((grade, *count))
            })
            .collect()
    }

    /// Resolve a path from the config relative to the config file's directory
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Write a configuration file atomically (temp file + rename)
pub fn write_toml_config(config: &SolverConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = target.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    std::fs::write(&temp_path, content)?;
    if let Err(e) = std::fs::rename(&temp_path, target) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = SolverConfig::default();
        assert_eq!(config.large_group_threshold, 9);
        assert_eq!(config.tolerances.gender, 0.20);
        assert_eq!(config.tolerances.iep, 1.0);
        assert_eq!(config.tolerances.lap, 0.25);
        assert_eq!(config.tolerances.attendance, 0.30);
        assert_eq!(config.tolerances.academic, 0.25);
        assert_eq!(config.search.max_attempts, 1_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SolverConfig::from_toml_str(
            r#"
            seed = 7

            [tolerances]
            gender = 0.1

            [classes]
            KG = 3
            "01" = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(7));
        assert_eq!(config.tolerances.gender, 0.1);
        assert_eq!(config.tolerances.lap, 0.25);
        assert_eq!(config.logging.level, "info");

        let counts = config.class_counts().unwrap();
        assert_eq!(counts.get(&ExitGrade::Kindergarten), Some(&3));
        assert_eq!(counts.get(&ExitGrade::First), Some(&2));
    }

    #[test]
    fn test_validate_rejects_negative_tolerance() {
        let mut config = SolverConfig::default();
        config.tolerances.lap = -0.1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = SolverConfig::default();
        config.search.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_grade_and_zero_classes() {
        let mut config = SolverConfig::default();
        config.classes.insert("09".to_string(), 2);
        assert!(config.validate().is_err());

        let mut config = SolverConfig::default();
        config.classes.insert("02".to_string(), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_path_uses_base_dir_for_relative_paths() {
        let mut config = SolverConfig::default();
        config.base_dir = Some(PathBuf::from("/etc/eqc"));
        assert_eq!(
            config.resolve_path(Path::new("clusters.toml")),
            PathBuf::from("/etc/eqc/clusters.toml")
        );
        assert_eq!(
            config.resolve_path(Path::new("/data/clusters.toml")),
            PathBuf::from("/data/clusters.toml")
        );
    }
}
