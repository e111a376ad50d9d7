//! Robot configuration file
//!
//! JSON configuration for the host: where scripts live, which routine and
//! alliance to run, host loop timing, and the tuning constants the command
//! factories read. Every field has a default, so a partial file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compiler::ScriptSource;
use crate::sim::SimParams;
use crate::types::Alliance;

/// Constants consumed by command factories.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Convergence threshold when a script omits it. Used both as the
    /// tolerance band and as the required number of consecutive polls.
    pub default_threshold: u32,
    /// Scale applied to the heading controller output while turning
    pub turn_speed_coefficient: f64,
    /// Poll cadence of threaded commands
    pub threaded_cadence_ms: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            default_threshold: 10,
            turn_speed_coefficient: 0.8,
            threaded_cadence_ms: 20,
        }
    }
}

impl Tuning {
    pub fn threaded_cadence(&self) -> Duration {
        Duration::from_millis(self.threaded_cadence_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_threshold == 0 {
            anyhow::bail!("Default threshold must be at least 1");
        }
        if !self.turn_speed_coefficient.is_finite() || self.turn_speed_coefficient <= 0.0 {
            anyhow::bail!("Turn speed coefficient must be a positive number");
        }
        if self.threaded_cadence_ms == 0 {
            anyhow::bail!("Threaded cadence must be at least 1ms");
        }
        Ok(())
    }
}

/// Complete host configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Directory holding `<routine>_<alliance>.txt` and `<routine>.txt`
    pub script_dir: PathBuf,
    /// Routine name selected for this match
    pub routine: String,
    pub alliance: Alliance,
    /// Host loop period
    pub period_ms: u64,
    /// Length of the autonomous phase
    pub budget_secs: f64,
    pub tuning: Tuning,
    pub sim: SimParams,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            script_dir: PathBuf::from("autos"),
            routine: "auto".to_string(),
            alliance: Alliance::default(),
            period_ms: 20,
            budget_secs: 15.0,
            tuning: Tuning::default(),
            sim: SimParams::default(),
        }
    }
}

impl RobotConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Load configuration from a JSON file and validate it
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;
        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.routine.trim().is_empty() {
            anyhow::bail!("Routine name must be specified");
        }
        if self.routine.contains(['/', '\\']) {
            anyhow::bail!("Routine name cannot contain path separators");
        }
        if self.period_ms == 0 {
            anyhow::bail!("Host loop period must be at least 1ms");
        }
        if !self.budget_secs.is_finite() || self.budget_secs <= 0.0 {
            anyhow::bail!("Autonomous budget must be a positive number of seconds");
        }
        self.tuning.validate()?;
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn budget(&self) -> Duration {
        Duration::try_from_secs_f64(self.budget_secs).unwrap_or(Duration::MAX)
    }

    /// Alliance-specific script with the plain routine script as fallback
    pub fn script_source(&self) -> ScriptSource {
        ScriptSource::for_routine(&self.script_dir, &self.routine, self.alliance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = RobotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tuning.default_threshold, 10);
        assert_eq!(config.period(), Duration::from_millis(20));
        assert_eq!(config.budget(), Duration::from_secs(15));
    }

    #[test]
    fn test_save_and_load_json_config() {
        let mut config = RobotConfig::default();
        config.routine = "center".to_string();
        config.alliance = Alliance::Blue;

        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();

        let loaded = RobotConfig::load_from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"routine": "left", "tuning": {{"threaded_cadence_ms": 5}}}}"#).unwrap();

        let loaded = RobotConfig::load_from_file(file.path()).unwrap();
        assert_eq!(loaded.routine, "left");
        assert_eq!(loaded.tuning.threaded_cadence_ms, 5);
        assert_eq!(loaded.tuning.default_threshold, 10);
        assert_eq!(loaded.alliance, Alliance::Red);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = RobotConfig::load_from_file("/nonexistent/robot.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = RobotConfig::load_from_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("parse"));
    }

    #[test]
    fn test_load_rejects_unknown_alliance() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"alliance": "green"}}"#).unwrap();
        assert!(RobotConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_validation_zero_period() {
        let config = RobotConfig {
            period_ms: 0,
            ..RobotConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_routine_with_separator() {
        let config = RobotConfig {
            routine: "../etc/passwd".to_string(),
            ..RobotConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_threshold() {
        let mut config = RobotConfig::default();
        config.tuning.default_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_script_source_paths() {
        let config = RobotConfig {
            script_dir: PathBuf::from("/robot/autos"),
            routine: "center".to_string(),
            alliance: Alliance::Blue,
            ..RobotConfig::default()
        };
        let source = config.script_source();
        assert_eq!(source.primary(), Path::new("/robot/autos/center_blue.txt"));
        assert_eq!(source.fallback(), Some(Path::new("/robot/autos/center.txt")));
    }
}
