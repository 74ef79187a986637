use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_CONFIDENCE, DEFAULT_FAILURE_BACKOFF_MS, DEFAULT_JPEG_QUALITY,
    DEFAULT_PROGRESS_EVERY, DEFAULT_STANCE_SCALE, DEFAULT_TELEMETRY_QUEUE,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for the skill. Every field has a default, so a partial JSON
/// file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillConfig {
    /// Stance height per detected face.
    pub stance_scale: f64,
    /// JPEG quality (1-100) of telemetry snapshots.
    pub jpeg_quality: u8,
    /// Telemetry payloads buffered before dropping.
    pub telemetry_queue: usize,
    /// Sleep after a failed iteration, in milliseconds.
    pub failure_backoff_ms: u64,
    /// Minimum face score (0.0-1.0).
    pub detector_confidence: f64,
    /// Progress log throttle, in iterations.
    pub progress_every: usize,
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self {
            stance_scale: DEFAULT_STANCE_SCALE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            telemetry_queue: DEFAULT_TELEMETRY_QUEUE,
            failure_backoff_ms: DEFAULT_FAILURE_BACKOFF_MS,
            detector_confidence: DEFAULT_CONFIDENCE,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl SkillConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults when `path` is `None`, otherwise [`SkillConfig::load`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.stance_scale.is_finite() || self.stance_scale < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "stance_scale must be a non-negative number, got {}",
                self.stance_scale
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be within 1-100, got {}",
                self.jpeg_quality
            )));
        }
        if self.telemetry_queue == 0 {
            return Err(ConfigError::Invalid(
                "telemetry_queue must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detector_confidence) {
            return Err(ConfigError::Invalid(format!(
                "detector_confidence must be within 0.0-1.0, got {}",
                self.detector_confidence
            )));
        }
        Ok(())
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_millis(self.failure_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn write_config(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("skill.json");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = SkillConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.stance_scale, 50.0);
        assert_eq!(config.jpeg_quality, 75);
        assert_relative_eq!(config.detector_confidence, 0.5);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), r#"{ "stance_scale": 20.0 }"#);
        let config = SkillConfig::load(&path).unwrap();
        assert_relative_eq!(config.stance_scale, 20.0);
        assert_eq!(config.telemetry_queue, DEFAULT_TELEMETRY_QUEUE);
        assert_eq!(config.failure_backoff(), Duration::from_millis(100));
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let err = SkillConfig::load(Path::new("/nonexistent/skill.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "{ not json");
        let err = SkillConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_or_default_without_path() {
        assert_eq!(
            SkillConfig::load_or_default(None).unwrap(),
            SkillConfig::default()
        );
    }

    #[rstest]
    #[case::negative_scale(r#"{ "stance_scale": -1.0 }"#)]
    #[case::zero_quality(r#"{ "jpeg_quality": 0 }"#)]
    #[case::quality_above_range(r#"{ "jpeg_quality": 101 }"#)]
    #[case::empty_queue(r#"{ "telemetry_queue": 0 }"#)]
    #[case::confidence_above_one(r#"{ "detector_confidence": 1.5 }"#)]
    fn test_load_rejects_out_of_range(#[case] json: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), json);
        let err = SkillConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
