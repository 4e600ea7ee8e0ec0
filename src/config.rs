use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tuning knobs of the association engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// An unmatched track is pruned once its age reaches this value.
    pub max_age: u32,
    /// History lags (frames back) used to query the scorer, ascending.
    pub lags: Vec<usize>,
    /// Width of the scorer's recurrent state.
    pub hidden_size: usize,
    /// Pixel coordinates are divided by this before reaching the scorer.
    pub norm: f64,
    /// Boxes narrower or shorter than this (in pixels) are dropped.
    pub min_box_size: i32,
    pub scorer: ScorerPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 10,
            lags: vec![1, 2, 4, 8, 16],
            hidden_size: 64,
            norm: 1000.0,
            min_box_size: 4,
            scorer: ScorerPolicy::default(),
        }
    }
}

impl TrackerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: TrackerConfig = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_age == 0 {
            return Err(Error::InvalidConfig("max_age must be at least 1".into()));
        }
        if self.lags.is_empty() {
            return Err(Error::InvalidConfig("lags must not be empty".into()));
        }
        if self.lags[0] == 0 || self.lags.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidConfig(format!(
                "lags must be positive and strictly ascending, got {:?}",
                self.lags
            )));
        }
        if self.hidden_size == 0 {
            return Err(Error::InvalidConfig("hidden_size must be at least 1".into()));
        }
        if !(self.norm > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "norm must be positive, got {}",
                self.norm
            )));
        }
        if self.scorer.max_attempts == 0 {
            return Err(Error::InvalidConfig("scorer.max_attempts must be at least 1".into()));
        }
        if self.scorer.timeout_ms == 0 {
            return Err(Error::InvalidConfig("scorer.timeout_ms must be at least 1".into()));
        }
        Ok(())
    }

    /// Number of history entries a track ever needs to keep.
    pub fn history_capacity(&self) -> usize {
        self.lags.last().copied().unwrap_or(1)
    }
}

/// How calls to the affinity scorer are guarded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScorerPolicy {
    pub max_attempts: u32,
    /// Consecutive failed attempts before the circuit opens.
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    /// Calls returning later than this are discarded as failed. A call is
    /// never interrupted, so a scorer that hangs still blocks the frame.
    pub timeout_ms: u64,
    pub on_failure: FailurePolicy,
}

/// What a batch does when the scorer fails on one of its frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole batch.
    #[default]
    AbortJob,
    /// Emit the frame without track ids and restart tracking on the next one.
    SkipFrame,
}

impl Default for ScorerPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            failure_threshold: 5,
            cooldown_ms: 30_000,
            timeout_ms: 10_000,
            on_failure: FailurePolicy::AbortJob,
        }
    }
}

impl ScorerPolicy {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TrackerConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.history_capacity(), 16);
    }

    #[test]
    fn test_from_json_fills_missing_fields_with_defaults() {
        let config = TrackerConfig::from_json(
            r#"{"max_age": 2, "scorer": {"max_attempts": 3, "on_failure": "skip_frame"}}"#,
        )
        .unwrap();

        assert_eq!(config.max_age, 2);
        assert_eq!(config.lags, vec![1, 2, 4, 8, 16]);
        assert_eq!(config.scorer.max_attempts, 3);
        assert_eq!(config.scorer.failure_threshold, 5);
        assert_eq!(config.scorer.on_failure, FailurePolicy::SkipFrame);
    }

    #[test]
    fn test_unordered_lags_are_rejected() {
        let config = TrackerConfig {
            lags: vec![1, 4, 2],
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_max_age_is_rejected() {
        let result = TrackerConfig::from_json(r#"{"max_age": 0}"#);

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_veto_score_is_not_configurable() {
        let result = TrackerConfig::from_json(r#"{"veto_score": 5.0}"#);

        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = TrackerConfig::from_json(r#"{"scorer": {"timeout_ms": 0}}"#);

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
