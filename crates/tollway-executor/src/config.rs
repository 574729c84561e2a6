//! Executor configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tollway_core::{Result, TollwayError};

/// What the executor does after a step fails or cannot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategy {
    /// Stop at the first unmet dependency or failed step.
    #[default]
    Abort,
    /// Record the error and keep going with steps whose dependencies hold.
    Continue,
    /// Retry failed invocations with backoff, then behave like `Continue`.
    Retry,
}

/// Budget, timeout and failure handling for one executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Plans whose estimated cost exceeds this are rejected up front.
    pub max_total_cost: f64,

    /// Plan-wide execution budget in milliseconds.
    pub timeout_ms: u64,

    /// Deadline for a single invocation in milliseconds.
    pub step_timeout_ms: u64,

    /// Upper bound on attempts per step under [`FailureStrategy::Retry`].
    pub retry_attempts: u32,

    pub failure_strategy: FailureStrategy,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_total_cost: 10.0,
            timeout_ms: 300_000,
            step_timeout_ms: 30_000,
            retry_attempts: 3,
            failure_strategy: FailureStrategy::Abort,
        }
    }
}

impl ChainConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TollwayError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!(path = %path.display(), "Configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            TollwayError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Set the cost cap.
    pub fn with_max_total_cost(mut self, max_total_cost: f64) -> Self {
        self.max_total_cost = max_total_cost;
        self
    }

    /// Set the failure strategy.
    pub fn with_failure_strategy(mut self, strategy: FailureStrategy) -> Self {
        self.failure_strategy = strategy;
        self
    }

    /// Set the plan-wide and per-call timeouts.
    pub fn with_timeouts(mut self, timeout_ms: u64, step_timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self.step_timeout_ms = step_timeout_ms;
        self
    }

    /// Set the per-step attempt cap used by the retry strategy.
    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.max_total_cost.is_finite() || self.max_total_cost < 0.0 {
            return Err(TollwayError::Config(format!(
                "max_total_cost must be a non-negative number, got {}",
                self.max_total_cost
            )));
        }
        if self.step_timeout_ms == 0 {
            return Err(TollwayError::Config(
                "step_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ChainConfig::from_toml_str(
            r#"
            max_total_cost = 2.5
            failure_strategy = "retry"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_total_cost, 2.5);
        assert_eq!(config.failure_strategy, FailureStrategy::Retry);
        assert_eq!(config.timeout_ms, ChainConfig::default().timeout_ms);
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ChainConfig::from_toml_str("failure_strategy = \"explode\"").unwrap_err();
        assert!(matches!(err, TollwayError::Config(_)));

        let err = ChainConfig::from_toml_str("max_total_cost = -1.0").unwrap_err();
        assert!(err.to_string().contains("max_total_cost"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ChainConfig::load("/definitely/not/here/tollway.toml").unwrap();
        assert_eq!(config, ChainConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("tollway-config-{}.toml", std::process::id()));
        std::fs::write(&path, "timeout_ms = 1000\nstep_timeout_ms = 250\n").unwrap();

        let config = ChainConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.step_timeout_ms, 250);
        assert_eq!(config.failure_strategy, FailureStrategy::Abort);
    }

    #[test]
    fn test_builder_helpers() {
        let config = ChainConfig::default()
            .with_max_total_cost(50.0)
            .with_failure_strategy(FailureStrategy::Continue)
            .with_timeouts(10, 5)
            .with_retry_attempts(7);

        assert_eq!(config.max_total_cost, 50.0);
        assert_eq!(config.failure_strategy, FailureStrategy::Continue);
        assert_eq!(config.step_timeout_ms, 5);
        assert_eq!(config.retry_attempts, 7);
    }
}
