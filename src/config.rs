//! Configuration management for turnstile.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::RateLimitConfig;

/// Main configuration for the turnstile binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Rate limit rules
    #[serde(default)]
    pub rate_limiting: RateLimitConfig,

    /// Worker pool that exercises the limiter
    #[serde(default)]
    pub workload: WorkloadConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Workload configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Admission checks made by each worker
    #[serde(default = "default_requests_per_worker")]
    pub requests_per_worker: usize,

    /// Pause between a worker's requests in milliseconds
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,

    /// Give each worker its own bucket instead of sharing one
    #[serde(default)]
    pub per_worker_keys: bool,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            requests_per_worker: default_requests_per_worker(),
            pause_ms: default_pause_ms(),
            per_worker_keys: false,
        }
    }
}

impl WorkloadConfig {
    /// Pause between a worker's requests.
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

fn default_workers() -> usize {
    10
}

fn default_requests_per_worker() -> usize {
    5
}

fn default_pause_ms() -> u64 {
    400
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TurnstileConfig {
    /// Load configuration from a file path.
    ///
    /// Only parses; call [`TurnstileConfig::validate`] once overrides are applied.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string without validating it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TurnstileError::Config(e.to_string()))
    }

    /// Check every rate limit rule and the workload shape.
    pub fn validate(&self) -> Result<()> {
        self.rate_limiting.validate()?;

        if self.workload.workers == 0 {
            return Err(TurnstileError::Config(
                "workload.workers must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TurnstileConfig::default();

        assert_eq!(config.rate_limiting.default.capacity, 5);
        assert_eq!(config.rate_limiting.default.refill_rate, 2);
        assert_eq!(config.rate_limiting.default.refill_interval_ms, 1000);
        assert_eq!(config.workload.workers, 10);
        assert_eq!(config.workload.requests_per_worker, 5);
        assert_eq!(config.workload.pause(), Duration::from_millis(400));
        assert!(!config.workload.per_worker_keys);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TurnstileConfig::from_yaml("{}").unwrap();
        assert_eq!(config.workload.workers, 10);
        assert!(config.rate_limiting.keys.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
rate_limiting:
  default:
    capacity: 20
    refill_rate: 5
    refill_interval_ms: 250
  keys:
    worker-1:
      capacity: 1
      refill_rate: 1
      refill_interval_ms: 1000
workload:
  workers: 4
  requests_per_worker: 8
  pause_ms: 0
  per_worker_keys: true
logging:
  level: debug
  json: true
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.rate_limiting.default.capacity, 20);
        assert_eq!(config.rate_limiting.rule_for("worker-1").capacity, 1);
        assert_eq!(config.workload.workers, 4);
        assert_eq!(config.workload.pause(), Duration::ZERO);
        assert!(config.workload.per_worker_keys);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let yaml = r#"
rate_limiting:
  default:
    capacity: 0
    refill_rate: 1
    refill_interval_ms: 1000
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, TurnstileError::InvalidLimit(_)));
    }

    #[test]
    fn test_rejects_zero_workers() {
        let config = TurnstileConfig::from_yaml("workload: { workers: 0 }").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_invalid_values_can_be_fixed_before_validation() {
        let mut config = TurnstileConfig::from_yaml("workload: { workers: 0 }").unwrap();
        assert!(config.validate().is_err());

        config.workload.workers = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let err = TurnstileConfig::from_yaml("workload: [1, 2]").unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("turnstile-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "workload:\n  workers: 3\n").unwrap();

        let config = TurnstileConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.workload.workers, 3);
        assert_eq!(config.workload.requests_per_worker, 5);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = TurnstileConfig::from_file("/nonexistent/turnstile.yaml").unwrap_err();
        assert!(matches!(err, TurnstileError::Io(_)));
    }
}
