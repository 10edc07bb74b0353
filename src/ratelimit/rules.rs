//! Rate limit rules and their validation.
//!
//! A [`LimitRule`] is the configuration form of a bucket: plain integers as they
//! appear in YAML. Before a bucket is built the rule is validated into
//! [`Limits`], whose fields can no longer be zero.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::time::Duration;

use crate::error::{Result, TurnstileError};

const DEFAULT_CAPACITY: u64 = 5;
const DEFAULT_REFILL_RATE: u64 = 2;
const DEFAULT_REFILL_INTERVAL_MS: u64 = 1000;

/// Validated bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    capacity: NonZeroU64,
    refill_rate: NonZeroU64,
    refill_interval: Duration,
}

impl Limits {
    /// Validate a capacity, refill rate and refill interval.
    ///
    /// Fails with [`TurnstileError::InvalidLimit`] if any of them is zero.
    pub fn new(capacity: u64, refill_rate: u64, refill_interval: Duration) -> Result<Self> {
        let capacity = NonZeroU64::new(capacity)
            .ok_or_else(|| TurnstileError::InvalidLimit("capacity must be positive".into()))?;
        let refill_rate = NonZeroU64::new(refill_rate)
            .ok_or_else(|| TurnstileError::InvalidLimit("refill rate must be positive".into()))?;
        if refill_interval.is_zero() {
            return Err(TurnstileError::InvalidLimit(
                "refill interval must be positive".into(),
            ));
        }

        Ok(Self {
            capacity,
            refill_rate,
            refill_interval,
        })
    }

    /// Maximum number of tokens the bucket can hold.
    pub fn capacity(&self) -> u64 {
        self.capacity.get()
    }

    /// Tokens granted per completed refill interval.
    pub fn refill_rate(&self) -> u64 {
        self.refill_rate.get()
    }

    /// Length of one refill tick.
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }
}

/// A rate limit rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    /// Maximum burst size
    pub capacity: u64,
    /// Tokens added per refill interval
    pub refill_rate: u64,
    /// Refill interval in milliseconds
    pub refill_interval_ms: u64,
    /// Optional name for this limit, included in validation errors
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for LimitRule {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            refill_rate: DEFAULT_REFILL_RATE,
            refill_interval_ms: DEFAULT_REFILL_INTERVAL_MS,
            name: None,
        }
    }
}

impl LimitRule {
    /// Validate this rule into bucket parameters.
    pub fn limits(&self) -> Result<Limits> {
        Limits::new(
            self.capacity,
            self.refill_rate,
            Duration::from_millis(self.refill_interval_ms),
        )
        .map_err(|e| match (&self.name, e) {
            (Some(name), TurnstileError::InvalidLimit(msg)) => {
                TurnstileError::InvalidLimit(format!("rule '{}': {}", name, msg))
            }
            (_, e) => e,
        })
    }
}

/// The set of rules a keyed limiter draws from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Rule applied to any key without an override
    #[serde(default)]
    pub default: LimitRule,
    /// Per-key overrides
    #[serde(default)]
    pub keys: HashMap<String, LimitRule>,
}

impl RateLimitConfig {
    /// Create a configuration with the given default rule and no overrides.
    pub fn new(default: LimitRule) -> Self {
        Self {
            default,
            keys: HashMap::new(),
        }
    }

    /// Add a per-key override.
    pub fn with_key(mut self, key: impl Into<String>, rule: LimitRule) -> Self {
        self.keys.insert(key.into(), rule);
        self
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RateLimitConfig = serde_yaml::from_str(yaml).map_err(|e| {
            TurnstileError::Config(format!("Failed to parse rate limit rules: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Find the rule for a key, falling back to the default.
    pub fn rule_for(&self, key: &str) -> &LimitRule {
        self.keys.get(key).unwrap_or(&self.default)
    }

    /// Validated limits for a key, from its override or the default rule.
    pub fn limits_for(&self, key: &str) -> Result<Limits> {
        self.rule_for(key).limits()
    }

    /// Check that the default and every override describe a usable bucket.
    pub fn validate(&self) -> Result<()> {
        self.default.limits()?;
        for (key, rule) in &self.keys {
            rule.limits().map_err(|e| match e {
                TurnstileError::InvalidLimit(msg) => {
                    TurnstileError::InvalidLimit(format!("override for key '{}': {}", key, msg))
                }
                e => e,
            })?;
        }
        Ok(())
    }

    /// Validate every rule, returning the default limits and the per-key overrides.
    pub(crate) fn resolve(&self) -> Result<(Limits, HashMap<String, Limits>)> {
        self.validate()?;
        let default = self.default.limits()?;
        let overrides = self
            .keys
            .iter()
            .map(|(key, rule)| rule.limits().map(|limits| (key.clone(), limits)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok((default, overrides))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_reject_zero_values() {
        let second = Duration::from_secs(1);

        assert!(matches!(
            Limits::new(0, 2, second),
            Err(TurnstileError::InvalidLimit(_))
        ));
        assert!(matches!(
            Limits::new(5, 0, second),
            Err(TurnstileError::InvalidLimit(_))
        ));
        assert!(matches!(
            Limits::new(5, 2, Duration::ZERO),
            Err(TurnstileError::InvalidLimit(_))
        ));
        assert!(Limits::new(5, 2, second).is_ok());
    }

    #[test]
    fn test_default_rule_matches_demo_limits() {
        let limits = LimitRule::default().limits().unwrap();
        assert_eq!(limits.capacity(), 5);
        assert_eq!(limits.refill_rate(), 2);
        assert_eq!(limits.refill_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_parse_rules_with_overrides() {
        let yaml = r#"
default:
  capacity: 10
  refill_rate: 1
  refill_interval_ms: 500
keys:
  premium:
    capacity: 100
    refill_rate: 50
    refill_interval_ms: 1000
    name: premium_tier
"#;
        let config = RateLimitConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.default.capacity, 10);
        assert_eq!(config.rule_for("premium").capacity, 100);
        assert_eq!(config.rule_for("premium").name.as_deref(), Some("premium_tier"));

        // Unknown keys fall back to the default rule
        assert_eq!(config.rule_for("someone_else").capacity, 10);
    }

    #[test]
    fn test_parse_rejects_invalid_override() {
        let yaml = r#"
keys:
  broken:
    capacity: 0
    refill_rate: 1
    refill_interval_ms: 1000
"#;
        let err = RateLimitConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, TurnstileError::InvalidLimit(_)));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_default_and_override_errors_share_variant() {
        let zero_rate = LimitRule {
            capacity: 5,
            refill_rate: 0,
            refill_interval_ms: 1000,
            name: None,
        };

        let in_default = RateLimitConfig::new(zero_rate.clone()).validate().unwrap_err();
        let in_override = RateLimitConfig::default()
            .with_key("reports", zero_rate)
            .validate()
            .unwrap_err();

        assert!(matches!(in_default, TurnstileError::InvalidLimit(_)));
        assert!(matches!(in_override, TurnstileError::InvalidLimit(_)));
    }

    #[test]
    fn test_limits_for_prefers_override() {
        let config = RateLimitConfig::default().with_key(
            "shared",
            LimitRule {
                capacity: 2,
                refill_rate: 1,
                refill_interval_ms: 100,
                name: None,
            },
        );

        assert_eq!(config.limits_for("shared").unwrap().capacity(), 2);
        assert_eq!(config.limits_for("other").unwrap().capacity(), 5);
    }

    #[test]
    fn test_parse_rejects_malformed_yaml() {
        let err = RateLimitConfig::from_yaml("default: [not, a, rule]").unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_named_rule_error_mentions_name() {
        let rule = LimitRule {
            capacity: 3,
            refill_rate: 1,
            refill_interval_ms: 0,
            name: Some("uploads".to_string()),
        };
        let err = rule.limits().unwrap_err();
        assert!(err.to_string().contains("uploads"));
    }

    #[test]
    fn test_resolve_returns_validated_overrides() {
        let config = RateLimitConfig::default().with_key(
            "batch",
            LimitRule {
                capacity: 20,
                refill_rate: 4,
                refill_interval_ms: 250,
                name: None,
            },
        );

        let (default, overrides) = config.resolve().unwrap();
        assert_eq!(default.capacity(), 5);
        assert_eq!(overrides["batch"].refill_interval(), Duration::from_millis(250));
    }
}
