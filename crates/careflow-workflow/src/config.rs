use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ValidationError;

pub const SWEEP_LIMIT_RANGE: (u32, u32) = (1, 200);
pub const SWEEP_MAX_ATTEMPTS_RANGE: (u32, u32) = (1, 20);
/// One day
pub const MAX_CLAIM_TTL_MS: u64 = 86_400_000;

/// Workflow engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("sweep.limit", self.sweep.limit, SWEEP_LIMIT_RANGE)?;
        check_range(
            "sweep.max_attempts",
            self.sweep.max_attempts,
            SWEEP_MAX_ATTEMPTS_RANGE,
        )?;
        if self.sweep.poll_interval_ms == 0 {
            return Err(ValidationError::config("sweep.poll_interval_ms must be > 0"));
        }
        if self.sweep.claim_ttl_ms == 0 || self.sweep.claim_ttl_ms > MAX_CLAIM_TTL_MS {
            return Err(ValidationError::config(format!(
                "sweep.claim_ttl_ms must be between 1 and {MAX_CLAIM_TTL_MS}"
            )));
        }
        if self.dispatch.rule_timeout_ms == 0 {
            return Err(ValidationError::config("dispatch.rule_timeout_ms must be > 0"));
        }
        if self.dispatch.subject_field.is_empty() {
            return Err(ValidationError::config("dispatch.subject_field must not be empty"));
        }
        if self.rules.max_condition_depth == 0 {
            return Err(ValidationError::config("rules.max_condition_depth must be > 0"));
        }
        Ok(())
    }
}

/// Defaults for the recovery sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_limit")]
    pub limit: u32,
    #[serde(default)]
    pub include_failed: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Interval of the periodic sweep loop
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Age after which a `processing` claim is treated as abandoned
    #[serde(default = "default_claim_ttl_ms")]
    pub claim_ttl_ms: u64,
}

impl SweepConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn claim_ttl(&self) -> Duration {
        Duration::from_millis(self.claim_ttl_ms)
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            limit: default_sweep_limit(),
            include_failed: false,
            max_attempts: default_max_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            claim_ttl_ms: default_claim_ttl_ms(),
        }
    }
}

fn default_sweep_limit() -> u32 {
    25
}

fn default_max_attempts() -> u32 {
    3
}

fn default_poll_interval_ms() -> u64 {
    60_000
}

fn default_claim_ttl_ms() -> u64 {
    300_000
}

/// Action dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on one rule's dispatch
    #[serde(default = "default_rule_timeout_ms")]
    pub rule_timeout_ms: u64,
    /// Payload field naming the patient an action applies to
    #[serde(default = "default_subject_field")]
    pub subject_field: String,
}

impl DispatchConfig {
    pub fn rule_timeout(&self) -> Duration {
        Duration::from_millis(self.rule_timeout_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rule_timeout_ms: default_rule_timeout_ms(),
            subject_field: default_subject_field(),
        }
    }
}

fn default_rule_timeout_ms() -> u64 {
    5_000
}

fn default_subject_field() -> String {
    "patient_id".to_string()
}

/// Rule authoring checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_max_condition_depth")]
    pub max_condition_depth: usize,
    #[serde(default = "default_true")]
    pub enforce_payload_contracts: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            max_condition_depth: default_max_condition_depth(),
            enforce_payload_contracts: true,
        }
    }
}

fn default_max_condition_depth() -> usize {
    8
}

fn default_true() -> bool {
    true
}

pub(crate) fn check_range(
    field: &'static str,
    value: u32,
    (min, max): (u32, u32),
) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            min: min.into(),
            max: max.into(),
            value: value.into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.sweep.limit, 25);
        assert!(!config.sweep.include_failed);
        assert_eq!(config.sweep.max_attempts, 3);
        assert_eq!(config.sweep.claim_ttl(), Duration::from_secs(300));
        assert_eq!(config.dispatch.rule_timeout(), Duration::from_secs(5));
        assert_eq!(config.dispatch.subject_field, "patient_id");
        assert_eq!(config.rules.max_condition_depth, 8);
        assert!(config.rules.enforce_payload_contracts);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: WorkflowConfig =
            serde_json::from_value(serde_json::json!({"sweep": {"limit": 50}})).unwrap();
        assert_eq!(config.sweep.limit, 50);
        assert_eq!(config.sweep.max_attempts, 3);
        assert_eq!(config.dispatch.rule_timeout_ms, 5_000);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut config = WorkflowConfig::default();
        config.sweep.limit = 500;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::OutOfRange { field: "sweep.limit", .. })
        ));

        let mut config = WorkflowConfig::default();
        config.sweep.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = WorkflowConfig::default();
        config.dispatch.rule_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = WorkflowConfig::default();
        config.sweep.claim_ttl_ms = 0;
        assert!(config.validate().is_err());
        config.sweep.claim_ttl_ms = MAX_CLAIM_TTL_MS + 1;
        assert!(config.validate().is_err());
    }
}
