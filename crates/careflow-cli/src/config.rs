use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use careflow_workflow::WorkflowConfig;
use config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "careflow.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.logging.level.trim().is_empty() {
            anyhow::bail!("logging.level must not be empty");
        }
        self.workflow
            .validate()
            .context("invalid workflow configuration")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Loads the file at `path` (or `careflow.toml` if it exists), then applies
/// `CAREFLOW__*` environment overrides, e.g. `CAREFLOW__WORKFLOW__SWEEP__LIMIT=50`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    load_config_with_env(path, None)
}

/// Like [`load_config`], reading overrides from `env` instead of the process
/// environment when given.
pub fn load_config_with_env(
    path: Option<&Path>,
    env: Option<Map<String, String>>,
) -> Result<AppConfig> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("config file not found: {}", p.display());
            }
            builder = builder.add_source(File::from(p.to_path_buf()));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix("CAREFLOW")
            .try_parsing(true)
            .separator("__")
            .source(env),
    );

    let merged: AppConfig = builder
        .build()
        .context("config build error")?
        .try_deserialize()
        .context("config deserialize error")?;
    merged.validate()?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let file = write_config(
            r#"
[logging]
level = "debug"

[workflow.sweep]
limit = 50
include_failed = true

[workflow.dispatch]
rule_timeout_ms = 250
"#,
        );

        let config = load_config_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.workflow.sweep.limit, 50);
        assert!(config.workflow.sweep.include_failed);
        assert_eq!(config.workflow.sweep.max_attempts, 3);
        assert_eq!(config.workflow.dispatch.rule_timeout_ms, 250);
        assert_eq!(config.workflow.dispatch.subject_field, "patient_id");
        assert!(config.workflow.rules.enforce_payload_contracts);
    }

    #[test]
    fn test_out_of_range_file_rejected() {
        let file = write_config("[workflow.sweep]\nmax_attempts = 50\n");
        let err = load_config_with_env(Some(file.path()), env(&[])).unwrap_err();
        assert!(format!("{err:#}").contains("max_attempts"), "{err:#}");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config_with_env(Some(&missing), env(&[])).is_err());
    }

    fn env(vars: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_config("[workflow.sweep]\nlimit = 50\nmax_attempts = 5\n");
        let config = load_config_with_env(
            Some(file.path()),
            env(&[
                ("CAREFLOW__WORKFLOW__SWEEP__LIMIT", "75"),
                ("CAREFLOW__WORKFLOW__SWEEP__INCLUDE_FAILED", "true"),
                ("CAREFLOW__LOGGING__LEVEL", "debug"),
                ("UNRELATED__WORKFLOW__SWEEP__LIMIT", "1"),
            ]),
        )
        .unwrap();
        assert_eq!(config.workflow.sweep.limit, 75);
        assert!(config.workflow.sweep.include_failed);
        assert_eq!(config.workflow.sweep.max_attempts, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_environment_override_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("careflow.toml");
        std::fs::write(&file, "").unwrap();
        let err = load_config_with_env(
            Some(&file),
            env(&[("CAREFLOW__WORKFLOW__SWEEP__LIMIT", "0")]),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("limit"), "{err:#}");
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("careflow.example.toml");
        let config = load_config_with_env(Some(&path), env(&[])).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(
            toml::to_string_pretty(&config).unwrap(),
            toml::to_string_pretty(&defaults).unwrap()
        );
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let rendered = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let file = write_config(&rendered);
        let config = load_config_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.workflow.sweep.limit, 25);
        assert_eq!(config.logging.level, "info");
    }
}
