use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use careflow_workflow::{RuleDefinition, RulesConfig, WorkflowRule, demo_rules};

use crate::cli::OutputFormat;
use crate::fixture::read_json;
use crate::output::{print_failure, print_json, print_rule_definitions, print_success};

/// Validation verdict for one entry of a rules file
#[derive(Debug, Serialize)]
pub struct RuleCheck {
    pub index: usize,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Checks every entry of a JSON array of rule definitions.
pub fn check_rules(value: Value, options: &RulesConfig) -> Result<Vec<RuleCheck>> {
    let Value::Array(entries) = value else {
        anyhow::bail!("Rules file must contain a JSON array of rule definitions");
    };

    let mut seen = HashSet::new();
    let checks = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let name = entry.get("name").and_then(Value::as_str).map(str::to_string);
            let error = match serde_json::from_value::<RuleDefinition>(entry) {
                Err(e) => Some(e.to_string()),
                Ok(def) => match WorkflowRule::from_definition(def, options) {
                    Err(e) => Some(e.to_string()),
                    Ok(rule) if !seen.insert(rule.name.clone()) => {
                        Some(format!("duplicate rule name '{}'", rule.name))
                    }
                    Ok(_) => None,
                },
            };
            RuleCheck { index, name, error }
        })
        .collect();
    Ok(checks)
}

pub fn validate(path: &Path, options: &RulesConfig, format: OutputFormat) -> Result<()> {
    let checks = check_rules(read_json(path)?, options)?;
    let invalid = checks.iter().filter(|c| c.error.is_some()).count();

    match format {
        OutputFormat::Json => print_json(&checks)?,
        OutputFormat::Table => {
            for check in &checks {
                let label = check.name.as_deref().unwrap_or("<unnamed>");
                match &check.error {
                    None => print_success(&format!("#{} {label}", check.index)),
                    Some(e) => print_failure(&format!("#{} {label}: {e}", check.index)),
                }
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} of {} rules are invalid", checks.len());
    }
    Ok(())
}

pub fn demo(format: OutputFormat) -> Result<()> {
    let rules = demo_rules();
    match format {
        OutputFormat::Json => print_json(&rules),
        OutputFormat::Table => {
            print_rule_definitions(&rules);
            Ok(())
        }
    }
}
