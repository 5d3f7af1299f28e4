use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use careflow_core::{CommunityResource, PatientRecord};
use careflow_workflow::{Payload, RuleDefinition};

/// Input for `careflow simulate`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub patients: Vec<PatientRecord>,
    #[serde(default)]
    pub resources: Vec<CommunityResource>,
    /// Rule definitions; the demo rules are used when omitted
    #[serde(default)]
    pub rules: Option<Vec<RuleDefinition>>,
    #[serde(default)]
    pub events: Vec<FixtureEvent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FixtureEvent {
    pub event_type: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub payload: Payload,
}

fn default_source() -> String {
    "fixture".into()
}

pub fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

pub fn load_fixture(path: &Path) -> Result<Fixture> {
    let value = read_json(path)?;
    serde_json::from_value(value).with_context(|| format!("Invalid fixture: {}", path.display()))
}
