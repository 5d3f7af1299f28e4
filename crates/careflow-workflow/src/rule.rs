//! Workflow rules: an event type, a condition and one action.
//!
//! Admins submit rules as loosely-typed JSON ([`RuleDefinition`]). Each
//! definition is parsed once into a typed [`WorkflowRule`] so malformed
//! conditions, configs and templates are rejected before the rule is stored.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use careflow_core::{AlertSeverity, ReferralStatus, ResourceCategory};

use crate::condition::Condition;
use crate::config::RulesConfig;
use crate::contracts::contract_for;
use crate::error::ValidationError;
use crate::template::Template;

/// Ten years
pub const MAX_SCHEDULED_IN_HOURS: f64 = 87_600.0;

/// Rule action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CreateAlert,
    CreateAppointment,
    CreateReferral,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateAlert => "create_alert",
            ActionType::CreateAppointment => "create_appointment",
            ActionType::CreateReferral => "create_referral",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_alert" => Ok(ActionType::CreateAlert),
            "create_appointment" => Ok(ActionType::CreateAppointment),
            "create_referral" => Ok(ActionType::CreateReferral),
            _ => Err(ValidationError::UnknownActionType(s.to_string())),
        }
    }
}

/// Rule as submitted by the admin surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub event_type: String,
    #[serde(default = "empty_object")]
    pub condition: Value,
    pub action_type: String,
    #[serde(default = "empty_object")]
    pub action_config: Value,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn default_priority() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertAction {
    pub severity: AlertSeverity,
    pub title: Template,
    pub message: Template,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentAction {
    pub clinician_name: String,
    /// Offset from dispatch time; may be fractional
    pub scheduled_in_hours: f64,
    pub reason: Template,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferralAction {
    pub resource_category: ResourceCategory,
    pub reason: Template,
    pub status: ReferralStatus,
}

/// Typed action parameters
#[derive(Debug, Clone, PartialEq)]
pub enum RuleAction {
    CreateAlert(AlertAction),
    CreateAppointment(AppointmentAction),
    CreateReferral(ReferralAction),
}

impl RuleAction {
    pub fn parse(action_type: &str, config: &Value) -> Result<Self, ValidationError> {
        let action_type: ActionType = action_type.parse()?;
        let config = config
            .as_object()
            .ok_or_else(|| ValidationError::action_config("*", "expected an object"))?;

        match action_type {
            ActionType::CreateAlert => {
                let severity = required_str(config, "severity")?;
                let severity = severity
                    .parse()
                    .map_err(|e: careflow_core::CoreError| {
                        ValidationError::action_config("severity", e.to_string())
                    })?;
                Ok(RuleAction::CreateAlert(AlertAction {
                    severity,
                    title: required_template(config, "title")?,
                    message: required_template(config, "message")?,
                }))
            }
            ActionType::CreateAppointment => {
                let clinician_name = required_str(config, "clinician_name")?;
                if clinician_name.trim().is_empty() {
                    return Err(ValidationError::action_config(
                        "clinician_name",
                        "must not be blank",
                    ));
                }
                let hours = config
                    .get("scheduled_in_hours")
                    .ok_or_else(|| ValidationError::action_config("scheduled_in_hours", "is required"))?
                    .as_f64()
                    .ok_or_else(|| {
                        ValidationError::action_config("scheduled_in_hours", "must be a number")
                    })?;
                if !(0.0..=MAX_SCHEDULED_IN_HOURS).contains(&hours) {
                    return Err(ValidationError::action_config(
                        "scheduled_in_hours",
                        format!("must be between 0 and {MAX_SCHEDULED_IN_HOURS} hours"),
                    ));
                }
                Ok(RuleAction::CreateAppointment(AppointmentAction {
                    clinician_name: clinician_name.to_string(),
                    scheduled_in_hours: hours,
                    reason: optional_template(config, "reason")?,
                }))
            }
            ActionType::CreateReferral => {
                let resource_category = required_str(config, "resource_category")?
                    .parse()
                    .map_err(|e: careflow_core::CoreError| {
                        ValidationError::action_config("resource_category", e.to_string())
                    })?;
                let status = match config.get("status") {
                    None | Some(Value::Null) => ReferralStatus::default(),
                    Some(Value::String(s)) => s.parse().map_err(|e: careflow_core::CoreError| {
                        ValidationError::action_config("status", e.to_string())
                    })?,
                    Some(_) => {
                        return Err(ValidationError::action_config("status", "must be a string"));
                    }
                };
                Ok(RuleAction::CreateReferral(ReferralAction {
                    resource_category,
                    reason: optional_template(config, "reason")?,
                    status,
                }))
            }
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            RuleAction::CreateAlert(_) => ActionType::CreateAlert,
            RuleAction::CreateAppointment(_) => ActionType::CreateAppointment,
            RuleAction::CreateReferral(_) => ActionType::CreateReferral,
        }
    }

    /// Templates keyed by their `action_config` field.
    pub fn templates(&self) -> Vec<(&'static str, &Template)> {
        match self {
            RuleAction::CreateAlert(a) => vec![("title", &a.title), ("message", &a.message)],
            RuleAction::CreateAppointment(a) => vec![("reason", &a.reason)],
            RuleAction::CreateReferral(a) => vec![("reason", &a.reason)],
        }
    }

    pub fn config_json(&self) -> Value {
        match self {
            RuleAction::CreateAlert(a) => json!({
                "severity": a.severity,
                "title": a.title,
                "message": a.message,
            }),
            RuleAction::CreateAppointment(a) => json!({
                "clinician_name": a.clinician_name,
                "scheduled_in_hours": a.scheduled_in_hours,
                "reason": a.reason,
            }),
            RuleAction::CreateReferral(a) => json!({
                "resource_category": a.resource_category,
                "reason": a.reason,
                "status": a.status,
            }),
        }
    }
}

/// Serialises as the `action_type` / `action_config` pair of the authoring JSON.
impl Serialize for RuleAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("action_type", &self.action_type())?;
        map.serialize_entry("action_config", &self.config_json())?;
        map.end()
    }
}

fn required_str<'a>(config: &'a Map<String, Value>, field: &str) -> Result<&'a str, ValidationError> {
    match config.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::action_config(field, "must be a string")),
        None => Err(ValidationError::action_config(field, "is required")),
    }
}

fn required_template(config: &Map<String, Value>, field: &str) -> Result<Template, ValidationError> {
    let source = required_str(config, field)?;
    parse_template(field, source)
}

fn optional_template(config: &Map<String, Value>, field: &str) -> Result<Template, ValidationError> {
    match config.get(field) {
        None | Some(Value::Null) => parse_template(field, ""),
        Some(Value::String(s)) => parse_template(field, s),
        Some(_) => Err(ValidationError::action_config(field, "must be a string")),
    }
}

fn parse_template(field: &str, source: &str) -> Result<Template, ValidationError> {
    Template::parse(source).map_err(|message| ValidationError::InvalidTemplate {
        field: field.to_string(),
        message,
    })
}

/// Validated rule consumed by the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub event_type: String,
    pub condition: Condition,
    #[serde(flatten)]
    pub action: RuleAction,
    /// Lower fires earlier
    pub priority: u32,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl WorkflowRule {
    pub fn from_definition(
        definition: RuleDefinition,
        options: &RulesConfig,
    ) -> Result<Self, ValidationError> {
        let name = definition.name.trim();
        if name.is_empty() {
            return Err(ValidationError::rule("name must not be empty"));
        }
        let event_type = definition.event_type.trim();
        if event_type.is_empty() {
            return Err(ValidationError::rule("event_type must not be empty"));
        }

        let condition = Condition::parse(&definition.condition, options.max_condition_depth)?;
        let action = RuleAction::parse(&definition.action_type, &definition.action_config)?;

        if options.enforce_payload_contracts
            && let Some(contract) = contract_for(event_type)
        {
            for (field, template) in action.templates() {
                if let Some(unknown) = template.placeholders().find(|p| !contract.has_field(p)) {
                    return Err(ValidationError::UnknownPlaceholder {
                        field: field.to_string(),
                        placeholder: unknown.to_string(),
                        event_type: event_type.to_string(),
                    });
                }
            }
        }

        let now = careflow_core::now_utc();
        Ok(Self {
            id: definition.id.unwrap_or_else(careflow_core::generate_id),
            name: name.to_string(),
            description: definition.description,
            event_type: event_type.to_string(),
            condition,
            action,
            priority: definition.priority,
            active: definition.active,
            created_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn action_type(&self) -> ActionType {
        self.action.action_type()
    }

    /// Authoring JSON equivalent of this rule.
    pub fn to_definition(&self) -> RuleDefinition {
        RuleDefinition {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            description: self.description.clone(),
            event_type: self.event_type.clone(),
            condition: self.condition.to_json(),
            action_type: self.action_type().as_str().to_string(),
            action_config: self.action.config_json(),
            priority: self.priority,
            active: self.active,
        }
    }
}
