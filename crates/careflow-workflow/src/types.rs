use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::error::ValidationError;

/// Flat map of payload fields carried by a domain event
pub type Payload = serde_json::Map<String, Value>;

/// Checks that a payload is flat: every value is a scalar or a list of scalars.
pub fn validate_payload(payload: &Payload) -> Result<(), ValidationError> {
    for (key, value) in payload {
        match value {
            Value::Object(_) => {
                return Err(ValidationError::payload(format!(
                    "field '{key}' is a nested object"
                )));
            }
            Value::Array(items) => {
                if items
                    .iter()
                    .any(|item| matches!(item, Value::Object(_) | Value::Array(_)))
                {
                    return Err(ValidationError::payload(format!(
                        "field '{key}' must be a list of scalars"
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Looks up a payload field, treating JSON `null` as absent.
pub fn payload_value<'a>(payload: &'a Payload, field: &str) -> Option<&'a Value> {
    payload.get(field).filter(|value| !value.is_null())
}

/// Domain event processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    /// Claimed by a processing attempt that has not committed yet
    Processing,
    Processed,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Processing => "processing",
            EventStatus::Processed => "processed",
            EventStatus::Failed => "failed",
        }
    }

    /// Whether a processing attempt may claim an event in this status.
    pub fn is_claimable(&self) -> bool {
        matches!(self, EventStatus::Pending | EventStatus::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Processed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "processing" => Ok(EventStatus::Processing),
            "processed" => Ok(EventStatus::Processed),
            "failed" => Ok(EventStatus::Failed),
            _ => Err(ValidationError::rule(format!("unknown event status '{s}'"))),
        }
    }
}

/// A recorded business occurrence and its processing state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: String,
    pub event_type: String,

    /// Free-form origin tag (e.g. "triage.assess")
    pub source: String,

    /// Immutable once created
    pub payload: Payload,

    pub status: EventStatus,

    /// Number of completed processing attempts
    pub attempts: u32,

    /// Set iff status is failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,

    /// Set iff status is processed
    #[serde(with = "time::serde::rfc3339::option")]
    pub processed_at: Option<OffsetDateTime>,

    /// Set iff status is processing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<Claim>,
}

/// Hold an in-flight attempt has on an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub claimed_at: OffsetDateTime,
}

impl DomainEvent {
    /// Creates a pending event that has not been attempted yet.
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: careflow_core::generate_id(),
            event_type: event_type.into(),
            source: source.into(),
            payload,
            status: EventStatus::Pending,
            attempts: 0,
            error_message: None,
            occurred_at: careflow_core::now_utc(),
            processed_at: None,
            claim: None,
        }
    }

    pub fn with_occurred_at(mut self, occurred_at: OffsetDateTime) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Whether `claim_id` is the attempt currently holding this event.
    pub fn is_claimed_by(&self, claim_id: &str) -> bool {
        self.status == EventStatus::Processing
            && self.claim.as_ref().is_some_and(|claim| claim.id == claim_id)
    }

    /// Whether the event is held by a claim taken before `cutoff`.
    ///
    /// A processing event without a claim record counts as stale.
    pub fn is_claim_stale(&self, cutoff: OffsetDateTime) -> bool {
        self.status == EventStatus::Processing
            && self
                .claim
                .as_ref()
                .is_none_or(|claim| claim.claimed_at < cutoff)
    }

    /// Marks the event as held by a new attempt.
    pub fn begin_attempt(&mut self, claimed_at: OffsetDateTime) -> &Claim {
        self.status = EventStatus::Processing;
        self.claim.insert(Claim {
            id: careflow_core::generate_id(),
            claimed_at,
        })
    }

    /// Ends the current attempt successfully.
    pub fn finish_processed(&mut self, finished_at: OffsetDateTime) {
        self.attempts += 1;
        self.status = EventStatus::Processed;
        self.error_message = None;
        self.processed_at = Some(finished_at);
        self.claim = None;
    }

    /// Ends the current attempt as failed, appending `error` to the
    /// failure history as `attempt N: error`.
    pub fn finish_failed(&mut self, error: &str) {
        self.attempts += 1;
        let line = format!("attempt {}: {error}", self.attempts);
        self.error_message = Some(match self.error_message.take() {
            Some(history) => format!("{history}\n{line}"),
            None => line,
        });
        self.status = EventStatus::Failed;
        self.processed_at = None;
        self.claim = None;
    }
}

/// Who an emission or sweep acts on behalf of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

impl Actor {
    pub fn user(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }

    pub fn system(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Value stored in `created_by` / `referred_by` on care records.
    pub fn attribution(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.name.clone())
    }
}

/// Filter for the event listing surface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl EventQuery {
    pub fn matches(&self, event: &DomainEvent) -> bool {
        if let Some(ref event_type) = self.event_type
            && event.event_type != *event_type
        {
            return false;
        }
        if let Some(status) = self.status
            && event.status != status
        {
            return false;
        }
        true
    }
}

/// Event counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
    pub pending: u32,
    pub processing: u32,
    pub processed: u32,
    pub failed: u32,
}
