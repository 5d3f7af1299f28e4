use std::time::Duration;

use thiserror::Error;

/// Rejected rule, request or payload. Raised before anything is persisted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid condition at {path}: {message}")]
    InvalidCondition { path: String, message: String },

    #[error("Unknown action type: {0}")]
    UnknownActionType(String),

    #[error("Invalid action_config.{field}: {message}")]
    InvalidActionConfig { field: String, message: String },

    #[error("Invalid template in action_config.{field}: {message}")]
    InvalidTemplate { field: String, message: String },

    #[error("Placeholder {{{placeholder}}} in action_config.{field} is not a {event_type} payload field")]
    UnknownPlaceholder {
        field: String,
        placeholder: String,
        event_type: String,
    },

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
}

impl ValidationError {
    pub fn condition(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCondition {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn action_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidActionConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn rule(message: impl Into<String>) -> Self {
        Self::InvalidRule(message.into())
    }

    pub fn payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Runtime failure of a single rule's action. Recorded on the event, never raised to the emitter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Payload field '{0}' is missing; cannot resolve subject")]
    MissingSubject(String),

    #[error("Subject '{0}' does not exist")]
    UnknownSubject(String),

    #[error("Subject lookup failed: {0}")]
    SubjectLookup(String),

    #[error("Template placeholder {{{0}}} has no payload value")]
    MissingTemplateKey(String),

    #[error("No active community resource in category '{0}'")]
    NoEligibleResource(String),

    #[error("Resource lookup failed: {0}")]
    ResourceLookup(String),

    #[error("Scheduled time out of range: {0}")]
    InvalidSchedule(String),

    #[error("Dispatch timed out after {0:?}")]
    Timeout(Duration),
}

impl DispatchError {
    /// Whether a later attempt can succeed without the payload changing.
    ///
    /// Lookups and timeouts depend on collaborator state; the rest depend on
    /// the (immutable) payload alone.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UnknownSubject(_)
                | Self::SubjectLookup(_)
                | Self::NoEligibleResource(_)
                | Self::ResourceLookup(_)
                | Self::Timeout(_)
        )
    }
}

/// Errors raised by storage backends.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("Event {id} is not claimed by this attempt (status: {status})")]
    ClaimLost { id: String, status: String },

    #[error("Internal storage error: {message}")]
    Internal { message: String },
}

impl StorageError {
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn already_exists(entity: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn claim_lost(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::ClaimLost {
            id: id.into(),
            status: status.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Errors returned by the engine's public operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_messages_keep_braces() {
        let err = DispatchError::MissingTemplateKey("risk_level".into());
        assert_eq!(
            err.to_string(),
            "Template placeholder {risk_level} has no payload value"
        );

        let err = ValidationError::UnknownPlaceholder {
            field: "reason".into(),
            placeholder: "bmi".into(),
            event_type: "triage.assessed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Placeholder {bmi} in action_config.reason is not a triage.assessed payload field"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(DispatchError::NoEligibleResource("wellness".into()).is_transient());
        assert!(DispatchError::Timeout(Duration::from_secs(5)).is_transient());
        assert!(!DispatchError::MissingTemplateKey("x".into()).is_transient());
        assert!(!DispatchError::MissingSubject("patient_id".into()).is_transient());
    }

    #[test]
    fn test_workflow_error_is_transparent() {
        let err: WorkflowError = StorageError::not_found("DomainEvent", "e1").into();
        assert_eq!(err.to_string(), "DomainEvent not found: e1");
    }
}
