use thiserror::Error;

/// Core error types for CareFlow record handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl CoreError {
    /// Create a new UnknownVariant error
    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }
}
