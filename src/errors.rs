use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoanError {
    /// malformed, missing or out-of-range input; nothing was persisted
    #[error("validation error: {message}")]
    Validation {
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// the record exists but does not belong where the request put it
    #[error("invalid reference: {message}")]
    InvalidReference {
        message: String,
    },

    #[error("unsupported {kind}: {value}")]
    UnsupportedUnit {
        kind: &'static str,
        value: String,
    },

    /// the store could not complete a write; the transaction was rolled back
    #[error("persistence failure: {message}")]
    Persistence {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl LoanError {
    pub fn validation(message: impl Into<String>) -> Self {
        LoanError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        LoanError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_reference(message: impl Into<String>) -> Self {
        LoanError::InvalidReference {
            message: message.into(),
        }
    }

    pub fn unsupported(kind: &'static str, value: impl Into<String>) -> Self {
        LoanError::UnsupportedUnit {
            kind,
            value: value.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        LoanError::Persistence {
            message: message.into(),
            source: None,
        }
    }

    pub fn persistence_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LoanError::Persistence {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// only store failures are worth retrying; everything else fails the same way twice
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoanError::Persistence { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LoanError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
