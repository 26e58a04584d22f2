use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use super::types::ItemId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    #[error("Authentication required")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Target '{0}' already has a mutation in flight")]
    Locked(ItemId),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Content store error: {0}")]
    Store(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;

impl FeedError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.clone());
        Self::Validation { message, fields }
    }

    /// Presentation should prompt for sign-in instead of offering a retry.
    pub fn requires_authentication(&self) -> bool {
        matches!(self, FeedError::Unauthorized)
    }

    /// Failures a user may retry by hand.
    pub fn is_transient(&self) -> bool {
        matches!(self, FeedError::Transport(_) | FeedError::Timeout(_))
    }

    /// Per-field messages for errors that came from a structured form.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            FeedError::Validation { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for FeedError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<tokio::task::JoinError> for FeedError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Transport(format!("request task failed: {err}"))
    }
}
