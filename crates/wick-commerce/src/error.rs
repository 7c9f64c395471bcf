//! Commerce error types.

use crate::money::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A validation message attached to a single input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name as the client submitted it (e.g. "postalCode").
    pub field: String,
    /// Human-readable message.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur in commerce operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommerceError {
    /// Bad input shape or customization combination.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },

    /// Missing product, cart item, cart, checkout or order.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Product cannot be purchased right now.
    #[error("Out of stock: {0}")]
    OutOfStock(String),

    /// The gateway refused the payment. Terminal for this attempt.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// The gateway did not answer in time. Retryable.
    #[error("Payment gateway timed out after {timeout_ms}ms")]
    GatewayTimeout { timeout_ms: u64 },

    /// Order total changed between authorization and confirmation.
    #[error("Price mismatch: authorized {authorized}, current total {current}")]
    PriceMismatch { authorized: Money, current: Money },

    /// State machine misuse.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Double confirmation or concurrent modification.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Currency mismatch.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unclassified payment gateway failure.
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CommerceError {
    /// A validation error without field detail.
    pub fn validation(message: impl Into<String>) -> Self {
        CommerceError::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// A validation error pinned to one field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        CommerceError::Validation {
            fields: vec![FieldError::new(field, message.clone())],
            message,
        }
    }

    /// A validation error carrying every failing field.
    pub fn invalid_fields(message: impl Into<String>, fields: Vec<FieldError>) -> Self {
        CommerceError::Validation {
            message: message.into(),
            fields,
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CommerceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        CommerceError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Whether the same request may be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommerceError::GatewayTimeout { .. })
    }

    /// Whether the error is caused by client input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CommerceError::Validation { .. }
                | CommerceError::NotFound { .. }
                | CommerceError::OutOfStock(_)
                | CommerceError::PaymentDeclined(_)
                | CommerceError::PriceMismatch { .. }
                | CommerceError::InvalidTransition { .. }
                | CommerceError::Conflict(_)
        )
    }
}

impl From<serde_json::Error> for CommerceError {
    fn from(e: serde_json::Error) -> Self {
        CommerceError::Serialization(e.to_string())
    }
}
