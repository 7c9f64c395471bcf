//! Payment gateway port.
//!
//! [`PaymentGateway`] is what checkout talks to. [`TimedGateway`] wraps any
//! implementation with a per-call timeout and retries for read-only lookups.

mod sandbox;
mod timed;
pub mod webhook;

pub use sandbox::SandboxGateway;
pub use timed::TimedGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wick_commerce::checkout::PaymentMethod;
use wick_commerce::ids::PaymentIntentId;
use wick_commerce::{CommerceError, Money};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GatewayError {
    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment gateway timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Unknown payment intent: {0}")]
    UnknownIntent(String),

    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Whether a read may succeed if tried again.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. } | GatewayError::Unavailable(_))
    }
}

impl From<GatewayError> for CommerceError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Declined(reason) => CommerceError::PaymentDeclined(reason),
            GatewayError::Timeout { timeout_ms } => CommerceError::GatewayTimeout { timeout_ms },
            GatewayError::UnknownIntent(id) => CommerceError::not_found("payment intent", id),
            GatewayError::Unavailable(_) => CommerceError::Gateway(e.to_string()),
        }
    }
}

/// Where an intent stands at the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresConfirmation,
    /// Authorized and waiting for capture.
    RequiresCapture,
    Succeeded,
    Canceled,
}

impl IntentStatus {
    /// Whether the customer's funds are held or taken.
    pub fn is_authorized(&self) -> bool {
        matches!(self, IntentStatus::RequiresCapture | IntentStatus::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub intent_id: PaymentIntentId,
    pub client_secret: String,
    pub amount: Money,
    pub status: IntentStatus,
}

/// Gateway answer to a confirm or capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub intent_id: PaymentIntentId,
    pub status: IntentStatus,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for `amount`. Repeating a key returns the same intent.
    async fn create_payment_intent(
        &self,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Authorize the intent with a payment method. Nothing is captured.
    async fn confirm_payment(
        &self,
        intent_id: &PaymentIntentId,
        method: PaymentMethod,
    ) -> Result<PaymentResult, GatewayError>;

    async fn retrieve_intent(&self, intent_id: &PaymentIntentId) -> Result<PaymentIntent, GatewayError>;

    /// Take the authorized funds. Repeating a key is a no-op.
    async fn capture_payment(
        &self,
        intent_id: &PaymentIntentId,
        idempotency_key: &str,
    ) -> Result<PaymentResult, GatewayError>;
}
