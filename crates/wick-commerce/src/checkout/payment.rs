//! Payment methods, authorizations and gateway events.

use crate::ids::PaymentIntentId;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    PayPal,
    ApplePay,
    GooglePay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::PayPal => "pay_pal",
            PaymentMethod::ApplePay => "apple_pay",
            PaymentMethod::GooglePay => "google_pay",
        }
    }

    /// Wallet methods are authorized by the wallet itself, not a card intent.
    pub fn is_wallet(&self) -> bool {
        !matches!(self, PaymentMethod::Card)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    /// Funds held, not yet captured.
    Authorized,
    Succeeded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// A successful authorization held by a checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    pub method: PaymentMethod,
    pub intent_id: PaymentIntentId,
    /// The rounded amount the customer agreed to pay.
    pub amount: Money,
    pub authorized_at: DateTime<Utc>,
}

/// Payment state recorded on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    /// Gateway intent id.
    pub transaction_id: PaymentIntentId,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Kinds of gateway events the storefront reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentEventKind {
    #[serde(rename = "payment_intent.succeeded")]
    Succeeded,
    #[serde(rename = "payment_intent.payment_failed")]
    Failed,
}

impl PaymentEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEventKind::Succeeded => "payment_intent.succeeded",
            PaymentEventKind::Failed => "payment_intent.payment_failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "payment_intent.succeeded" => Some(PaymentEventKind::Succeeded),
            "payment_intent.payment_failed" => Some(PaymentEventKind::Failed),
            _ => None,
        }
    }
}

/// A verified gateway event about one payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    /// Gateway event id, used for deduplication.
    pub id: String,
    pub kind: PaymentEventKind,
    pub intent_id: PaymentIntentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub received_at: DateTime<Utc>,
}
