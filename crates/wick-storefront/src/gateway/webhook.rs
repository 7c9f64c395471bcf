//! Inbound payment webhook verification and parsing.
//!
//! The gateway signs each delivery with HMAC-SHA256 over `"{timestamp}.{body}"`
//! and sends `Wick-Signature: t=<unix seconds>,v1=<hex digest>`. The signature
//! is checked before the body is parsed.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use wick_commerce::checkout::{PaymentEvent, PaymentEventKind};
use wick_commerce::ids::PaymentIntentId;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "wick-signature";

#[derive(Debug, Error, PartialEq)]
pub enum WebhookError {
    #[error("Missing signature header")]
    MissingSignature,

    #[error("Malformed signature header")]
    MalformedSignature,

    #[error("Signature does not match payload")]
    SignatureMismatch,

    #[error("Signature timestamp outside tolerance ({age_secs}s old)")]
    Expired { age_secs: i64 },

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// Checks `Wick-Signature` headers against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl AsRef<[u8]>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            tolerance_secs,
        }
    }

    fn mac(&self, timestamp: i64, body: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac
    }

    /// Header value for `body` signed at `timestamp`.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> String {
        let digest = self.mac(timestamp, body).finalize().into_bytes();
        format!("t={},v1={}", timestamp, hex::encode(digest))
    }

    /// Verify a signature header for `body` as of `now`.
    pub fn verify(
        &self,
        header: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let header = header.ok_or(WebhookError::MissingSignature)?;

        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| WebhookError::MalformedSignature)?,
                    );
                }
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(WebhookError::MalformedSignature)?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedSignature);
        }

        let age_secs = now
            .timestamp()
            .checked_sub(timestamp)
            .ok_or(WebhookError::MalformedSignature)?;
        if age_secs.unsigned_abs() > self.tolerance_secs.unsigned_abs() {
            return Err(WebhookError::Expired { age_secs });
        }

        // Several v1 entries are allowed while a secret is being rotated.
        let matched = signatures.iter().any(|sig| {
            hex::decode(sig)
                .map(|bytes| self.mac(timestamp, body).verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if matched {
            Ok(())
        } else {
            Err(WebhookError::SignatureMismatch)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookData {
    intent_id: PaymentIntentId,
    #[serde(default)]
    failure_reason: Option<String>,
}

/// Outcome of parsing a verified body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedWebhook {
    Payment(PaymentEvent),
    /// An event type the storefront does not act on.
    Ignored { id: String, kind: String },
}

/// Parse a verified body into a payment event.
pub fn parse_event(body: &[u8], received_at: DateTime<Utc>) -> Result<ParsedWebhook, WebhookError> {
    let payload: WebhookPayload =
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
    if payload.id.trim().is_empty() {
        return Err(WebhookError::InvalidPayload("event id is empty".into()));
    }
    let Some(kind) = PaymentEventKind::from_str(&payload.kind) else {
        return Ok(ParsedWebhook::Ignored {
            id: payload.id,
            kind: payload.kind,
        });
    };
    Ok(ParsedWebhook::Payment(PaymentEvent {
        id: payload.id,
        kind,
        intent_id: payload.data.intent_id,
        failure_reason: payload.data.failure_reason,
        received_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const BODY: &[u8] =
        br#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"intentId":"pi_1"}}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec_test", 300)
    }

    #[test]
    fn test_valid_signature() {
        let now = Utc::now();
        let header = verifier().sign(now.timestamp(), BODY);
        assert_eq!(verifier().verify(Some(&header), BODY, now), Ok(()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = Utc::now();
        let header = verifier().sign(now.timestamp(), BODY);
        let tampered = BODY.to_vec().into_iter().rev().collect::<Vec<u8>>();
        assert_eq!(
            verifier().verify(Some(&header), &tampered, now),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now();
        let header = WebhookVerifier::new("other", 300).sign(now.timestamp(), BODY);
        assert_eq!(
            verifier().verify(Some(&header), BODY, now),
            Err(WebhookError::SignatureMismatch)
        );
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let now = Utc::now();
        let then = now - Duration::minutes(10);
        let header = verifier().sign(then.timestamp(), BODY);
        assert!(matches!(
            verifier().verify(Some(&header), BODY, now),
            Err(WebhookError::Expired { .. })
        ));
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let now = Utc::now();
        assert_eq!(
            verifier().verify(Some("t=-9223372036854775808,v1=00"), BODY, now),
            Err(WebhookError::MalformedSignature)
        );
        assert!(matches!(
            verifier().verify(Some("t=9223372036854775807,v1=00"), BODY, now),
            Err(WebhookError::Expired { .. })
        ));
    }

    #[test]
    fn test_malformed_headers() {
        let now = Utc::now();
        assert_eq!(
            verifier().verify(None, BODY, now),
            Err(WebhookError::MissingSignature)
        );
        assert_eq!(
            verifier().verify(Some("v1=abcd"), BODY, now),
            Err(WebhookError::MalformedSignature)
        );
        assert_eq!(
            verifier().verify(Some("t=nope,v1=abcd"), BODY, now),
            Err(WebhookError::MalformedSignature)
        );
    }

    #[test]
    fn test_parse_payment_event() {
        let parsed = parse_event(BODY, Utc::now()).unwrap();
        let ParsedWebhook::Payment(event) = parsed else {
            panic!("expected a payment event");
        };
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.kind, PaymentEventKind::Succeeded);
        assert_eq!(event.intent_id, PaymentIntentId::new("pi_1"));
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let body = br#"{"id":"evt_2","type":"charge.refunded","data":{"intentId":"pi_1"}}"#;
        assert!(matches!(
            parse_event(body, Utc::now()),
            Ok(ParsedWebhook::Ignored { .. })
        ));
        assert!(matches!(
            parse_event(b"not json", Utc::now()),
            Err(WebhookError::InvalidPayload(_))
        ));
    }
}
