use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use wick_commerce::checkout::PaymentMethod;
use wick_commerce::ids::PaymentIntentId;
use wick_commerce::Money;

use super::{GatewayError, PaymentGateway, PaymentIntent, PaymentResult};
use crate::config::PaymentsConfig;

/// Bounds every gateway call with a timeout.
///
/// Intent lookups are retried with exponential backoff on transient errors.
/// Captures and confirms are never retried here: a timed-out capture must be
/// resolved by the caller, not repeated blindly.
pub struct TimedGateway {
    inner: Arc<dyn PaymentGateway>,
    timeout: Duration,
    read_retries: u32,
    backoff: Duration,
}

impl TimedGateway {
    pub fn new(inner: Arc<dyn PaymentGateway>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            read_retries: 0,
            backoff: Duration::from_millis(100),
        }
    }

    pub fn from_config(inner: Arc<dyn PaymentGateway>, config: &PaymentsConfig) -> Self {
        Self::new(inner, config.timeout()).with_retries(config.read_retries, config.backoff())
    }

    pub fn with_retries(mut self, read_retries: u32, backoff: Duration) -> Self {
        self.read_retries = read_retries;
        self.backoff = backoff;
        self
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

#[async_trait]
impl PaymentGateway for TimedGateway {
    async fn create_payment_intent(
        &self,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        self.bounded(self.inner.create_payment_intent(amount, idempotency_key))
            .await
    }

    async fn confirm_payment(
        &self,
        intent_id: &PaymentIntentId,
        method: PaymentMethod,
    ) -> Result<PaymentResult, GatewayError> {
        self.bounded(self.inner.confirm_payment(intent_id, method)).await
    }

    async fn retrieve_intent(&self, intent_id: &PaymentIntentId) -> Result<PaymentIntent, GatewayError> {
        let mut delay = self.backoff;
        let mut attempt = 0;
        loop {
            match self.bounded(self.inner.retrieve_intent(intent_id)).await {
                Err(e) if e.is_transient() && attempt < self.read_retries => {
                    attempt += 1;
                    tracing::warn!(intent = %intent_id, attempt, error = %e, "retrying intent lookup");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                result => return result,
            }
        }
    }

    async fn capture_payment(
        &self,
        intent_id: &PaymentIntentId,
        idempotency_key: &str,
    ) -> Result<PaymentResult, GatewayError> {
        self.bounded(self.inner.capture_payment(intent_id, idempotency_key))
            .await
    }
}
