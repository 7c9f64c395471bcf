use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use wick_commerce::checkout::PaymentMethod;
use wick_commerce::ids::PaymentIntentId;
use wick_commerce::Money;

use super::{GatewayError, IntentStatus, PaymentGateway, PaymentIntent, PaymentResult};

#[derive(Debug, Default)]
struct SandboxState {
    intents: HashMap<PaymentIntentId, PaymentIntent>,
    /// Idempotency key to the intent it created.
    created: HashMap<String, PaymentIntentId>,
    /// Idempotency keys already used for a capture.
    captured: HashMap<String, PaymentIntentId>,
    /// Queued failures per operation, returned before doing any work.
    failures: HashMap<&'static str, VecDeque<GatewayError>>,
    /// Queued failures returned after the work is done, as if the reply was lost.
    lost_replies: HashMap<&'static str, VecDeque<GatewayError>>,
    calls: HashMap<&'static str, usize>,
    latency: Option<Duration>,
}

/// In-process gateway for development and tests.
///
/// Every confirm authorizes unless a failure was queued with
/// [`fail_next`](Self::fail_next).
#[derive(Debug, Default)]
pub struct SandboxGateway {
    state: Mutex<SandboxState>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, SandboxState>, GatewayError> {
        self.state
            .lock()
            .map_err(|_| GatewayError::Unavailable("sandbox state poisoned".into()))
    }

    /// Make the next call to `operation` ("create", "confirm", "retrieve"
    /// or "capture") fail with `error`.
    pub fn fail_next(&self, operation: &'static str, error: GatewayError) {
        if let Ok(mut state) = self.lock() {
            state.failures.entry(operation).or_default().push_back(error);
        }
    }

    /// Let the next call to `operation` take effect, then fail with `error`.
    pub fn lose_next_reply(&self, operation: &'static str, error: GatewayError) {
        if let Ok(mut state) = self.lock() {
            state.lost_replies.entry(operation).or_default().push_back(error);
        }
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut state) = self.lock() {
            state.latency = Some(latency);
        }
    }

    /// How many times `operation` was called.
    pub fn calls(&self, operation: &'static str) -> usize {
        self.lock()
            .map(|state| state.calls.get(operation).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Count the call, wait out any latency and pop a queued failure.
    async fn enter(&self, operation: &'static str) -> Result<(), GatewayError> {
        let (latency, failure) = {
            let mut state = self.lock()?;
            *state.calls.entry(operation).or_default() += 1;
            let failure = state
                .failures
                .get_mut(operation)
                .and_then(VecDeque::pop_front);
            (state.latency, failure)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Swap a successful reply for a queued lost-reply failure, if any.
    fn leave<T>(&self, operation: &'static str, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
        let value = result?;
        let lost = self
            .lock()?
            .lost_replies
            .get_mut(operation)
            .and_then(VecDeque::pop_front);
        match lost {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    fn capture(&self, intent_id: &PaymentIntentId, idempotency_key: &str) -> Result<PaymentResult, GatewayError> {
        let mut state = self.lock()?;
        if state.captured.get(idempotency_key) == Some(intent_id) {
            return Ok(PaymentResult {
                intent_id: intent_id.clone(),
                status: IntentStatus::Succeeded,
            });
        }
        let intent = state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))?;
        if intent.status != IntentStatus::RequiresCapture {
            return Err(GatewayError::Declined("payment_intent_unexpected_state".into()));
        }
        intent.status = IntentStatus::Succeeded;
        state
            .captured
            .insert(idempotency_key.to_string(), intent_id.clone());
        Ok(PaymentResult {
            intent_id: intent_id.clone(),
            status: IntentStatus::Succeeded,
        })
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn create_payment_intent(
        &self,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        self.enter("create").await?;
        let mut state = self.lock()?;
        if let Some(existing) = state
            .created
            .get(idempotency_key)
            .and_then(|id| state.intents.get(id))
        {
            return Ok(existing.clone());
        }

        let token = uuid::Uuid::now_v7().simple().to_string();
        let intent = PaymentIntent {
            intent_id: PaymentIntentId::new(format!("pi_{token}")),
            client_secret: format!("pi_{token}_secret"),
            amount,
            status: IntentStatus::RequiresConfirmation,
        };
        state
            .created
            .insert(idempotency_key.to_string(), intent.intent_id.clone());
        state.intents.insert(intent.intent_id.clone(), intent.clone());
        Ok(intent)
    }

    async fn confirm_payment(
        &self,
        intent_id: &PaymentIntentId,
        _method: PaymentMethod,
    ) -> Result<PaymentResult, GatewayError> {
        self.enter("confirm").await?;
        let mut state = self.lock()?;
        let intent = state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))?;
        match intent.status {
            IntentStatus::RequiresConfirmation => intent.status = IntentStatus::RequiresCapture,
            IntentStatus::Canceled => {
                return Err(GatewayError::Declined("payment_intent_canceled".into()))
            }
            IntentStatus::RequiresCapture | IntentStatus::Succeeded => {}
        }
        Ok(PaymentResult {
            intent_id: intent.intent_id.clone(),
            status: intent.status,
        })
    }

    async fn retrieve_intent(&self, intent_id: &PaymentIntentId) -> Result<PaymentIntent, GatewayError> {
        self.enter("retrieve").await?;
        self.lock()?
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))
    }

    async fn capture_payment(
        &self,
        intent_id: &PaymentIntentId,
        idempotency_key: &str,
    ) -> Result<PaymentResult, GatewayError> {
        self.enter("capture").await?;
        let result = self.capture(intent_id, idempotency_key);
        self.leave("capture", result)
    }
}
