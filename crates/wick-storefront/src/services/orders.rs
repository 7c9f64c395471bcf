use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wick_commerce::checkout::{
    ChangeSource, Order, OrderStatus, PaymentEvent, PaymentEventKind, TransitionOutcome,
};
use wick_commerce::ids::{OrderId, UserId};
use wick_commerce::CommerceError;
use wick_store::{OrderRepository, ParkOutcome};

use super::MAX_CONFLICT_RETRIES;

/// Body of `PUT /orders/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

/// What a payment webhook did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied,
    /// The event id was already applied to the order.
    Duplicate,
    /// No order for the intent yet; kept until checkout creates it.
    Parked,
    /// An event type the storefront does not act on.
    Ignored,
}

/// Order reads, admin status changes and payment events.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }

    /// The user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, CommerceError> {
        Ok(self.orders.list_by_user(user_id).await?)
    }

    /// An order owned by `user_id`. Other users' orders are not found.
    pub async fn get_for_user(&self, user_id: &UserId, id: &OrderId) -> Result<Order, CommerceError> {
        self.orders
            .get(id)
            .await?
            .filter(|order| order.user_id.as_ref() == Some(user_id))
            .ok_or_else(|| CommerceError::not_found("order", id))
    }

    /// Guest lookup by order number and contact email.
    ///
    /// A wrong email is reported exactly like an unknown number.
    pub async fn track(&self, order_number: &str, email: &str) -> Result<Order, CommerceError> {
        let order = self
            .orders
            .find_by_number(order_number.trim())
            .await?
            .filter(|order| order.email_matches(email));
        match order {
            Some(order) => Ok(order),
            None => {
                tracing::warn!(order_number, "order tracking lookup failed");
                Err(CommerceError::not_found("order", order_number))
            }
        }
    }

    #[tracing::instrument(skip(self, update), fields(order_id = %id, to = %update.status))]
    pub async fn update_status(&self, id: &OrderId, update: StatusUpdate) -> Result<Order, CommerceError> {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let mut order = self
                .orders
                .get(id)
                .await?
                .ok_or_else(|| CommerceError::not_found("order", id))?;
            let from = order.status;
            let outcome = order.request_status(
                update.status,
                update.tracking_number.clone(),
                ChangeSource::Admin,
            )?;
            if outcome == TransitionOutcome::Unchanged {
                return Ok(order);
            }
            match self.orders.update(order).await {
                Ok(order) => {
                    tracing::info!(order_number = %order.order_number, %from, to = %order.status, "order status changed");
                    return Ok(order);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(attempt, "order update conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Conflict(format!("order {id} kept changing")))
    }

    /// Apply a verified gateway event, or park it until its order exists.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, intent_id = %event.intent_id))]
    pub async fn handle_payment_event(&self, event: PaymentEvent) -> Result<WebhookOutcome, CommerceError> {
        let order_id = match self.orders.find_by_intent(&event.intent_id).await? {
            Some(order) => order.id,
            None => match self.orders.park_event(event.clone()).await? {
                ParkOutcome::Parked | ParkOutcome::AlreadyParked => {
                    tracing::info!(kind = event.kind.as_str(), "payment event parked until its order exists");
                    return Ok(WebhookOutcome::Parked);
                }
                ParkOutcome::OrderExists(order_id) => order_id,
            },
        };
        self.apply_event(&order_id, &event).await
    }

    /// Apply events that were parked before `order` was inserted.
    pub(crate) async fn apply_parked(
        &self,
        order: Order,
        events: Vec<PaymentEvent>,
    ) -> Result<Order, CommerceError> {
        if events.is_empty() {
            return Ok(order);
        }
        for event in &events {
            self.apply_event(&order.id, event).await?;
        }
        self.orders
            .get(&order.id)
            .await?
            .ok_or_else(|| CommerceError::not_found("order", &order.id))
    }

    async fn apply_event(&self, order_id: &OrderId, event: &PaymentEvent) -> Result<WebhookOutcome, CommerceError> {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let mut order = self
                .orders
                .get(order_id)
                .await?
                .ok_or_else(|| CommerceError::not_found("order", order_id))?;
            if order.apply_payment_event(event)? == TransitionOutcome::Unchanged {
                tracing::debug!(order_number = %order.order_number, "payment event already applied");
                return Ok(WebhookOutcome::Duplicate);
            }
            match self.orders.update(order).await {
                Ok(order) => {
                    match event.kind {
                        PaymentEventKind::Succeeded => tracing::info!(
                            order_number = %order.order_number,
                            status = %order.status,
                            "payment succeeded"
                        ),
                        PaymentEventKind::Failed => tracing::warn!(
                            order_number = %order.order_number,
                            reason = order.payment.failure_reason.as_deref().unwrap_or_default(),
                            "payment failed"
                        ),
                    }
                    return Ok(WebhookOutcome::Applied);
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(attempt, "order update conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Conflict(format!("order {order_id} kept changing")))
    }
}
