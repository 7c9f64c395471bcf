//! Order status transitions driven by admins and payment webhooks.

use crate::checkout::{Order, OrderStatus, PaymentEvent, PaymentEventKind, PaymentStatus};
use crate::error::CommerceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who caused a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Checkout,
    Admin,
    PaymentWebhook,
}

/// One entry in an order's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    /// None for the entry recorded at placement.
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub source: ChangeSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    pub(crate) fn placed(at: DateTime<Utc>) -> Self {
        Self {
            from: None,
            to: OrderStatus::Pending,
            source: ChangeSource::Checkout,
            note: None,
            at,
        }
    }
}

/// Whether a request changed the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied,
    /// Same status requested again, or an event already applied.
    Unchanged,
}

impl Order {
    /// Move the order to `to`.
    ///
    /// Shipped and delivered need a tracking number, given now or already stored. A
    /// tracking number given with any status other than shipped or delivered
    /// is rejected. On error the order is left untouched.
    pub fn request_status(
        &mut self,
        to: OrderStatus,
        tracking_number: Option<String>,
        source: ChangeSource,
    ) -> Result<TransitionOutcome, CommerceError> {
        let tracking_number = tracking_number
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let ships = matches!(to, OrderStatus::Shipped | OrderStatus::Delivered);
        if tracking_number.is_some() && !ships {
            return Err(CommerceError::invalid_field(
                "trackingNumber",
                format!("tracking number cannot be set with status {}", to),
            ));
        }
        if to == self.status {
            return Ok(TransitionOutcome::Unchanged);
        }
        if !self.status.can_transition_to(to) {
            return Err(CommerceError::invalid_transition(self.status, to));
        }
        if ships && tracking_number.is_none() && self.tracking_number.is_none() {
            return Err(CommerceError::invalid_field(
                "trackingNumber",
                format!("tracking number is required for status {}", to),
            ));
        }

        if tracking_number.is_some() {
            self.tracking_number = tracking_number;
        }
        self.record(to, source, None);
        Ok(TransitionOutcome::Applied)
    }

    /// Apply a verified gateway event. Replays of an applied event id are no-ops.
    pub fn apply_payment_event(
        &mut self,
        event: &PaymentEvent,
    ) -> Result<TransitionOutcome, CommerceError> {
        if self.has_applied(&event.id) {
            return Ok(TransitionOutcome::Unchanged);
        }
        if event.intent_id != self.payment.transaction_id {
            return Err(CommerceError::invalid_field(
                "intentId",
                format!("event {} is for another payment intent", event.id),
            ));
        }

        match event.kind {
            PaymentEventKind::Succeeded => {
                self.payment.status = PaymentStatus::Succeeded;
                self.payment.failure_reason = None;
                if self.status == OrderStatus::Pending {
                    self.record(OrderStatus::Processing, ChangeSource::PaymentWebhook, None);
                }
            }
            PaymentEventKind::Failed => {
                let reason = event
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "payment failed".to_string());
                if self.payment.status != PaymentStatus::Succeeded {
                    self.payment.status = PaymentStatus::Failed;
                }
                self.payment.failure_reason = Some(reason.clone());
                self.record(self.status, ChangeSource::PaymentWebhook, Some(reason));
            }
        }
        self.applied_events.push(event.id.clone());
        self.updated_at = Utc::now();
        Ok(TransitionOutcome::Applied)
    }

    pub fn has_applied(&self, event_id: &str) -> bool {
        self.applied_events.iter().any(|id| id == event_id)
    }

    fn record(&mut self, to: OrderStatus, source: ChangeSource, note: Option<String>) {
        let now = Utc::now();
        self.status_history.push(StatusChange {
            from: Some(self.status),
            to,
            source,
            note,
            at: now,
        });
        self.status = to;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{Address, NewOrder, PaymentDetails, PaymentMethod};
    use crate::ids::{CheckoutId, PaymentIntentId};
    use crate::money::{Currency, Money};
    use crate::pricing::{OrderTotals, ShippingKind, ShippingOption};

    fn order() -> Order {
        Order::place(NewOrder {
            order_number: "WK-20261016-000001".into(),
            checkout_id: CheckoutId::new("co-1"),
            user_id: None,
            email: "ada@example.com".into(),
            items: Vec::new(),
            shipping_address: Address::default(),
            billing_address: Address::default(),
            shipping_option: ShippingOption::new(
                "standard",
                "Standard",
                ShippingKind::Standard,
                Money::from_minor(500, Currency::USD),
            ),
            payment: PaymentDetails {
                method: PaymentMethod::Card,
                transaction_id: PaymentIntentId::new("pi_1"),
                status: PaymentStatus::Authorized,
                failure_reason: None,
            },
            totals: OrderTotals::zero(Currency::USD),
        })
    }

    fn event(id: &str, kind: PaymentEventKind) -> PaymentEvent {
        PaymentEvent {
            id: id.into(),
            kind,
            intent_id: PaymentIntentId::new("pi_1"),
            failure_reason: Some("card_declined".into()),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_happy_path() {
        let mut o = order();
        assert_eq!(
            o.request_status(OrderStatus::Processing, None, ChangeSource::Admin).unwrap(),
            TransitionOutcome::Applied
        );
        o.request_status(OrderStatus::Shipped, Some("1Z999".into()), ChangeSource::Admin)
            .unwrap();
        o.request_status(OrderStatus::Delivered, None, ChangeSource::Admin).unwrap();
        assert_eq!(o.status, OrderStatus::Delivered);
        assert_eq!(o.tracking_number.as_deref(), Some("1Z999"));
        assert_eq!(o.status_history.len(), 4);
    }

    #[test]
    fn test_shipping_requires_tracking() {
        let mut o = order();
        let err = o
            .request_status(OrderStatus::Shipped, None, ChangeSource::Admin)
            .unwrap_err();
        assert!(matches!(err, CommerceError::Validation { .. }));
        assert_eq!(o.status, OrderStatus::Pending);
    }

    #[test]
    fn test_delivery_requires_tracking() {
        let mut o = order();
        o.request_status(OrderStatus::Processing, None, ChangeSource::Admin).unwrap();
        let err = o
            .request_status(OrderStatus::Delivered, None, ChangeSource::Admin)
            .unwrap_err();
        assert!(matches!(err, CommerceError::Validation { .. }));
        assert_eq!(o.status, OrderStatus::Processing);

        o.request_status(OrderStatus::Delivered, Some("1Z999".into()), ChangeSource::Admin)
            .unwrap();
        assert_eq!(o.status, OrderStatus::Delivered);
        assert_eq!(o.tracking_number.as_deref(), Some("1Z999"));
    }

    #[test]
    fn test_tracking_with_low_status_rejected() {
        let mut o = order();
        assert!(o
            .request_status(OrderStatus::Processing, Some("1Z999".into()), ChangeSource::Admin)
            .is_err());
        assert!(o.tracking_number.is_none());
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut o = order();
        let before = o.status_history.len();
        assert_eq!(
            o.request_status(OrderStatus::Pending, None, ChangeSource::Admin).unwrap(),
            TransitionOutcome::Unchanged
        );
        assert_eq!(o.status_history.len(), before);
    }

    #[test]
    fn test_illegal_transitions_leave_state() {
        let mut o = order();
        o.request_status(OrderStatus::Shipped, Some("1Z".into()), ChangeSource::Admin).unwrap();
        let snapshot = o.clone();
        assert!(matches!(
            o.request_status(OrderStatus::Cancelled, None, ChangeSource::Admin),
            Err(CommerceError::InvalidTransition { .. })
        ));
        assert!(matches!(
            o.request_status(OrderStatus::Processing, None, ChangeSource::Admin),
            Err(CommerceError::InvalidTransition { .. })
        ));
        assert_eq!(o, snapshot);
    }

    #[test]
    fn test_cancel_from_processing() {
        let mut o = order();
        o.request_status(OrderStatus::Processing, None, ChangeSource::Admin).unwrap();
        o.request_status(OrderStatus::Cancelled, None, ChangeSource::Admin).unwrap();
        assert!(o.is_cancelled());
        assert!(o.request_status(OrderStatus::Delivered, None, ChangeSource::Admin).is_err());
    }

    #[test]
    fn test_succeeded_event_moves_to_processing_once() {
        let mut o = order();
        let e = event("evt_1", PaymentEventKind::Succeeded);
        assert_eq!(o.apply_payment_event(&e).unwrap(), TransitionOutcome::Applied);
        assert_eq!(o.status, OrderStatus::Processing);
        assert_eq!(o.payment.status, PaymentStatus::Succeeded);

        let history = o.status_history.len();
        assert_eq!(o.apply_payment_event(&e).unwrap(), TransitionOutcome::Unchanged);
        assert_eq!(o.status_history.len(), history);
    }

    #[test]
    fn test_failed_event_records_without_advancing() {
        let mut o = order();
        o.apply_payment_event(&event("evt_2", PaymentEventKind::Failed)).unwrap();
        assert_eq!(o.status, OrderStatus::Pending);
        assert_eq!(o.payment.status, PaymentStatus::Failed);
        assert_eq!(o.payment.failure_reason.as_deref(), Some("card_declined"));
        let last = o.status_history.last().unwrap();
        assert_eq!(last.source, ChangeSource::PaymentWebhook);
    }

    #[test]
    fn test_event_for_other_intent_rejected() {
        let mut o = order();
        let mut e = event("evt_3", PaymentEventKind::Succeeded);
        e.intent_id = PaymentIntentId::new("pi_other");
        assert!(o.apply_payment_event(&e).is_err());
        assert!(!o.has_applied("evt_3"));
    }
}
