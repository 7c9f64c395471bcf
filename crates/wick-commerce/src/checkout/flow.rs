//! Checkout flow state machine.

use crate::cart::CartOwner;
use crate::checkout::{is_plausible_email, Address, PaymentAuthorization};
use crate::error::{CommerceError, FieldError};
use crate::ids::{CartId, CheckoutId, PaymentIntentId, ShippingOptionId};
use crate::pricing::{Jurisdiction, OrderTotals, ShippingOption};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Steps in the checkout flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStep {
    /// Contact, shipping address and shipping option.
    Shipping,
    /// Payment authorization.
    Payment,
    /// Final review before the order is placed.
    Review,
    /// Order placed.
    Confirmed,
}

impl CheckoutStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStep::Shipping => "shipping",
            CheckoutStep::Payment => "payment",
            CheckoutStep::Review => "review",
            CheckoutStep::Confirmed => "confirmed",
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the customer submits on the shipping step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub email: String,
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default = "same_as_shipping_default")]
    pub same_as_shipping: bool,
    pub shipping_option_id: ShippingOptionId,
}

fn same_as_shipping_default() -> bool {
    true
}

/// One customer's pass through checkout. Lives only in process memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub id: CheckoutId,
    pub cart_id: CartId,
    pub owner: CartOwner,
    pub step: CheckoutStep,
    pub email: Option<String>,
    pub shipping_address: Option<Address>,
    /// Only meaningful when `billing_same_as_shipping` is false.
    pub billing_address: Option<Address>,
    pub billing_same_as_shipping: bool,
    pub shipping_option: Option<ShippingOption>,
    /// Intent created for this checkout, before it is authorized.
    pub payment_intent_id: Option<PaymentIntentId>,
    pub authorization: Option<PaymentAuthorization>,
    /// Rounded totals last shown to the customer.
    pub quoted_totals: Option<OrderTotals>,
    /// Set while a confirmation is in flight.
    pub confirming: bool,
    pub order_number: Option<String>,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(cart_id: CartId, owner: CartOwner, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: CheckoutId::generate(),
            cart_id,
            owner,
            step: CheckoutStep::Shipping,
            email: None,
            shipping_address: None,
            billing_address: None,
            billing_same_as_shipping: true,
            shipping_option: None,
            payment_intent_id: None,
            authorization: None,
            quoted_totals: None,
            confirming: false,
            order_number: None,
            version: 0,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
        }
    }

    /// Store the shipping step's data and advance to payment.
    ///
    /// `quote` is the server's totals for the chosen option.
    pub fn submit_shipping(
        &mut self,
        details: ShippingDetails,
        option: ShippingOption,
        quote: OrderTotals,
    ) -> Result<CheckoutStep, CommerceError> {
        self.require_step(CheckoutStep::Shipping)?;
        self.email = Some(details.email.trim().to_string());
        self.shipping_address = Some(details.shipping_address);
        self.billing_same_as_shipping = details.same_as_shipping;
        self.billing_address = if details.same_as_shipping {
            None
        } else {
            details.billing_address
        };
        self.shipping_option = Some(option);
        self.quoted_totals = Some(quote.rounded());
        self.advance()
    }

    /// Remember the intent created for this checkout.
    pub fn record_intent(&mut self, intent_id: PaymentIntentId) -> Result<(), CommerceError> {
        self.require_step(CheckoutStep::Payment)?;
        self.payment_intent_id = Some(intent_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Store a successful authorization and advance to review.
    pub fn authorize(
        &mut self,
        authorization: PaymentAuthorization,
    ) -> Result<CheckoutStep, CommerceError> {
        self.require_step(CheckoutStep::Payment)?;
        self.authorization = Some(authorization);
        self.advance()
    }

    /// Check if checkout can advance to a step.
    pub fn can_advance_to(&self, step: CheckoutStep) -> bool {
        self.missing_for_step(step).is_empty()
    }

    /// Advance one step forward. Review to confirmed only happens through
    /// [`begin_confirmation`](Self::begin_confirmation) and [`complete`](Self::complete).
    pub fn advance(&mut self) -> Result<CheckoutStep, CommerceError> {
        let next = match self.step {
            CheckoutStep::Shipping => CheckoutStep::Payment,
            CheckoutStep::Payment => CheckoutStep::Review,
            CheckoutStep::Review | CheckoutStep::Confirmed => {
                return Err(CommerceError::invalid_transition(
                    self.step,
                    CheckoutStep::Confirmed,
                ));
            }
        };

        let missing = self.missing_for_step(next);
        if !missing.is_empty() {
            return Err(CommerceError::invalid_fields(
                format!("cannot continue to {}", next.as_str()),
                missing,
            ));
        }

        self.step = next;
        self.updated_at = Utc::now();
        Ok(next)
    }

    /// Go back one step. Entered data is kept.
    pub fn go_back(&mut self) -> Result<CheckoutStep, CommerceError> {
        let prev = match self.step {
            CheckoutStep::Payment => CheckoutStep::Shipping,
            CheckoutStep::Review => CheckoutStep::Payment,
            CheckoutStep::Shipping => {
                return Err(CommerceError::invalid_transition(self.step, "none"));
            }
            CheckoutStep::Confirmed => {
                return Err(CommerceError::Conflict("checkout already confirmed".to_string()));
            }
        };
        self.step = prev;
        self.updated_at = Utc::now();
        Ok(prev)
    }

    /// Claim the right to confirm. A second claim while one is in flight,
    /// or any claim after confirmation, is a conflict.
    pub fn begin_confirmation(&mut self) -> Result<(), CommerceError> {
        if self.step == CheckoutStep::Confirmed {
            return Err(CommerceError::Conflict("checkout already confirmed".to_string()));
        }
        if self.confirming {
            return Err(CommerceError::Conflict(
                "confirmation already in progress".to_string(),
            ));
        }
        self.require_step(CheckoutStep::Review)?;
        self.confirming = true;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Release the confirmation claim after a failed attempt. The session stays in review.
    pub fn abort_confirmation(&mut self) {
        self.confirming = false;
        self.updated_at = Utc::now();
    }

    /// Mark the checkout confirmed with the placed order's number.
    pub fn complete(&mut self, order_number: impl Into<String>) {
        self.step = CheckoutStep::Confirmed;
        self.confirming = false;
        self.order_number = Some(order_number.into());
        self.updated_at = Utc::now();
    }

    /// What is missing to advance to a step.
    pub fn missing_for_step(&self, step: CheckoutStep) -> Vec<FieldError> {
        let mut missing = Vec::new();
        match step {
            CheckoutStep::Shipping => {}
            CheckoutStep::Payment => {
                match self.email.as_deref() {
                    Some(email) if is_plausible_email(email) => {}
                    Some(_) => missing.push(FieldError::new("email", "must be a valid email address")),
                    None => missing.push(FieldError::new("email", "is required")),
                }
                match &self.shipping_address {
                    Some(address) => missing.extend(prefixed("shippingAddress", address.field_errors())),
                    None => missing.push(FieldError::new("shippingAddress", "is required")),
                }
                if !self.billing_same_as_shipping {
                    match &self.billing_address {
                        Some(address) => missing.extend(prefixed("billingAddress", address.field_errors())),
                        None => missing.push(FieldError::new("billingAddress", "is required")),
                    }
                }
                if self.shipping_option.is_none() {
                    missing.push(FieldError::new("shippingOptionId", "is required"));
                }
            }
            CheckoutStep::Review => {
                missing.extend(self.missing_for_step(CheckoutStep::Payment));
                if self.authorization.is_none() {
                    missing.push(FieldError::new("payment", "payment authorization is required"));
                }
            }
            CheckoutStep::Confirmed => {
                missing.extend(self.missing_for_step(CheckoutStep::Review));
            }
        }
        missing
    }

    /// Get the effective billing address.
    pub fn effective_billing_address(&self) -> Option<&Address> {
        if self.billing_same_as_shipping {
            self.shipping_address.as_ref()
        } else {
            self.billing_address.as_ref()
        }
    }

    pub fn jurisdiction(&self) -> Option<Jurisdiction> {
        self.shipping_address.as_ref().map(Address::jurisdiction)
    }

    pub fn is_confirmed(&self) -> bool {
        self.step == CheckoutStep::Confirmed
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    fn require_step(&self, expected: CheckoutStep) -> Result<(), CommerceError> {
        if self.step == CheckoutStep::Confirmed {
            return Err(CommerceError::Conflict("checkout already confirmed".to_string()));
        }
        if self.step != expected {
            return Err(CommerceError::invalid_transition(self.step, expected));
        }
        Ok(())
    }
}

fn prefixed(prefix: &str, errors: Vec<FieldError>) -> impl Iterator<Item = FieldError> + '_ {
    errors
        .into_iter()
        .map(move |e| FieldError::new(format!("{}.{}", prefix, e.field), e.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::PaymentMethod;
    use crate::ids::GuestId;
    use crate::money::{Currency, Money};
    use crate::pricing::ShippingKind;

    fn address() -> Address {
        Address {
            first_name: "Ada".into(),
            last_name: "Wick".into(),
            street: "12 Ember Lane".into(),
            apartment: None,
            city: "Portland".into(),
            state: "OR".into(),
            postal_code: "97201".into(),
            country: "US".into(),
            phone: None,
        }
    }

    fn details() -> ShippingDetails {
        ShippingDetails {
            email: "ada@example.com".into(),
            shipping_address: address(),
            billing_address: None,
            same_as_shipping: true,
            shipping_option_id: ShippingOptionId::new("standard"),
        }
    }

    fn standard() -> ShippingOption {
        ShippingOption::new("standard", "Standard", ShippingKind::Standard, Money::from_minor(500, Currency::USD))
    }

    fn session() -> CheckoutSession {
        CheckoutSession::new(
            CartId::new("cart-1"),
            CartOwner::Guest(GuestId::new("g1")),
            Duration::hours(1),
        )
    }

    fn authorization() -> PaymentAuthorization {
        PaymentAuthorization {
            method: PaymentMethod::Card,
            intent_id: PaymentIntentId::new("pi_1"),
            amount: Money::from_minor(4386, Currency::USD),
            authorized_at: Utc::now(),
        }
    }

    fn at_review() -> CheckoutSession {
        let mut s = session();
        s.submit_shipping(details(), standard(), OrderTotals::zero(Currency::USD)).unwrap();
        s.authorize(authorization()).unwrap();
        s
    }

    #[test]
    fn test_checkout_starts_at_shipping() {
        let s = session();
        assert_eq!(s.step, CheckoutStep::Shipping);
        assert!(!s.can_advance_to(CheckoutStep::Payment));
    }

    #[test]
    fn test_shipping_to_payment() {
        let mut s = session();
        let step = s.submit_shipping(details(), standard(), OrderTotals::zero(Currency::USD)).unwrap();
        assert_eq!(step, CheckoutStep::Payment);
        assert_eq!(s.effective_billing_address(), Some(&address()));
    }

    #[test]
    fn test_invalid_zip_blocks_shipping() {
        let mut s = session();
        let mut bad = details();
        bad.shipping_address.postal_code = "123".into();
        match s.submit_shipping(bad, standard(), OrderTotals::zero(Currency::USD)) {
            Err(CommerceError::Validation { fields, .. }) => {
                assert_eq!(fields[0].field, "shippingAddress.postalCode");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(s.step, CheckoutStep::Shipping);
    }

    #[test]
    fn test_separate_billing_address_required() {
        let mut s = session();
        let mut d = details();
        d.same_as_shipping = false;
        assert!(s.submit_shipping(d, standard(), OrderTotals::zero(Currency::USD)).is_err());
    }

    #[test]
    fn test_payment_to_review_requires_authorization() {
        let mut s = session();
        s.submit_shipping(details(), standard(), OrderTotals::zero(Currency::USD)).unwrap();
        assert!(matches!(s.advance(), Err(CommerceError::Validation { .. })));
        assert_eq!(s.step, CheckoutStep::Payment);

        assert_eq!(s.authorize(authorization()).unwrap(), CheckoutStep::Review);
    }

    #[test]
    fn test_back_navigation_keeps_data() {
        let mut s = at_review();
        assert_eq!(s.go_back().unwrap(), CheckoutStep::Payment);
        assert_eq!(s.go_back().unwrap(), CheckoutStep::Shipping);
        assert!(s.go_back().is_err());
        assert!(s.shipping_address.is_some());
        assert!(s.authorization.is_some());
        assert!(s.can_advance_to(CheckoutStep::Review));
    }

    #[test]
    fn test_confirmation_guard() {
        let mut s = at_review();
        s.begin_confirmation().unwrap();
        assert!(matches!(s.begin_confirmation(), Err(CommerceError::Conflict(_))));

        s.abort_confirmation();
        s.begin_confirmation().unwrap();
        s.complete("WK-20261016-000001");
        assert!(s.is_confirmed());
        assert!(matches!(s.begin_confirmation(), Err(CommerceError::Conflict(_))));
        assert!(matches!(s.go_back(), Err(CommerceError::Conflict(_))));
    }

    #[test]
    fn test_cannot_confirm_from_payment() {
        let mut s = session();
        s.submit_shipping(details(), standard(), OrderTotals::zero(Currency::USD)).unwrap();
        assert!(matches!(
            s.begin_confirmation(),
            Err(CommerceError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_expiry() {
        let s = session();
        assert!(!s.is_expired(Utc::now()));
        assert!(s.is_expired(Utc::now() + Duration::hours(2)));
    }
}
