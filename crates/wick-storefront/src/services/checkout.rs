use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use wick_commerce::cart::{Cart, CartItem, CartOwner, LineIssue};
use wick_commerce::catalog::Product;
use wick_commerce::checkout::{
    format_order_number, CheckoutSession, CheckoutStep, NewOrder, Order, OrderItem, OrderStatus,
    PaymentAuthorization, PaymentDetails, PaymentMethod, PaymentStatus, ShippingDetails,
};
use wick_commerce::customization::CustomizationValidator;
use wick_commerce::ids::{CartId, CheckoutId, OrderId, PaymentIntentId, ProductId};
use wick_commerce::pricing::{Jurisdiction, OrderTotals, PricingEngine, ShippingOption, TaxPolicy};
use wick_commerce::{CommerceError, FieldError, Money};
use wick_store::{CartRepository, CheckoutRepository, OrderRepository, ProductRepository};

use super::{CartService, OrderService, MAX_CONFLICT_RETRIES};
use crate::gateway::{GatewayError, IntentStatus, PaymentGateway};
use crate::notify::{dispatch_confirmation, Notifier};

/// A checkout session with the figures the client renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    #[serde(flatten)]
    pub session: CheckoutSession,
    /// Current totals for the cart, with the chosen shipping option if any.
    pub totals: OrderTotals,
    pub shipping_options: Vec<ShippingOption>,
}

/// Body of `POST /checkout/{id}/payment-intent`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRequest {
    /// What the client believes the total is. Only compared, never charged.
    #[serde(default)]
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentView {
    pub intent_id: PaymentIntentId,
    pub client_secret: String,
    pub amount: Money,
}

/// Body of `POST /checkout/{id}/payment`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPayment {
    pub method: PaymentMethod,
    #[serde(default)]
    pub intent_id: Option<PaymentIntentId>,
}

/// Result of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub order_id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
}

/// Drives a cart through shipping, payment and review into an order.
#[derive(Clone)]
pub struct CheckoutService {
    carts: CartService,
    products: Arc<dyn ProductRepository>,
    cart_store: Arc<dyn CartRepository>,
    sessions: Arc<dyn CheckoutRepository>,
    order_store: Arc<dyn OrderRepository>,
    orders: OrderService,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    pricing: PricingEngine,
    tax: Arc<dyn TaxPolicy>,
    shipping_options: Vec<ShippingOption>,
    session_ttl: Duration,
}

/// Ports and settings a [`CheckoutService`] is built from.
pub struct CheckoutDeps {
    pub carts: CartService,
    pub products: Arc<dyn ProductRepository>,
    pub cart_store: Arc<dyn CartRepository>,
    pub sessions: Arc<dyn CheckoutRepository>,
    pub order_store: Arc<dyn OrderRepository>,
    pub orders: OrderService,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub pricing: PricingEngine,
    pub tax: Arc<dyn TaxPolicy>,
    pub shipping_options: Vec<ShippingOption>,
    pub session_ttl: Duration,
}

impl CheckoutService {
    pub fn new(deps: CheckoutDeps) -> Self {
        Self {
            carts: deps.carts,
            products: deps.products,
            cart_store: deps.cart_store,
            sessions: deps.sessions,
            order_store: deps.order_store,
            orders: deps.orders,
            gateway: deps.gateway,
            notifier: deps.notifier,
            pricing: deps.pricing,
            tax: deps.tax,
            shipping_options: deps.shipping_options,
            session_ttl: deps.session_ttl,
        }
    }

    pub fn shipping_options(&self) -> &[ShippingOption] {
        &self.shipping_options
    }

    /// Open a checkout over the owner's current cart. Earlier open sessions
    /// over the same cart are discarded.
    #[tracing::instrument(skip(self), fields(owner = %owner.key()))]
    pub async fn start(&self, owner: &CartOwner) -> Result<CheckoutView, CommerceError> {
        let cart = self.carts.get_or_create(owner).await?;
        if cart.is_empty() {
            return Err(CommerceError::invalid_field("cart", "cart is empty"));
        }
        let session = self
            .sessions
            .save(CheckoutSession::new(cart.id.clone(), owner.clone(), self.session_ttl))
            .await?;
        let discarded = self
            .sessions
            .discard_others_for_cart(&cart.id, &session.id)
            .await?;
        tracing::info!(checkout_id = %session.id, cart_id = %cart.id, discarded, "checkout started");
        self.present(session).await
    }

    pub async fn view(&self, owner: &CartOwner, id: &CheckoutId) -> Result<CheckoutView, CommerceError> {
        let session = self.load(owner, id).await?;
        self.present(session).await
    }

    #[tracing::instrument(skip(self, details), fields(checkout_id = %id))]
    pub async fn submit_shipping(
        &self,
        owner: &CartOwner,
        id: &CheckoutId,
        details: ShippingDetails,
    ) -> Result<CheckoutView, CommerceError> {
        let option = self
            .shipping_options
            .iter()
            .find(|option| option.id == details.shipping_option_id)
            .cloned()
            .ok_or_else(|| {
                CommerceError::invalid_field("shippingOptionId", "unknown shipping option")
            })?;
        details.shipping_address.validate()?;
        let jurisdiction = details.shipping_address.jurisdiction();

        let session = self.load(owner, id).await?;
        let (cart, _) = self.checked_cart(&session).await?;
        let quote = self.totals(&cart, Some(&option), Some(&jurisdiction))?;

        let session = self
            .update(owner, id, |session| {
                session
                    .submit_shipping(details.clone(), option.clone(), quote)
                    .map(|_| ())
            })
            .await?;
        tracing::info!(total = %quote.total.display(), option = %option.id, "shipping submitted");
        self.present(session).await
    }

    /// Create (or fetch) the gateway intent for the quoted total.
    #[tracing::instrument(skip(self, request), fields(checkout_id = %id))]
    pub async fn create_payment_intent(
        &self,
        owner: &CartOwner,
        id: &CheckoutId,
        request: IntentRequest,
    ) -> Result<IntentView, CommerceError> {
        let session = self.load(owner, id).await?;
        let amount = Self::quoted_total(&session)?;
        if let Some(client_amount) = request.amount {
            if client_amount != amount {
                tracing::warn!(
                    client = %client_amount.display(),
                    server = %amount.display(),
                    "client amount differs from quote; using server amount"
                );
            }
        }

        let key = format!("{}:{}", session.id, amount.to_minor_units()?);
        let intent = self.gateway.create_payment_intent(amount, &key).await?;
        let intent_id = intent.intent_id.clone();
        self.update(owner, id, |session| session.record_intent(intent_id.clone()))
            .await?;
        tracing::info!(intent_id = %intent.intent_id, "payment intent created");
        Ok(IntentView {
            intent_id: intent.intent_id,
            client_secret: intent.client_secret,
            amount: intent.amount,
        })
    }

    /// Authorize payment and move to review. Nothing is captured.
    #[tracing::instrument(skip(self, payment), fields(checkout_id = %id, method = payment.method.as_str()))]
    pub async fn submit_payment(
        &self,
        owner: &CartOwner,
        id: &CheckoutId,
        payment: SubmitPayment,
    ) -> Result<CheckoutView, CommerceError> {
        let session = self.load(owner, id).await?;
        let amount = Self::quoted_total(&session)?;

        let intent_id = match payment.intent_id {
            Some(given) => {
                if session.payment_intent_id.as_ref() != Some(&given) {
                    return Err(CommerceError::invalid_field(
                        "intentId",
                        "payment intent does not belong to this checkout",
                    ));
                }
                given
            }
            // Wallets authorize without a client-side intent. Creation is
            // idempotent per quoted amount, so this reuses any existing one.
            None => {
                self.create_payment_intent(owner, id, IntentRequest::default())
                    .await?
                    .intent_id
            }
        };

        let result = self.gateway.confirm_payment(&intent_id, payment.method).await?;
        if !result.status.is_authorized() {
            tracing::warn!(intent_id = %intent_id, status = ?result.status, "payment not authorized");
            return Err(CommerceError::PaymentDeclined("payment was not authorized".into()));
        }
        let intent = self.gateway.retrieve_intent(&intent_id).await?;
        if intent.amount != amount {
            return Err(CommerceError::PriceMismatch {
                authorized: intent.amount,
                current: amount,
            });
        }

        let authorization = PaymentAuthorization {
            method: payment.method,
            intent_id,
            amount: intent.amount,
            authorized_at: Utc::now(),
        };
        let session = self
            .update(owner, id, |session| {
                session.authorize(authorization.clone()).map(|_| ())
            })
            .await?;
        tracing::info!(amount = %amount.display(), "payment authorized");
        self.present(session).await
    }

    pub async fn go_back(&self, owner: &CartOwner, id: &CheckoutId) -> Result<CheckoutView, CommerceError> {
        let session = self
            .update(owner, id, |session| session.go_back().map(|_| ()))
            .await?;
        self.present(session).await
    }

    /// Place the order: review to confirmed.
    ///
    /// Only one confirmation per checkout can run; a concurrent or repeated
    /// call fails with a conflict. The cart is claimed before stock or money
    /// moves, so two sessions over one cart cannot both place an order. Any
    /// failure leaves the session in review and the cart as it was.
    #[tracing::instrument(skip(self), fields(checkout_id = %id))]
    pub async fn confirm(&self, owner: &CartOwner, id: &CheckoutId) -> Result<Confirmation, CommerceError> {
        let mut session = self.load(owner, id).await?;
        session.begin_confirmation()?;
        let session = match self.sessions.save(session).await {
            Ok(session) => session,
            Err(e) if e.is_conflict() => {
                return Err(CommerceError::Conflict(
                    "checkout is being confirmed by another request".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let order = match self.place_order(&session).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, "confirmation failed");
                self.release(owner, id).await;
                return Err(e);
            }
        };

        let number = order.order_number.clone();
        if let Err(e) = self
            .update(owner, id, |session| {
                session.complete(number.clone());
                Ok(())
            })
            .await
        {
            tracing::error!(error = %e, order_number = %number, "failed to mark checkout confirmed");
        }
        dispatch_confirmation(self.notifier.clone(), order.clone());

        tracing::info!(order_number = %order.order_number, total = %order.totals.total.display(), "order placed");
        Ok(Confirmation {
            order_id: order.id,
            order_number: order.order_number,
            status: order.status,
        })
    }

    async fn place_order(&self, session: &CheckoutSession) -> Result<Order, CommerceError> {
        let missing = session.missing_for_step(CheckoutStep::Confirmed);
        if !missing.is_empty() {
            return Err(CommerceError::invalid_fields("checkout is incomplete", missing));
        }
        let (Some(authorization), Some(option), Some(email), Some(shipping_address)) = (
            session.authorization.clone(),
            session.shipping_option.clone(),
            session.email.clone(),
            session.shipping_address.clone(),
        ) else {
            return Err(CommerceError::validation("checkout is incomplete"));
        };
        let billing_address = session
            .effective_billing_address()
            .cloned()
            .unwrap_or_else(|| shipping_address.clone());

        let (cart, products) = self.checked_cart(session).await?;
        if cart.is_empty() {
            return Err(CommerceError::Conflict("cart has already been checked out".into()));
        }
        let totals = self.totals(&cart, Some(&option), session.jurisdiction().as_ref())?;
        if totals.total != authorization.amount {
            tracing::warn!(
                authorized = %authorization.amount.display(),
                current = %totals.total.display(),
                "totals changed since authorization"
            );
            return Err(CommerceError::PriceMismatch {
                authorized: authorization.amount,
                current: totals.total,
            });
        }

        let items = cart
            .items
            .iter()
            .map(|item| {
                let product = products.iter().find(|p| p.id == item.product_id);
                Ok(OrderItem {
                    product_id: item.product_id.clone(),
                    name: product.map_or_else(|| item.product_name.clone(), |p| p.name.clone()),
                    images: product.map(|p| p.images.clone()).unwrap_or_default(),
                    unit_price: item.unit_price.rounded(),
                    customization: item.customization.clone(),
                    customization_labels: product
                        .map(|p| CustomizationValidator::describe(p, &item.customization))
                        .unwrap_or_default(),
                    quantity: item.quantity,
                    line_total: item.line_total()?.rounded(),
                })
            })
            .collect::<Result<Vec<_>, CommerceError>>()?;

        let today = Utc::now().date_naive();
        let sequence = self.order_store.next_sequence(today).await?;
        let new_order = NewOrder {
            order_number: format_order_number(today, sequence),
            checkout_id: session.id.clone(),
            user_id: session.owner.user_id().cloned(),
            email,
            items,
            shipping_address,
            billing_address,
            shipping_option: option,
            payment: PaymentDetails {
                method: authorization.method,
                transaction_id: authorization.intent_id,
                status: PaymentStatus::Authorized,
                failure_reason: None,
            },
            totals,
        };

        let lines = units_by_product(&cart);
        let cart_id = cart.id.clone();
        let claimed = self.claim_cart(cart).await?;
        match self.settle(new_order, &lines).await {
            Ok(order) => Ok(order),
            Err(e) => {
                self.restore_cart(&cart_id, claimed).await;
                Err(e)
            }
        }
    }

    /// Take stock, capture the payment and record the order. Stock is put
    /// back when either of the later steps fails.
    async fn settle(&self, mut new_order: NewOrder, lines: &[(ProductId, i64)]) -> Result<Order, CommerceError> {
        self.products.decrement_inventory(lines).await?;

        let captured = match self
            .capture(&new_order.payment.transaction_id, &new_order.checkout_id)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                self.restock(lines).await;
                return Err(e);
            }
        };
        if captured == IntentStatus::Succeeded {
            new_order.payment.status = PaymentStatus::Succeeded;
        }

        let inserted = match self.order_store.insert(Order::place(new_order)).await {
            Ok(inserted) => inserted,
            Err(e) => {
                // The capture is keyed by checkout id, so a retried
                // confirmation does not charge twice.
                self.restock(lines).await;
                return Err(e.into());
            }
        };
        self.orders
            .apply_parked(inserted.order, inserted.parked_events)
            .await
    }

    /// Capture the authorized funds.
    ///
    /// A timed-out capture may still have gone through at the gateway, so
    /// the intent is looked up before the timeout is reported.
    async fn capture(&self, intent_id: &PaymentIntentId, checkout_id: &CheckoutId) -> Result<IntentStatus, CommerceError> {
        match self.gateway.capture_payment(intent_id, checkout_id.as_str()).await {
            Ok(result) => Ok(result.status),
            Err(e @ GatewayError::Timeout { .. }) => match self.gateway.retrieve_intent(intent_id).await {
                Ok(intent) if intent.status == IntentStatus::Succeeded => {
                    tracing::warn!(intent_id = %intent_id, "capture timed out but the intent was captured");
                    Ok(IntentStatus::Succeeded)
                }
                Ok(intent) => {
                    tracing::warn!(intent_id = %intent_id, status = ?intent.status, "capture timed out");
                    Err(e.into())
                }
                Err(lookup) => {
                    tracing::error!(intent_id = %intent_id, error = %lookup, "capture timed out and the intent could not be read");
                    Err(e.into())
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, intent_id = %intent_id, "capture failed");
                Err(e.into())
            }
        }
    }

    /// Empty the cart through a write conditional on the version priced for
    /// this order. Returns the lines taken.
    async fn claim_cart(&self, mut cart: Cart) -> Result<Vec<CartItem>, CommerceError> {
        let items = cart.take_items();
        match self.cart_store.save(cart).await {
            Ok(_) => Ok(items),
            Err(e) if e.is_conflict() => Err(CommerceError::Conflict(
                "cart changed or was checked out by another request".into(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Put claimed lines back after a failed confirmation.
    async fn restore_cart(&self, cart_id: &CartId, items: Vec<CartItem>) {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let mut cart = match self.cart_store.get(cart_id).await {
                Ok(Some(cart)) => cart,
                Ok(None) => {
                    tracing::warn!(cart_id = %cart_id, "cart gone before its lines could be restored");
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, cart_id = %cart_id, "failed to load cart for restore");
                    return;
                }
            };
            if let Err(e) = cart.restore_items(items.clone()) {
                tracing::error!(error = %e, cart_id = %cart_id, "failed to restore cart lines");
                return;
            }
            match self.cart_store.save(cart).await {
                Ok(_) => return,
                Err(e) if e.is_conflict() => {
                    tracing::debug!(attempt, "cart restore conflicted, retrying");
                }
                Err(e) => {
                    tracing::error!(error = %e, cart_id = %cart_id, "failed to restore cart lines");
                    return;
                }
            }
        }
        tracing::error!(cart_id = %cart_id, "cart kept changing; lines not restored");
    }

    /// The session's cart repriced against the live catalog. Fails on any
    /// line that can no longer be bought as configured.
    async fn checked_cart(&self, session: &CheckoutSession) -> Result<(Cart, Vec<Product>), CommerceError> {
        let mut cart = self.session_cart(session).await?;
        let products = self.carts.products_for(&cart).await?;
        let report = cart.reprice(&products, &self.pricing)?;
        ensure_purchasable(&cart, &report.issues)?;
        Ok((cart, products))
    }

    fn totals(
        &self,
        cart: &Cart,
        option: Option<&ShippingOption>,
        jurisdiction: Option<&Jurisdiction>,
    ) -> Result<OrderTotals, CommerceError> {
        Ok(cart
            .totals(&self.pricing, option, self.tax.as_ref(), jurisdiction)?
            .rounded())
    }

    async fn session_cart(&self, session: &CheckoutSession) -> Result<Cart, CommerceError> {
        self.cart_store
            .get(&session.cart_id)
            .await?
            .ok_or_else(|| CommerceError::not_found("cart", &session.cart_id))
    }

    async fn restock(&self, lines: &[(ProductId, i64)]) {
        if let Err(e) = self.products.restock(lines).await {
            tracing::error!(error = %e, "failed to restock after aborted confirmation");
        }
    }

    /// Drop the confirmation claim so the customer can try again.
    async fn release(&self, owner: &CartOwner, id: &CheckoutId) {
        let released = self
            .update(owner, id, |session| {
                session.abort_confirmation();
                Ok(())
            })
            .await;
        if let Err(e) = released {
            tracing::error!(error = %e, "failed to release checkout confirmation");
        }
    }

    /// A live session owned by `owner`. Sessions of other owners are not found.
    async fn load(&self, owner: &CartOwner, id: &CheckoutId) -> Result<CheckoutSession, CommerceError> {
        self.sessions
            .get(id)
            .await?
            .filter(|session| &session.owner == owner)
            .filter(|session| session.is_confirmed() || !session.is_expired(Utc::now()))
            .ok_or_else(|| CommerceError::not_found("checkout", id))
    }

    async fn update<F>(&self, owner: &CartOwner, id: &CheckoutId, mut change: F) -> Result<CheckoutSession, CommerceError>
    where
        F: FnMut(&mut CheckoutSession) -> Result<(), CommerceError> + Send,
    {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let mut session = self.load(owner, id).await?;
            change(&mut session)?;
            match self.sessions.save(session).await {
                Ok(session) => return Ok(session),
                Err(e) if e.is_conflict() => {
                    tracing::debug!(attempt, "checkout write conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Conflict(format!("checkout {id} kept changing")))
    }

    fn quoted_total(session: &CheckoutSession) -> Result<Money, CommerceError> {
        session
            .quoted_totals
            .map(|totals| totals.total)
            .ok_or_else(|| CommerceError::invalid_field("shippingOptionId", "shipping has not been submitted"))
    }

    async fn present(&self, session: CheckoutSession) -> Result<CheckoutView, CommerceError> {
        let priced = self.checked_cart(&session).await.and_then(|(cart, _)| {
            self.totals(&cart, session.shipping_option.as_ref(), session.jurisdiction().as_ref())
        });
        let totals = match priced {
            Ok(totals) => totals,
            // The session is still shown when its cart has problems; confirm reports them.
            Err(CommerceError::OutOfStock(_) | CommerceError::Validation { .. }) => {
                session.quoted_totals.unwrap_or_else(|| OrderTotals::zero(self.pricing.currency))
            }
            Err(e) => return Err(e),
        };
        Ok(CheckoutView {
            session,
            totals,
            shipping_options: self.shipping_options.clone(),
        })
    }
}

/// Units to take from stock, summed per product across customizations.
fn units_by_product(cart: &Cart) -> Vec<(ProductId, i64)> {
    let mut units: BTreeMap<ProductId, i64> = BTreeMap::new();
    for item in &cart.items {
        *units.entry(item.product_id.clone()).or_default() += item.quantity;
    }
    units.into_iter().collect()
}

fn ensure_purchasable(cart: &Cart, issues: &[LineIssue]) -> Result<(), CommerceError> {
    let Some(first) = issues.first() else {
        return Ok(());
    };
    let name = |issue: &LineIssue| {
        cart.get_item(issue.item_id())
            .map(|item| item.product_name.clone())
            .unwrap_or_else(|| issue.item_id().to_string())
    };
    if let Some(issue) = issues
        .iter()
        .find(|issue| matches!(issue, LineIssue::OutOfStock { .. }))
    {
        return Err(CommerceError::OutOfStock(name(issue)));
    }
    let fields = issues
        .iter()
        .map(|issue| match issue {
            LineIssue::InvalidCustomization { reason, .. } => {
                FieldError::new(format!("items.{}", issue.item_id()), reason.to_string())
            }
            _ => FieldError::new(format!("items.{}", issue.item_id()), "product is no longer available"),
        })
        .collect();
    Err(CommerceError::invalid_fields(
        format!("{} can no longer be purchased", name(first)),
        fields,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, TestContext};
    use rust_decimal::Decimal;
    use wick_commerce::cart::CartItemUpdate;
    use wick_commerce::catalog::CustomizationOption;
    use wick_commerce::ids::UserId;
    use wick_commerce::Currency;

    async fn at_review(ctx: &TestContext, owner: &CartOwner) -> CheckoutId {
        testing::fill_cart(ctx, owner, 2).await;
        let view = ctx.checkout.start(owner).await.unwrap();
        let id = view.session.id.clone();
        ctx.checkout
            .submit_shipping(owner, &id, testing::shipping_details("standard"))
            .await
            .unwrap();
        ctx.checkout
            .submit_payment(
                owner,
                &id,
                SubmitPayment {
                    method: PaymentMethod::Card,
                    intent_id: None,
                },
            )
            .await
            .unwrap();
        id
    }

    fn owner() -> CartOwner {
        CartOwner::User(UserId::new("u1"))
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_start_checkout() {
        let ctx = testing::context().await;
        let err = ctx.checkout.start(&owner()).await.unwrap_err();
        assert!(matches!(err, CommerceError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_shipping_quotes_totals() {
        let ctx = testing::context().await;
        testing::fill_cart(&ctx, &owner(), 2).await;
        let id = ctx.checkout.start(&owner()).await.unwrap().session.id;

        let view = ctx
            .checkout
            .submit_shipping(&owner(), &id, testing::shipping_details("standard"))
            .await
            .unwrap();
        assert_eq!(view.session.step, CheckoutStep::Payment);
        let quote = view.session.quoted_totals.unwrap();
        assert_eq!(quote.total, Money::from_minor(4386, Currency::USD));
    }

    #[tokio::test]
    async fn test_unknown_shipping_option() {
        let ctx = testing::context().await;
        testing::fill_cart(&ctx, &owner(), 1).await;
        let id = ctx.checkout.start(&owner()).await.unwrap().session.id;
        let err = ctx
            .checkout
            .submit_shipping(&owner(), &id, testing::shipping_details("teleport"))
            .await
            .unwrap_err();
        let CommerceError::Validation { fields, .. } = err else {
            panic!("expected a validation error");
        };
        assert_eq!(fields[0].field, "shippingOptionId");
    }

    #[tokio::test]
    async fn test_review_requires_authorization() {
        let ctx = testing::context().await;
        testing::fill_cart(&ctx, &owner(), 1).await;
        let id = ctx.checkout.start(&owner()).await.unwrap().session.id;
        ctx.checkout
            .submit_shipping(&owner(), &id, testing::shipping_details("standard"))
            .await
            .unwrap();

        ctx.gateway
            .fail_next("confirm", GatewayError::Declined("card_declined".into()));
        let err = ctx
            .checkout
            .submit_payment(
                &owner(),
                &id,
                SubmitPayment {
                    method: PaymentMethod::Card,
                    intent_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::PaymentDeclined(_)));

        let err = ctx.checkout.confirm(&owner(), &id).await.unwrap_err();
        assert!(matches!(err, CommerceError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_client_amount_is_advisory() {
        let ctx = testing::context().await;
        testing::fill_cart(&ctx, &owner(), 2).await;
        let id = ctx.checkout.start(&owner()).await.unwrap().session.id;
        ctx.checkout
            .submit_shipping(&owner(), &id, testing::shipping_details("standard"))
            .await
            .unwrap();

        let intent = ctx
            .checkout
            .create_payment_intent(
                &owner(),
                &id,
                IntentRequest {
                    amount: Some(Money::from_minor(1, Currency::USD)),
                },
            )
            .await
            .unwrap();
        assert_eq!(intent.amount, Money::from_minor(4386, Currency::USD));
    }

    #[tokio::test]
    async fn test_back_keeps_entered_data() {
        let ctx = testing::context().await;
        let id = at_review(&ctx, &owner()).await;
        let view = ctx.checkout.go_back(&owner(), &id).await.unwrap();
        assert_eq!(view.session.step, CheckoutStep::Payment);
        assert!(view.session.authorization.is_some());
        let view = ctx.checkout.go_back(&owner(), &id).await.unwrap();
        assert_eq!(view.session.step, CheckoutStep::Shipping);
        assert!(view.session.shipping_address.is_some());
    }

    #[tokio::test]
    async fn test_confirm_places_order_and_clears_cart() {
        let ctx = testing::context().await;
        let id = at_review(&ctx, &owner()).await;

        let confirmation = ctx.checkout.confirm(&owner(), &id).await.unwrap();
        assert!(confirmation.order_number.starts_with("WK-"));
        assert_eq!(confirmation.status, OrderStatus::Pending);

        let cart = ctx.carts.view(&owner()).await.unwrap();
        assert!(cart.cart.is_empty());
        let product = ctx.catalog.get(&ProductId::new(testing::COZY_JAR)).await.unwrap();
        assert_eq!(product.inventory.quantity, testing::COZY_JAR_STOCK - 2);

        let view = ctx.checkout.view(&owner(), &id).await.unwrap();
        assert!(view.session.is_confirmed());
        let err = ctx.checkout.confirm(&owner(), &id).await.unwrap_err();
        assert!(matches!(err, CommerceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_stale_totals_give_price_mismatch() {
        let ctx = testing::context().await;
        let id = at_review(&ctx, &owner()).await;

        let cart = ctx.carts.view(&owner()).await.unwrap();
        let item_id = cart.cart.items[0].id.clone();
        ctx.carts
            .update_item(&owner(), &item_id, CartItemUpdate { quantity: Some(3) })
            .await
            .unwrap();

        let err = ctx.checkout.confirm(&owner(), &id).await.unwrap_err();
        assert!(matches!(err, CommerceError::PriceMismatch { .. }));

        let view = ctx.checkout.view(&owner(), &id).await.unwrap();
        assert_eq!(view.session.step, CheckoutStep::Review);
        assert!(!view.session.confirming);
        let product = ctx.catalog.get(&ProductId::new(testing::COZY_JAR)).await.unwrap();
        assert_eq!(product.inventory.quantity, testing::COZY_JAR_STOCK);
    }

    #[tokio::test]
    async fn test_failed_capture_restocks() {
        let ctx = testing::context().await;
        let id = at_review(&ctx, &owner()).await;
        ctx.gateway
            .fail_next("capture", GatewayError::Declined("insufficient_funds".into()));

        let err = ctx.checkout.confirm(&owner(), &id).await.unwrap_err();
        assert!(matches!(err, CommerceError::PaymentDeclined(_)));
        let product = ctx.catalog.get(&ProductId::new(testing::COZY_JAR)).await.unwrap();
        assert_eq!(product.inventory.quantity, testing::COZY_JAR_STOCK);

        // The session stays in review and a retry goes through.
        let confirmation = ctx.checkout.confirm(&owner(), &id).await.unwrap();
        assert!(confirmation.order_number.starts_with("WK-"));
    }

    #[tokio::test]
    async fn test_capture_timeout_after_charge_places_order() {
        let ctx = testing::context().await;
        let id = at_review(&ctx, &owner()).await;
        ctx.gateway
            .lose_next_reply("capture", GatewayError::Timeout { timeout_ms: 50 });
        let lookups = ctx.gateway.calls("retrieve");

        let confirmation = ctx.checkout.confirm(&owner(), &id).await.unwrap();
        let order = ctx
            .orders
            .get_for_user(&UserId::new("u1"), &confirmation.order_id)
            .await
            .unwrap();
        assert_eq!(order.payment.status, PaymentStatus::Succeeded);
        assert_eq!(ctx.gateway.calls("capture"), 1);
        assert_eq!(ctx.gateway.calls("retrieve"), lookups + 1);

        let product = ctx.catalog.get(&ProductId::new(testing::COZY_JAR)).await.unwrap();
        assert_eq!(product.inventory.quantity, testing::COZY_JAR_STOCK - 2);
        assert!(ctx.carts.view(&owner()).await.unwrap().cart.is_empty());
    }

    #[tokio::test]
    async fn test_capture_timeout_without_charge_restores_everything() {
        let ctx = testing::context().await;
        let id = at_review(&ctx, &owner()).await;
        ctx.gateway
            .fail_next("capture", GatewayError::Timeout { timeout_ms: 50 });

        let err = ctx.checkout.confirm(&owner(), &id).await.unwrap_err();
        assert!(matches!(err, CommerceError::GatewayTimeout { timeout_ms: 50 }));

        let product = ctx.catalog.get(&ProductId::new(testing::COZY_JAR)).await.unwrap();
        assert_eq!(product.inventory.quantity, testing::COZY_JAR_STOCK);
        let cart = ctx.carts.view(&owner()).await.unwrap();
        assert_eq!(cart.cart.item_count(), 2);
        assert!(ctx.orders.list_for_user(&UserId::new("u1")).await.unwrap().is_empty());
    }

    /// A second session over the same cart, as left behind by another tab.
    async fn twin_session(ctx: &TestContext, id: &CheckoutId) -> CheckoutId {
        let mut twin = ctx.checkout.view(&owner(), id).await.unwrap().session;
        twin.id = CheckoutId::generate();
        twin.version = 0;
        CheckoutRepository::save(ctx.store().as_ref(), twin)
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_two_sessions_over_one_cart_place_one_order() {
        let ctx = testing::context().await;
        let first = at_review(&ctx, &owner()).await;
        let second = twin_session(&ctx, &first).await;
        ctx.gateway.set_latency(std::time::Duration::from_millis(50));

        let owner = owner();
        let (a, b) = tokio::join!(
            ctx.checkout.confirm(&owner, &first),
            ctx.checkout.confirm(&owner, &second),
        );
        let (placed, rejected): (Vec<_>, Vec<_>) = [a, b].into_iter().partition(Result::is_ok);
        assert_eq!(placed.len(), 1);
        assert!(matches!(rejected[0], Err(CommerceError::Conflict(_))));

        let orders = ctx.orders.list_for_user(&UserId::new("u1")).await.unwrap();
        assert_eq!(orders.len(), 1);
        let product = ctx.catalog.get(&ProductId::new(testing::COZY_JAR)).await.unwrap();
        assert_eq!(product.inventory.quantity, testing::COZY_JAR_STOCK - 2);
        assert_eq!(ctx.gateway.calls("capture"), 1);
    }

    #[tokio::test]
    async fn test_second_session_after_order_conflicts() {
        let ctx = testing::context().await;
        let first = at_review(&ctx, &owner()).await;
        let second = twin_session(&ctx, &first).await;

        ctx.checkout.confirm(&owner(), &first).await.unwrap();
        let err = ctx.checkout.confirm(&owner(), &second).await.unwrap_err();
        assert!(matches!(err, CommerceError::Conflict(_)));

        let view = ctx.checkout.view(&owner(), &second).await.unwrap();
        assert_eq!(view.session.step, CheckoutStep::Review);
        assert!(!view.session.confirming);
        let product = ctx.catalog.get(&ProductId::new(testing::COZY_JAR)).await.unwrap();
        assert_eq!(product.inventory.quantity, testing::COZY_JAR_STOCK - 2);
    }

    #[tokio::test]
    async fn test_start_discards_earlier_session() {
        let ctx = testing::context().await;
        testing::fill_cart(&ctx, &owner(), 1).await;
        let earlier = ctx.checkout.start(&owner()).await.unwrap().session.id;
        let later = ctx.checkout.start(&owner()).await.unwrap().session.id;

        let err = ctx.checkout.view(&owner(), &earlier).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound { .. }));
        assert!(ctx.checkout.view(&owner(), &later).await.is_ok());
    }

    #[tokio::test]
    async fn test_catalog_reprice_after_authorization_gives_price_mismatch() {
        let ctx = testing::context().await;
        let id = at_review(&ctx, &owner()).await;

        let mut repriced = testing::cozy_jar();
        repriced.base_price = Money::from_minor(1899, Currency::USD);
        ctx.catalog.seed(vec![repriced]).await.unwrap();

        let err = ctx.checkout.confirm(&owner(), &id).await.unwrap_err();
        let CommerceError::PriceMismatch { authorized, current } = err else {
            panic!("expected a price mismatch");
        };
        assert_eq!(authorized, Money::from_minor(4386, Currency::USD));
        assert_ne!(current, authorized);
        assert_eq!(ctx.gateway.calls("capture"), 0);
        assert_eq!(ctx.carts.view(&owner()).await.unwrap().cart.item_count(), 2);
    }

    #[tokio::test]
    async fn test_order_unaffected_by_later_catalog_changes() {
        let ctx = testing::context().await;
        let id = at_review(&ctx, &owner()).await;
        let confirmation = ctx.checkout.confirm(&owner(), &id).await.unwrap();
        let user = UserId::new("u1");
        let before = ctx.orders.get_for_user(&user, &confirmation.order_id).await.unwrap();

        let mut changed = testing::cozy_jar();
        changed.name = "Cozy Jar (Winter)".into();
        changed.base_price = Money::from_minor(2599, Currency::USD);
        changed.customization = changed.customization.with_size(CustomizationOption::size(
            "grande",
            "Grande",
            Decimal::new(500, 2),
            Some(90),
        ));
        ctx.catalog.seed(vec![changed]).await.unwrap();

        let after = ctx.orders.get_for_user(&user, &confirmation.order_id).await.unwrap();
        assert_eq!(after.items, before.items);
        assert_eq!(after.totals, before.totals);
        assert_eq!(after.items[0].name, "Cozy Jar");
        assert_eq!(after.items[0].unit_price, Money::from_minor(1799, Currency::USD));
        assert_eq!(after.totals.total, Money::from_minor(4386, Currency::USD));
    }

    #[tokio::test]
    async fn test_other_owner_cannot_see_checkout() {
        let ctx = testing::context().await;
        let id = at_review(&ctx, &owner()).await;
        let stranger = CartOwner::Guest(wick_commerce::ids::GuestId::new("g-stranger"));
        let err = ctx.checkout.view(&stranger, &id).await.unwrap_err();
        assert!(matches!(err, CommerceError::NotFound { .. }));
    }
}
