//! Cart and cart item types.

use crate::catalog::Product;
use crate::customization::{CustomizationCombination, CustomizationValidator, InvalidReason};
use crate::error::CommerceError;
use crate::ids::{CartId, CartItemId, GuestId, ProductId, UserId};
use crate::money::{Currency, Money};
use crate::pricing::{Jurisdiction, OrderTotals, PricedLine, PricingEngine, ShippingOption, TaxPolicy};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Maximum quantity allowed per line item.
pub const MAX_QUANTITY_PER_ITEM: i64 = 99;

/// Who a cart belongs to. A cart has exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum CartOwner {
    User(UserId),
    Guest(GuestId),
}

impl CartOwner {
    /// Stable key used to index carts by owner.
    pub fn key(&self) -> String {
        match self {
            CartOwner::User(id) => format!("user:{}", id),
            CartOwner::Guest(id) => format!("guest:{}", id),
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, CartOwner::Guest(_))
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            CartOwner::User(id) => Some(id),
            CartOwner::Guest(_) => None,
        }
    }
}

/// Partial update of a cart item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemUpdate {
    pub quantity: Option<i64>,
}

/// A problem found while reconciling a line against the live catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum LineIssue {
    ProductMissing { item_id: CartItemId },
    OutOfStock { item_id: CartItemId },
    InvalidCustomization { item_id: CartItemId, reason: InvalidReason },
}

impl LineIssue {
    pub fn item_id(&self) -> &CartItemId {
        match self {
            LineIssue::ProductMissing { item_id }
            | LineIssue::OutOfStock { item_id }
            | LineIssue::InvalidCustomization { item_id, .. } => item_id,
        }
    }
}

/// What [`Cart::reprice`] changed or flagged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepriceReport {
    /// Lines whose unit price moved.
    pub repriced: Vec<CartItemId>,
    pub issues: Vec<LineIssue>,
}

impl RepriceReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// A shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub owner: CartOwner,
    /// Items in insertion order.
    pub items: Vec<CartItem>,
    pub currency: Currency,
    /// Σ unit price × quantity, refreshed on every mutation.
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Guest carts expire; user carts do not.
    pub expires_at: Option<DateTime<Utc>>,
    /// Bumped by the store on every successful write.
    #[serde(default)]
    pub version: u64,
}

impl Cart {
    pub fn new(owner: CartOwner, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::generate(),
            owner,
            items: Vec::new(),
            currency,
            total_price: Money::zero(currency),
            created_at: now,
            updated_at: now,
            expires_at: None,
            version: 0,
        }
    }

    /// Create a guest cart that expires `ttl` from now.
    pub fn for_guest(guest_id: GuestId, currency: Currency, ttl: Duration) -> Self {
        let mut cart = Self::new(CartOwner::Guest(guest_id), currency);
        cart.expires_at = Some(cart.created_at + ttl);
        cart
    }

    pub fn for_user(user_id: UserId, currency: Currency) -> Self {
        Self::new(CartOwner::User(user_id), currency)
    }

    /// Add a customized product.
    ///
    /// A line with the same product and identical combination has its quantity
    /// incremented instead of a duplicate line being created.
    pub fn add_item(
        &mut self,
        product: &Product,
        quantity: i64,
        combination: CustomizationCombination,
        pricing: &PricingEngine,
    ) -> Result<CartItemId, CommerceError> {
        check_quantity(quantity)?;
        if !product.is_purchasable() {
            return Err(CommerceError::OutOfStock(product.name.clone()));
        }
        let unit_price = pricing.unit_price(product, &combination)?;

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.id && item.customization == combination)
        {
            let new_quantity = existing
                .quantity
                .checked_add(quantity)
                .ok_or(CommerceError::Overflow)?;
            check_quantity(new_quantity)?;
            existing.quantity = new_quantity;
            existing.unit_price = unit_price;
            let id = existing.id.clone();
            self.touch()?;
            return Ok(id);
        }

        let item = CartItem::new(product, quantity, combination, unit_price);
        let id = item.id.clone();
        self.items.push(item);
        self.touch()?;
        Ok(id)
    }

    /// Apply a partial update to one item.
    pub fn update_item(
        &mut self,
        item_id: &CartItemId,
        update: CartItemUpdate,
    ) -> Result<(), CommerceError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| &item.id == item_id)
            .ok_or_else(|| CommerceError::not_found("cart item", item_id))?;
        if let Some(quantity) = update.quantity {
            check_quantity(quantity)?;
            item.quantity = quantity;
        }
        self.touch()
    }

    /// Remove an item. Removing an id that is not in the cart is a no-op that returns false.
    pub fn remove_item(&mut self, item_id: &CartItemId) -> Result<bool, CommerceError> {
        let len_before = self.items.len();
        self.items.retain(|item| &item.id != item_id);
        let removed = self.items.len() < len_before;
        if removed {
            self.touch()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.total_price = Money::zero(self.currency);
        self.updated_at = Utc::now();
    }

    /// Empty the cart and hand back its lines.
    pub fn take_items(&mut self) -> Vec<CartItem> {
        let items = std::mem::take(&mut self.items);
        self.clear();
        items
    }

    /// Put back lines taken with [`Cart::take_items`]. A line whose product
    /// and combination is already in the cart again is dropped; the newer
    /// line wins.
    pub fn restore_items(&mut self, items: Vec<CartItem>) -> Result<(), CommerceError> {
        for item in items {
            let present = self.items.iter().any(|line| {
                line.id == item.id
                    || (line.product_id == item.product_id && line.customization == item.customization)
            });
            if !present {
                self.items.push(item);
            }
        }
        self.touch()
    }

    /// Reconcile every line with the live catalog, updating unit prices.
    ///
    /// Lines with problems keep their last price and are reported, not removed.
    pub fn reprice(
        &mut self,
        products: &[Product],
        pricing: &PricingEngine,
    ) -> Result<RepriceReport, CommerceError> {
        let mut report = RepriceReport::default();
        for item in &mut self.items {
            let Some(product) = products.iter().find(|p| p.id == item.product_id) else {
                report.issues.push(LineIssue::ProductMissing {
                    item_id: item.id.clone(),
                });
                continue;
            };
            let outcome = CustomizationValidator::validate(product, &item.customization);
            if let Some(reason) = outcome.reason {
                report.issues.push(LineIssue::InvalidCustomization {
                    item_id: item.id.clone(),
                    reason,
                });
                continue;
            }
            if !product.can_fulfill(item.quantity) {
                report.issues.push(LineIssue::OutOfStock {
                    item_id: item.id.clone(),
                });
            }
            let fresh = pricing.unit_price(product, &item.customization)?;
            if fresh != item.unit_price {
                item.unit_price = fresh;
                report.repriced.push(item.id.clone());
            }
            item.product_name.clone_from(&product.name);
        }
        self.refresh_total()?;
        Ok(report)
    }

    /// Totals through the pricing engine. Never cached.
    pub fn totals(
        &self,
        pricing: &PricingEngine,
        shipping: Option<&ShippingOption>,
        tax_policy: &dyn TaxPolicy,
        jurisdiction: Option<&Jurisdiction>,
    ) -> Result<OrderTotals, CommerceError> {
        pricing.order_totals(&self.items, shipping, tax_policy, jurisdiction)
    }

    /// Recompute the stored `total_price` from the lines.
    pub fn refresh_total(&mut self) -> Result<(), CommerceError> {
        let line_totals = self
            .items
            .iter()
            .map(CartItem::line_total)
            .collect::<Result<Vec<_>, _>>()?;
        self.total_price = Money::try_sum(line_totals.iter(), self.currency)?;
        Ok(())
    }

    /// Hand the cart to a signed-in user and drop the guest expiry.
    pub fn assign_to(&mut self, user_id: UserId) {
        self.owner = CartOwner::User(user_id);
        self.expires_at = None;
        self.updated_at = Utc::now();
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Total item count (sum of quantities).
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get_item(&self, item_id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == item_id)
    }

    pub(crate) fn touch(&mut self) -> Result<(), CommerceError> {
        self.refresh_total()?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

pub(crate) fn check_quantity(quantity: i64) -> Result<(), CommerceError> {
    if quantity < 1 {
        return Err(CommerceError::invalid_field("quantity", "quantity must be at least 1"));
    }
    if quantity > MAX_QUANTITY_PER_ITEM {
        return Err(CommerceError::invalid_field(
            "quantity",
            format!("quantity must not exceed {}", MAX_QUANTITY_PER_ITEM),
        ));
    }
    Ok(())
}

/// A line in the cart. The product is a live reference; the unit price is
/// whatever the server last computed for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    /// Product name (denormalized for display).
    pub product_name: String,
    pub quantity: i64,
    pub customization: CustomizationCombination,
    pub unit_price: Money,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    fn new(
        product: &Product,
        quantity: i64,
        customization: CustomizationCombination,
        unit_price: Money,
    ) -> Self {
        Self {
            id: CartItemId::generate(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            customization,
            unit_price,
            added_at: Utc::now(),
        }
    }

    pub fn line_total(&self) -> Result<Money, CommerceError> {
        self.unit_price.try_multiply(self.quantity)
    }
}

impl PricedLine for CartItem {
    fn unit_price(&self) -> &Money {
        &self.unit_price
    }

    fn quantity(&self) -> i64 {
        self.quantity
    }
}
