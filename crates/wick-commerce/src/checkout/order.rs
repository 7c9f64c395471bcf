//! Order types.

use crate::checkout::{Address, PaymentDetails, StatusChange};
use crate::customization::CustomizationCombination;
use crate::ids::{CheckoutId, OrderId, ProductId, UserId};
use crate::money::{Currency, Money};
use crate::pricing::{OrderTotals, PricedLine, ShippingOption};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order placed, awaiting payment settlement.
    #[default]
    Pending,
    /// Paid and being prepared.
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Position along the fulfilment path. Cancelled sits off the path.
    pub fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Processing => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    /// Check if order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Check if order can be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Whether moving from `self` to `next` is a legal change.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if next == OrderStatus::Cancelled {
            return self.can_cancel();
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-shareable order number: `WK-YYYYMMDD-NNNNNN`.
pub fn format_order_number(date: NaiveDate, sequence: u64) -> String {
    format!("WK-{}-{:06}", date.format("%Y%m%d"), sequence)
}

/// A frozen snapshot of one purchased line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    /// Product name at time of order.
    pub name: String,
    pub images: Vec<String>,
    pub unit_price: Money,
    pub customization: CustomizationCombination,
    /// E.g. `["Scent: Vanilla", "Size: Large"]`.
    pub customization_labels: Vec<String>,
    pub quantity: i64,
    pub line_total: Money,
}

impl PricedLine for OrderItem {
    fn unit_price(&self) -> &Money {
        &self.unit_price
    }

    fn quantity(&self) -> i64 {
        self.quantity
    }
}

/// Everything needed to place an order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_number: String,
    pub checkout_id: CheckoutId,
    pub user_id: Option<UserId>,
    pub email: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub shipping_option: ShippingOption,
    pub payment: PaymentDetails,
    pub totals: OrderTotals,
}

/// A placed order. Created once; afterwards only status transitions and
/// payment events change it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    /// Checkout this order was placed from. Unique across orders.
    pub checkout_id: CheckoutId,
    /// None for guest orders.
    pub user_id: Option<UserId>,
    pub email: String,
    pub items: Vec<OrderItem>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub shipping_option: ShippingOption,
    pub payment: PaymentDetails,
    /// Rounded at placement.
    pub totals: OrderTotals,
    pub currency: Currency,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub status_history: Vec<StatusChange>,
    /// Gateway event ids already applied.
    pub applied_events: Vec<String>,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Place an order in `pending` status.
    pub fn place(new: NewOrder) -> Self {
        let now = Utc::now();
        let totals = new.totals.rounded();
        Self {
            id: OrderId::generate(),
            order_number: new.order_number,
            checkout_id: new.checkout_id,
            user_id: new.user_id,
            email: new.email,
            items: new.items,
            shipping_address: new.shipping_address,
            billing_address: new.billing_address,
            shipping_option: new.shipping_option,
            payment: new.payment,
            currency: totals.total.currency,
            totals,
            status: OrderStatus::Pending,
            tracking_number: None,
            status_history: vec![StatusChange::placed(now)],
            applied_events: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get total item count.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Whether `email` matches the order's contact email, ignoring case.
    pub fn email_matches(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == OrderStatus::Cancelled
    }
}
