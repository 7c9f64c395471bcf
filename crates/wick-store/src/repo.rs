//! Persistence ports.
//!
//! Every mutable document carries a `version`. Saves are conditional on the
//! stored version still matching the document's, and return the document
//! with its new version. A version of 0 means the document must not exist yet.

use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use wick_commerce::cart::{Cart, CartOwner};
use wick_commerce::catalog::Product;
use wick_commerce::checkout::{CheckoutSession, Order, PaymentEvent};
use wick_commerce::ids::{CartId, CheckoutId, OrderId, PaymentIntentId, ProductId, UserId};

/// Documents saved with optimistic concurrency.
pub trait Versioned {
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl Versioned for Cart {
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Versioned for Order {
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Versioned for CheckoutSession {
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;

    /// All products, oldest first.
    async fn list(&self) -> Result<Vec<Product>, StoreError>;

    async fn upsert(&self, product: Product) -> Result<Product, StoreError>;

    /// Take units off hand for every line, or for none of them.
    ///
    /// Fails with [`StoreError::InsufficientStock`] naming the first product
    /// that cannot cover its quantity.
    async fn decrement_inventory(&self, lines: &[(ProductId, i64)]) -> Result<(), StoreError>;

    /// Put units back, e.g. after a capture fails. Unknown products are skipped.
    async fn restock(&self, lines: &[(ProductId, i64)]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn get(&self, id: &CartId) -> Result<Option<Cart>, StoreError>;

    /// The live cart for an owner. Expired guest carts are treated as absent.
    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError>;

    /// Conditional save. An owner may hold only one cart.
    async fn save(&self, cart: Cart) -> Result<Cart, StoreError>;

    /// Conditional save of a merge target together with the delete of the
    /// guest cart folded into it. Both happen or neither does.
    async fn save_merged(&self, cart: Cart, consumed: &CartId) -> Result<Cart, StoreError>;

    async fn delete(&self, id: &CartId) -> Result<bool, StoreError>;

    /// Delete guest carts whose expiry has passed. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Result of inserting an order.
#[derive(Debug, Clone)]
pub struct InsertedOrder {
    pub order: Order,
    /// Events that arrived for this order's payment intent before it existed.
    pub parked_events: Vec<PaymentEvent>,
}

/// Result of parking an early webhook event.
#[derive(Debug, Clone, PartialEq)]
pub enum ParkOutcome {
    Parked,
    /// The same event id is already waiting.
    AlreadyParked,
    /// The order appeared in the meantime; apply the event to it directly.
    OrderExists(OrderId),
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert a new order. Order number and checkout id are unique. Any
    /// events parked for the order's payment intent are drained atomically.
    async fn insert(&self, order: Order) -> Result<InsertedOrder, StoreError>;

    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError>;

    async fn find_by_checkout(&self, checkout_id: &CheckoutId) -> Result<Option<Order>, StoreError>;

    async fn find_by_intent(&self, intent_id: &PaymentIntentId) -> Result<Option<Order>, StoreError>;

    /// A user's orders, newest first.
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError>;

    /// Conditional save of an existing order.
    async fn update(&self, order: Order) -> Result<Order, StoreError>;

    /// Next value of the per-day order number sequence, starting at 1.
    async fn next_sequence(&self, date: NaiveDate) -> Result<u64, StoreError>;

    /// Hold an event whose order does not exist yet.
    async fn park_event(&self, event: PaymentEvent) -> Result<ParkOutcome, StoreError>;
}

#[async_trait]
pub trait CheckoutRepository: Send + Sync {
    async fn get(&self, id: &CheckoutId) -> Result<Option<CheckoutSession>, StoreError>;

    /// Conditional save.
    async fn save(&self, session: CheckoutSession) -> Result<CheckoutSession, StoreError>;

    async fn delete(&self, id: &CheckoutId) -> Result<bool, StoreError>;

    /// Delete the other open sessions over `cart_id`, keeping `keep`. Sessions
    /// that are confirmed or mid-confirmation stay. Returns how many were removed.
    async fn discard_others_for_cart(&self, cart_id: &CartId, keep: &CheckoutId) -> Result<usize, StoreError>;

    /// Delete expired, unconfirmed sessions. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}
