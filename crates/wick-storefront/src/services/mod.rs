//! Storefront use cases.
//!
//! Services are cheap to clone and hold only `Arc`ed ports, so handlers take
//! them straight out of the shared [`AppContext`](crate::context::AppContext).

mod cart;
mod catalog;
mod checkout;
mod orders;
mod sweep;

pub use cart::{AddItem, CartService, CartView, MergeView};
pub use catalog::{CatalogService, CustomizationCheck};
pub use checkout::{
    CheckoutDeps, CheckoutService, CheckoutView, Confirmation, IntentRequest, IntentView,
    SubmitPayment,
};
pub use orders::{OrderService, StatusUpdate, WebhookOutcome};
pub use sweep::{spawn_sweeper, sweep_once, SweepReport};

/// Attempts at a versioned read-modify-write before giving up with a conflict.
pub const MAX_CONFLICT_RETRIES: usize = 5;
