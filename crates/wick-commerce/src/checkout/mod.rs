//! Checkout module.
//!
//! Contains the checkout state machine, addresses, payments, orders and the
//! order lifecycle.

mod address;
mod flow;
mod lifecycle;
mod order;
mod payment;

pub use address::{is_plausible_email, Address};
pub use flow::{CheckoutSession, CheckoutStep, ShippingDetails};
pub use lifecycle::{ChangeSource, StatusChange, TransitionOutcome};
pub use order::{format_order_number, NewOrder, Order, OrderItem, OrderStatus};
pub use payment::{
    PaymentAuthorization, PaymentDetails, PaymentEvent, PaymentEventKind, PaymentMethod,
    PaymentStatus,
};
