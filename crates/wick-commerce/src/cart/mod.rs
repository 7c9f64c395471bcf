//! Shopping cart module.
//!
//! Contains the cart aggregate, its line items and the guest merge.

mod cart;
mod merge;

pub use cart::{
    Cart, CartItem, CartItemUpdate, CartOwner, LineIssue, RepriceReport, MAX_QUANTITY_PER_ITEM,
};
pub use merge::{CartMergeResolver, MergeOutcome};
