//! Guest to user cart merge at login.

use super::cart::{Cart, MAX_QUANTITY_PER_ITEM};
use crate::error::CommerceError;
use crate::ids::UserId;
use chrono::Utc;

/// Result of folding a guest cart into a user's cart.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The cart the user now owns.
    pub cart: Cart,
    /// Guest lines folded into an existing user line.
    pub merged_lines: usize,
    /// Guest lines appended as new lines.
    pub appended_lines: usize,
    /// True when the guest cart itself was reassigned because the user had none.
    pub reassigned: bool,
}

pub struct CartMergeResolver;

impl CartMergeResolver {
    /// Merge `guest` into `user_cart`, or hand `guest` to the user when they
    /// have no cart. Summed quantities are capped at the per-line maximum.
    pub fn merge(
        guest: Cart,
        user_cart: Option<Cart>,
        user_id: &UserId,
    ) -> Result<MergeOutcome, CommerceError> {
        let Some(mut target) = user_cart else {
            let mut cart = guest;
            cart.assign_to(user_id.clone());
            return Ok(MergeOutcome {
                appended_lines: cart.items.len(),
                cart,
                merged_lines: 0,
                reassigned: true,
            });
        };

        let mut merged_lines = 0;
        let mut appended_lines = 0;
        for item in guest.items {
            match target
                .items
                .iter_mut()
                .find(|line| line.product_id == item.product_id && line.customization == item.customization)
            {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .saturating_add(item.quantity)
                        .min(MAX_QUANTITY_PER_ITEM);
                    merged_lines += 1;
                }
                None => {
                    target.items.push(item);
                    appended_lines += 1;
                }
            }
        }
        target.refresh_total()?;
        target.updated_at = Utc::now();

        Ok(MergeOutcome {
            cart: target,
            merged_lines,
            appended_lines,
            reassigned: false,
        })
    }
}
