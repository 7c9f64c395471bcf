use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use wick_commerce::cart::{Cart, CartItemUpdate, CartMergeResolver, CartOwner, LineIssue};
use wick_commerce::catalog::Product;
use wick_commerce::customization::CustomizationCombination;
use wick_commerce::ids::{CartItemId, GuestId, ProductId, UserId};
use wick_commerce::pricing::{OrderTotals, PricingEngine, TaxPolicy};
use wick_commerce::CommerceError;
use wick_store::{CartRepository, ProductRepository, StoreError};

use super::MAX_CONFLICT_RETRIES;

/// Body of `POST /cart/items`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub customization: CustomizationCombination,
}

fn default_quantity() -> i64 {
    1
}

/// A cart as shown to its owner, reconciled with the live catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    #[serde(flatten)]
    pub cart: Cart,
    pub item_count: i64,
    /// Totals before shipping, with tax estimated without an address.
    pub totals: OrderTotals,
    pub issues: Vec<LineIssue>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeView {
    pub cart: CartView,
    pub merged_lines: usize,
    pub appended_lines: usize,
}

/// Cart use cases. Every write is a versioned read-modify-write, retried
/// on conflict so concurrent increments are never lost.
#[derive(Clone)]
pub struct CartService {
    products: Arc<dyn ProductRepository>,
    carts: Arc<dyn CartRepository>,
    pricing: PricingEngine,
    tax: Arc<dyn TaxPolicy>,
    guest_ttl: Duration,
}

impl CartService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        carts: Arc<dyn CartRepository>,
        pricing: PricingEngine,
        tax: Arc<dyn TaxPolicy>,
        guest_ttl: Duration,
    ) -> Self {
        Self {
            products,
            carts,
            pricing,
            tax,
            guest_ttl,
        }
    }

    /// The owner's cart, created empty on first use.
    pub async fn get_or_create(&self, owner: &CartOwner) -> Result<Cart, CommerceError> {
        for _ in 0..MAX_CONFLICT_RETRIES {
            if let Some(cart) = self.carts.find_by_owner(owner).await? {
                return Ok(cart);
            }
            let cart = match owner {
                CartOwner::User(user_id) => Cart::for_user(user_id.clone(), self.pricing.currency),
                CartOwner::Guest(guest_id) => {
                    Cart::for_guest(guest_id.clone(), self.pricing.currency, self.guest_ttl)
                }
            };
            match self.carts.save(cart).await {
                Ok(cart) => {
                    tracing::debug!(cart_id = %cart.id, owner = %owner.key(), "cart created");
                    return Ok(cart);
                }
                // Another request created it first.
                Err(StoreError::Duplicate { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Conflict("could not create cart".to_string()))
    }

    pub async fn view(&self, owner: &CartOwner) -> Result<CartView, CommerceError> {
        let cart = self.get_or_create(owner).await?;
        self.present(cart).await
    }

    #[tracing::instrument(skip(self, request), fields(owner = %owner.key(), product_id = %request.product_id))]
    pub async fn add_item(&self, owner: &CartOwner, request: AddItem) -> Result<CartView, CommerceError> {
        let product = self
            .products
            .get(&request.product_id)
            .await?
            .filter(Product::is_active)
            .ok_or_else(|| CommerceError::not_found("product", &request.product_id))?;

        let cart = self
            .mutate(owner, "add_item", |cart| {
                cart.add_item(
                    &product,
                    request.quantity,
                    request.customization.clone(),
                    &self.pricing,
                )
                .map(|_| ())
            })
            .await?;
        tracing::info!(cart_id = %cart.id, quantity = request.quantity, "item added to cart");
        self.present(cart).await
    }

    pub async fn update_item(
        &self,
        owner: &CartOwner,
        item_id: &CartItemId,
        update: CartItemUpdate,
    ) -> Result<CartView, CommerceError> {
        let cart = self
            .mutate(owner, "update_item", |cart| {
                cart.update_item(item_id, update.clone())
            })
            .await?;
        self.present(cart).await
    }

    /// Removing an item that is not in the cart leaves it unchanged.
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        item_id: &CartItemId,
    ) -> Result<CartView, CommerceError> {
        let cart = self
            .mutate(owner, "remove_item", |cart| {
                cart.remove_item(item_id).map(|_| ())
            })
            .await?;
        self.present(cart).await
    }

    pub async fn clear(&self, owner: &CartOwner) -> Result<CartView, CommerceError> {
        let cart = self
            .mutate(owner, "clear", |cart| {
                cart.clear();
                Ok(())
            })
            .await?;
        self.present(cart).await
    }

    /// Fold a guest cart into the user's cart at login.
    ///
    /// Merging a guest cart that no longer exists returns the user's cart
    /// unchanged, so a retried login is harmless.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, guest_id = %guest_id))]
    pub async fn merge(&self, user_id: &UserId, guest_id: &GuestId) -> Result<MergeView, CommerceError> {
        let guest_owner = CartOwner::Guest(guest_id.clone());
        let user_owner = CartOwner::User(user_id.clone());

        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let Some(guest) = self.carts.find_by_owner(&guest_owner).await? else {
                let cart = self.get_or_create(&user_owner).await?;
                return Ok(MergeView {
                    cart: self.present(cart).await?,
                    merged_lines: 0,
                    appended_lines: 0,
                });
            };
            let guest_cart_id = guest.id.clone();
            let user_cart = self.carts.find_by_owner(&user_owner).await?;

            let outcome = CartMergeResolver::merge(guest, user_cart, user_id)?;
            let saved = if outcome.reassigned {
                self.carts.save(outcome.cart).await
            } else {
                self.carts.save_merged(outcome.cart, &guest_cart_id).await
            };
            match saved {
                Ok(cart) => {
                    tracing::info!(
                        cart_id = %cart.id,
                        merged = outcome.merged_lines,
                        appended = outcome.appended_lines,
                        reassigned = outcome.reassigned,
                        "guest cart merged"
                    );
                    return Ok(MergeView {
                        cart: self.present(cart).await?,
                        merged_lines: outcome.merged_lines,
                        appended_lines: outcome.appended_lines,
                    });
                }
                Err(e) if e.is_conflict() || matches!(e, StoreError::Duplicate { .. }) => {
                    tracing::debug!(attempt, "cart merge conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Conflict("cart merge kept conflicting".to_string()))
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, CommerceError> {
        Ok(self.carts.purge_expired(now).await?)
    }

    /// Load the owner's cart, apply `change` and save, retrying on version conflicts.
    async fn mutate<F>(&self, owner: &CartOwner, op: &'static str, mut change: F) -> Result<Cart, CommerceError>
    where
        F: FnMut(&mut Cart) -> Result<(), CommerceError> + Send,
    {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let mut cart = self.get_or_create(owner).await?;
            change(&mut cart)?;
            match self.carts.save(cart).await {
                Ok(saved) => return Ok(saved),
                Err(e) if e.is_conflict() => {
                    tracing::debug!(op, attempt, "cart write conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CommerceError::Conflict(format!("cart {op} kept conflicting")))
    }

    /// Products referenced by the cart's lines.
    pub(crate) async fn products_for(&self, cart: &Cart) -> Result<Vec<Product>, CommerceError> {
        let mut products: Vec<Product> = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            if products.iter().any(|p| p.id == item.product_id) {
                continue;
            }
            if let Some(product) = self.products.get(&item.product_id).await? {
                products.push(product);
            }
        }
        Ok(products)
    }

    async fn present(&self, mut cart: Cart) -> Result<CartView, CommerceError> {
        let products = self.products_for(&cart).await?;
        let report = cart.reprice(&products, &self.pricing)?;
        let totals = cart
            .totals(&self.pricing, None, self.tax.as_ref(), None)?
            .rounded();
        Ok(CartView {
            item_count: cart.item_count(),
            cart,
            totals,
            issues: report.issues,
        })
    }
}
