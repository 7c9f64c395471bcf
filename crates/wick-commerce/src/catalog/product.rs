//! Candle product types.

use crate::catalog::{CustomizationCatalog, InventoryLevel};
use crate::ids::ProductId;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Product status in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Not visible to customers.
    Draft,
    #[default]
    Active,
    /// Hidden, data preserved for past orders.
    Archived,
}

/// A customizable candle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,
    pub name: String,
    /// URL-friendly slug (unique).
    pub slug: String,
    #[serde(default)]
    pub description: String,
    /// Merchandising category (e.g. "jar-candles").
    #[serde(default)]
    pub category: String,
    /// Image URLs, first is the primary image.
    #[serde(default)]
    pub images: Vec<String>,
    /// Price before any customization surcharge.
    pub base_price: Money,
    /// Scent, color and size options plus disallowed pairs.
    #[serde(default)]
    pub customization: CustomizationCatalog,
    #[serde(default)]
    pub inventory: InventoryLevel,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Create an active product with no options and no stock.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        slug: impl Into<String>,
        base_price: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            slug: slug.into(),
            description: String::new(),
            category: String::new(),
            images: Vec::new(),
            base_price,
            customization: CustomizationCatalog::default(),
            inventory: InventoryLevel::default(),
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_customization(mut self, customization: CustomizationCatalog) -> Self {
        self.customization = customization;
        self
    }

    pub fn with_inventory(mut self, inventory: InventoryLevel) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// Visible in the storefront.
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Active and with at least one unit in stock.
    pub fn is_purchasable(&self) -> bool {
        self.is_active() && self.inventory.is_available()
    }

    /// Active and able to cover `quantity` units.
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.is_active() && self.inventory.can_fulfill(quantity)
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}
