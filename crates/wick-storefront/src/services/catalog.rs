use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use wick_commerce::catalog::{CustomizationCatalog, Product, ProductPage, ProductQuery};
use wick_commerce::customization::{CustomizationCombination, CustomizationValidator};
use wick_commerce::ids::ProductId;
use wick_commerce::pricing::PricingEngine;
use wick_commerce::{CommerceError, Money};
use wick_store::ProductRepository;

use crate::config::ConfigError;

/// Answer to a customization check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationCheck {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Unit price with the selected options; the base price when invalid.
    pub price: Money,
}

/// Read side of the catalog.
#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn ProductRepository>,
    pricing: PricingEngine,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductRepository>, pricing: PricingEngine) -> Self {
        Self { products, pricing }
    }

    pub async fn list(&self, query: &ProductQuery) -> Result<ProductPage, CommerceError> {
        let products = self.products.list().await?;
        Ok(query.apply(products))
    }

    /// A product that customers can see. Drafts and archived products are not found.
    pub async fn get(&self, id: &ProductId) -> Result<Product, CommerceError> {
        self.products
            .get(id)
            .await?
            .filter(Product::is_active)
            .ok_or_else(|| CommerceError::not_found("product", id))
    }

    pub async fn customization_options(
        &self,
        id: &ProductId,
    ) -> Result<CustomizationCatalog, CommerceError> {
        Ok(self.get(id).await?.customization)
    }

    #[tracing::instrument(skip(self, combination), fields(product_id = %id))]
    pub async fn validate_customization(
        &self,
        id: &ProductId,
        combination: &CustomizationCombination,
    ) -> Result<CustomizationCheck, CommerceError> {
        let product = self.get(id).await?;
        let outcome = CustomizationValidator::validate(&product, combination);
        if !outcome.is_valid {
            return Ok(CustomizationCheck {
                is_valid: false,
                message: outcome.reason.map(|reason| reason.to_string()),
                price: product.base_price,
            });
        }
        Ok(CustomizationCheck {
            is_valid: true,
            message: None,
            price: self.pricing.unit_price(&product, combination)?.rounded(),
        })
    }

    /// Load products into the store.
    pub async fn seed(&self, products: Vec<Product>) -> Result<usize, CommerceError> {
        let mut seeded = 0;
        for product in products {
            product.customization.check()?;
            self.products.upsert(product).await?;
            seeded += 1;
        }
        Ok(seeded)
    }

    /// Load products from a JSON array on disk.
    pub async fn seed_from_file(&self, path: &Path) -> Result<usize, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let products: Vec<Product> =
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        let seeded = self.seed(products).await?;
        tracing::info!(seeded, path = %path.display(), "catalog seeded");
        Ok(seeded)
    }
}
