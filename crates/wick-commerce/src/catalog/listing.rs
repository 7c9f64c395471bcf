//! Storefront product listing: filters, sort and pagination.

use crate::catalog::Product;
use serde::{Deserialize, Serialize};

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// Catalog order.
    #[default]
    Featured,
    PriceAsc,
    PriceDesc,
    NameAsc,
    Newest,
}

/// Filters for the storefront product list. Only active products are ever listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductQuery {
    pub category: Option<String>,
    pub in_stock_only: bool,
    pub sort: ProductSort,
    /// 1-indexed.
    pub page: usize,
    pub per_page: usize,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            category: None,
            in_stock_only: false,
            sort: ProductSort::Featured,
            page: 1,
            per_page: 24,
        }
    }
}

impl ProductQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_sort(mut self, sort: ProductSort) -> Self {
        self.sort = sort;
        self
    }

    /// Set pagination, clamping to sane bounds.
    pub fn with_pagination(mut self, page: usize, per_page: usize) -> Self {
        self.page = page.max(1);
        self.per_page = per_page.clamp(1, 100);
        self
    }

    fn matches(&self, product: &Product) -> bool {
        product.is_active()
            && self
                .category
                .as_deref()
                .map(|c| product.category.eq_ignore_ascii_case(c))
                .unwrap_or(true)
            && (!self.in_stock_only || product.is_purchasable())
    }

    /// Filter, sort and page `products`.
    pub fn apply(&self, products: Vec<Product>) -> ProductPage {
        let mut matched: Vec<Product> = products.into_iter().filter(|p| self.matches(p)).collect();
        match self.sort {
            ProductSort::Featured => {}
            ProductSort::PriceAsc => matched.sort_by(|a, b| a.base_price.amount.cmp(&b.base_price.amount)),
            ProductSort::PriceDesc => matched.sort_by(|a, b| b.base_price.amount.cmp(&a.base_price.amount)),
            ProductSort::NameAsc => matched.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
            ProductSort::Newest => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        let page = self.page.max(1);
        let per_page = self.per_page.clamp(1, 100);
        let total = matched.len();
        let items = matched
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();
        ProductPage {
            items,
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page).max(1),
        }
    }
}

/// One page of listed products.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl ProductPage {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InventoryLevel, ProductStatus};
    use crate::money::{Currency, Money};

    fn product(id: &str, minor: i64, category: &str, stock: i64) -> Product {
        let mut p = Product::new(id, id, id, Money::from_minor(minor, Currency::USD))
            .with_inventory(InventoryLevel::new(stock));
        p.category = category.to_string();
        p
    }

    fn catalog() -> Vec<Product> {
        let mut draft = product("draft", 100, "jar", 5);
        draft.status = ProductStatus::Draft;
        vec![
            product("b", 2500, "jar", 5),
            product("a", 1500, "pillar", 0),
            product("c", 1999, "jar", 2),
            draft,
        ]
    }

    #[test]
    fn test_hides_inactive_products() {
        let page = ProductQuery::new().apply(catalog());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_category_and_stock_filters() {
        let mut query = ProductQuery::new().with_category("JAR");
        query.in_stock_only = true;
        let page = query.apply(catalog());
        let ids: Vec<_> = page.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_sort_and_paginate() {
        let page = ProductQuery::new()
            .with_sort(ProductSort::PriceAsc)
            .with_pagination(2, 2)
            .apply(catalog());
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id.as_str(), "b");
        assert!(!page.has_next());
    }
}
