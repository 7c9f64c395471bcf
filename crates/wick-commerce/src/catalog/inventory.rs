//! Inventory tracking types.

use serde::{Deserialize, Serialize};

/// Stock level for a candle product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLevel {
    /// Units on hand.
    pub quantity: i64,
    /// Quantity at or below which stock counts as low.
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
    /// Merchandising switch; false hides the product from purchase even with units on hand.
    #[serde(default = "default_in_stock")]
    pub is_in_stock: bool,
}

fn default_in_stock() -> bool {
    true
}

impl Default for InventoryLevel {
    fn default() -> Self {
        Self::new(0)
    }
}

impl InventoryLevel {
    pub fn new(quantity: i64) -> Self {
        Self {
            quantity,
            low_stock_threshold: None,
            is_in_stock: true,
        }
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = Some(threshold);
        self
    }

    /// Whether at least one unit can be sold.
    pub fn is_available(&self) -> bool {
        self.is_in_stock && self.quantity > 0
    }

    /// Whether `quantity` units can be sold.
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.is_in_stock && quantity > 0 && self.quantity >= quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.low_stock_threshold
            .map(|threshold| self.quantity <= threshold)
            .unwrap_or(false)
    }

    /// Take `quantity` units off hand. Returns false and leaves stock untouched
    /// when there are not enough units.
    pub fn decrement(&mut self, quantity: i64) -> bool {
        if !self.can_fulfill(quantity) {
            return false;
        }
        self.quantity -= quantity;
        true
    }

    pub fn restock(&mut self, quantity: i64) {
        self.quantity += quantity.max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_availability() {
        let inv = InventoryLevel::new(10);
        assert!(inv.is_available());
        assert!(inv.can_fulfill(10));
        assert!(!inv.can_fulfill(11));
        assert!(!inv.can_fulfill(0));
    }

    #[test]
    fn test_flagged_out_of_stock() {
        let mut inv = InventoryLevel::new(10);
        inv.is_in_stock = false;
        assert!(!inv.is_available());
        assert!(!inv.can_fulfill(1));
    }

    #[test]
    fn test_decrement_is_all_or_nothing() {
        let mut inv = InventoryLevel::new(3);
        assert!(!inv.decrement(4));
        assert_eq!(inv.quantity, 3);
        assert!(inv.decrement(3));
        assert_eq!(inv.quantity, 0);
        assert!(!inv.is_available());
    }

    #[test]
    fn test_low_stock() {
        let mut inv = InventoryLevel::new(5).with_low_stock_threshold(10);
        assert!(inv.is_low_stock());

        inv.restock(10);
        assert!(!inv.is_low_stock());
    }
}
