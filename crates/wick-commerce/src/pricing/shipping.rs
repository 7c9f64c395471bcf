//! Shipping option types.

use crate::ids::ShippingOptionId;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Service level of a shipping option. Only `Standard` qualifies for free shipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingKind {
    Standard,
    Express,
    Overnight,
}

impl ShippingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingKind::Standard => "standard",
            ShippingKind::Express => "express",
            ShippingKind::Overnight => "overnight",
        }
    }
}

/// A named shipping option offered at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    pub id: ShippingOptionId,
    /// Display name.
    pub name: String,
    pub kind: ShippingKind,
    /// Rate before any free-shipping rule.
    pub price: Money,
    #[serde(default)]
    pub min_delivery_days: Option<u32>,
    #[serde(default)]
    pub max_delivery_days: Option<u32>,
}

impl ShippingOption {
    pub fn new(
        id: impl Into<ShippingOptionId>,
        name: impl Into<String>,
        kind: ShippingKind,
        price: Money,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            price,
            min_delivery_days: None,
            max_delivery_days: None,
        }
    }

    pub fn with_delivery_days(mut self, min: u32, max: u32) -> Self {
        self.min_delivery_days = Some(min);
        self.max_delivery_days = Some(max);
        self
    }

    /// The storefront's stock options: standard, express and overnight.
    pub fn defaults(currency: Currency) -> Vec<ShippingOption> {
        vec![
            ShippingOption::new("standard", "Standard Shipping", ShippingKind::Standard, Money::from_minor(500, currency))
                .with_delivery_days(5, 7),
            ShippingOption::new("express", "Express Shipping", ShippingKind::Express, Money::from_minor(1299, currency))
                .with_delivery_days(2, 3),
            ShippingOption::new("overnight", "Overnight", ShippingKind::Overnight, Money::from_minor(2499, currency))
                .with_delivery_days(1, 1),
        ]
    }

    /// Get delivery estimate string.
    pub fn delivery_estimate(&self) -> Option<String> {
        match (self.min_delivery_days, self.max_delivery_days) {
            (Some(1), Some(1)) => Some("Next business day".to_string()),
            (Some(min), Some(max)) if min == max => Some(format!("{} business days", min)),
            (Some(min), Some(max)) => Some(format!("{}-{} business days", min, max)),
            (Some(min), None) => Some(format!("{}+ business days", min)),
            (None, Some(max)) => Some(format!("Up to {} business days", max)),
            (None, None) => None,
        }
    }

    pub fn is_standard(&self) -> bool {
        self.kind == ShippingKind::Standard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_estimate() {
        let options = ShippingOption::defaults(Currency::USD);
        assert_eq!(options[0].delivery_estimate(), Some("5-7 business days".to_string()));
        assert_eq!(options[2].delivery_estimate(), Some("Next business day".to_string()));
        assert!(options[0].is_standard());
        assert!(!options[1].is_standard());
    }
}
