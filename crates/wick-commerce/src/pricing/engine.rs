//! Unit prices, line totals and order totals.

use super::{Jurisdiction, ShippingOption, TaxPolicy};
use crate::catalog::Product;
use crate::customization::{CustomizationCombination, CustomizationValidator};
use crate::error::CommerceError;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Anything with a unit price and a quantity.
pub trait PricedLine {
    fn unit_price(&self) -> &Money;
    fn quantity(&self) -> i64;
}

/// Subtotal, tax, shipping and total.
///
/// Values coming out of [`PricingEngine::order_totals`] keep full precision;
/// [`OrderTotals::rounded`] is what gets stored and shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

impl OrderTotals {
    pub fn zero(currency: Currency) -> Self {
        Self {
            subtotal: Money::zero(currency),
            tax: Money::zero(currency),
            shipping: Money::zero(currency),
            total: Money::zero(currency),
        }
    }

    /// Each component rounded half-up to the currency's minor unit.
    pub fn rounded(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal.rounded(),
            tax: self.tax.rounded(),
            shipping: self.shipping.rounded(),
            total: self.total.rounded(),
        }
    }
}

/// Pricing rules shared by carts and checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingEngine {
    pub currency: Currency,
    /// Standard shipping is free at or above this subtotal. `None` disables the rule.
    pub free_shipping_threshold: Option<Money>,
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(Currency::USD, Some(Money::from_minor(5000, Currency::USD)))
    }
}

impl PricingEngine {
    pub fn new(currency: Currency, free_shipping_threshold: Option<Money>) -> Self {
        Self {
            currency,
            free_shipping_threshold,
        }
    }

    /// Base price plus the combination's surcharge.
    pub fn unit_price(
        &self,
        product: &Product,
        combination: &CustomizationCombination,
    ) -> Result<Money, CommerceError> {
        if product.base_price.currency != self.currency {
            return Err(CommerceError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                got: product.base_price.currency.code().to_string(),
            });
        }
        let additional = CustomizationValidator::require_valid(product, combination)?;
        product.base_price.plus_amount(additional)
    }

    pub fn line_total<L: PricedLine + ?Sized>(&self, line: &L) -> Result<Money, CommerceError> {
        line.unit_price().try_multiply(line.quantity())
    }

    /// Shipping charge for `option` given the order subtotal.
    pub fn shipping_cost(&self, option: &ShippingOption, subtotal: &Money) -> Result<Money, CommerceError> {
        if option.is_standard() {
            if let Some(threshold) = &self.free_shipping_threshold {
                if subtotal.try_ge(threshold)? {
                    return Ok(Money::zero(self.currency));
                }
            }
        }
        Ok(option.price)
    }

    /// Totals for a set of lines. Without a shipping option, shipping is zero.
    pub fn order_totals<L: PricedLine>(
        &self,
        lines: &[L],
        shipping_option: Option<&ShippingOption>,
        tax_policy: &dyn TaxPolicy,
        jurisdiction: Option<&Jurisdiction>,
    ) -> Result<OrderTotals, CommerceError> {
        let subtotal = lines.iter().try_fold(Money::zero(self.currency), |acc, line| {
            acc.try_add(&self.line_total(line)?)
        })?;
        let shipping = match shipping_option {
            Some(option) => self.shipping_cost(option, &subtotal)?,
            None => Money::zero(self.currency),
        };
        let tax = tax_policy.tax(&subtotal, jurisdiction)?;
        let total = subtotal.try_add(&tax)?.try_add(&shipping)?;
        Ok(OrderTotals {
            subtotal,
            tax,
            shipping,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CustomizationCatalog, CustomizationOption};
    use crate::pricing::{FlatRateTax, ShippingKind};
    use rust_decimal::Decimal;

    struct Line(Money, i64);

    impl PricedLine for Line {
        fn unit_price(&self) -> &Money {
            &self.0
        }
        fn quantity(&self) -> i64 {
            self.1
        }
    }

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    fn standard() -> ShippingOption {
        ShippingOption::new("standard", "Standard", ShippingKind::Standard, usd(500))
    }

    fn express() -> ShippingOption {
        ShippingOption::new("express", "Express", ShippingKind::Express, usd(1299))
    }

    fn tax() -> FlatRateTax {
        FlatRateTax::new(Decimal::new(8, 2))
    }

    #[test]
    fn test_unit_price_adds_surcharge() {
        let product = Product::new("p1", "Cozy Jar", "cozy-jar", usd(1599)).with_customization(
            CustomizationCatalog::new()
                .with_size(CustomizationOption::size("large", "Large", Decimal::new(200, 2), None)),
        );
        let engine = PricingEngine::default();
        let combo = CustomizationCombination::new().with_size("large");
        assert_eq!(engine.unit_price(&product, &combo).unwrap(), usd(1799));
        // Deterministic.
        assert_eq!(engine.unit_price(&product, &combo).unwrap(), usd(1799));

        let bad = CustomizationCombination::new().with_size("huge");
        assert!(matches!(
            engine.unit_price(&product, &bad),
            Err(CommerceError::Validation { .. })
        ));
    }

    #[test]
    fn test_worked_example_totals() {
        let engine = PricingEngine::default();
        let totals = engine
            .order_totals(&[Line(usd(1799), 2)], Some(&standard()), &tax(), None)
            .unwrap();
        assert_eq!(totals.subtotal, usd(3598));
        assert_eq!(totals.shipping, usd(500));
        assert_eq!(totals.tax.amount, Decimal::new(28784, 4));

        let rounded = totals.rounded();
        assert_eq!(rounded.tax, usd(288));
        assert_eq!(rounded.total, usd(4386));
    }

    #[test]
    fn test_free_standard_shipping_at_threshold() {
        let engine = PricingEngine::default();
        let at = engine
            .order_totals(&[Line(usd(5000), 1)], Some(&standard()), &tax(), None)
            .unwrap();
        assert!(at.shipping.is_zero());

        let below = engine
            .order_totals(&[Line(usd(4999), 1)], Some(&standard()), &tax(), None)
            .unwrap();
        assert_eq!(below.shipping, usd(500));
    }

    #[test]
    fn test_express_stays_chargeable_above_threshold() {
        let engine = PricingEngine::default();
        let totals = engine
            .order_totals(&[Line(usd(9000), 1)], Some(&express()), &tax(), None)
            .unwrap();
        assert_eq!(totals.shipping, usd(1299));
    }

    #[test]
    fn test_no_shipping_option_means_zero_shipping() {
        let engine = PricingEngine::default();
        let totals = engine
            .order_totals::<Line>(&[], None, &tax(), None)
            .unwrap();
        assert_eq!(totals, OrderTotals::zero(Currency::USD));
    }
}
