//! Tax policies.

use crate::error::CommerceError;
use crate::money::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where an order ships to, for tax purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jurisdiction {
    /// ISO country code (e.g. "US").
    pub country: String,
    /// State or region code (e.g. "CA").
    pub region: Option<String>,
}

impl Jurisdiction {
    pub fn new(country: impl Into<String>, region: Option<String>) -> Self {
        Self {
            country: country.into(),
            region,
        }
    }
}

/// Computes tax on a subtotal.
pub trait TaxPolicy: Send + Sync {
    /// Unrounded tax owed on `subtotal`.
    fn tax(&self, subtotal: &Money, jurisdiction: Option<&Jurisdiction>) -> Result<Money, CommerceError>;
}

/// One rate everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatRateTax {
    /// Fractional rate, 0.08 for 8%.
    pub rate: Decimal,
}

impl FlatRateTax {
    pub fn new(rate: Decimal) -> Self {
        Self { rate }
    }
}

impl TaxPolicy for FlatRateTax {
    fn tax(&self, subtotal: &Money, _jurisdiction: Option<&Jurisdiction>) -> Result<Money, CommerceError> {
        subtotal.apply_rate(self.rate)
    }
}

/// Per-region rates keyed by `"US-CA"` or `"US"`, with a fallback rate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionalTax {
    pub default_rate: Decimal,
    #[serde(default)]
    pub rates: HashMap<String, Decimal>,
}

impl RegionalTax {
    pub fn new(default_rate: Decimal) -> Self {
        Self {
            default_rate,
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, key: impl Into<String>, rate: Decimal) -> Self {
        self.rates.insert(key.into().to_uppercase(), rate);
        self
    }

    /// Most specific rate: country-region, then country, then the default.
    pub fn rate_for(&self, jurisdiction: Option<&Jurisdiction>) -> Decimal {
        let Some(j) = jurisdiction else {
            return self.default_rate;
        };
        let country = j.country.to_uppercase();
        j.region
            .as_ref()
            .and_then(|region| self.rates.get(&format!("{}-{}", country, region.to_uppercase())))
            .or_else(|| self.rates.get(&country))
            .copied()
            .unwrap_or(self.default_rate)
    }
}

impl TaxPolicy for RegionalTax {
    fn tax(&self, subtotal: &Money, jurisdiction: Option<&Jurisdiction>) -> Result<Money, CommerceError> {
        subtotal.apply_rate(self.rate_for(jurisdiction))
    }
}
