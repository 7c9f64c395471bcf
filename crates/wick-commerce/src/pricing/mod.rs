//! Pricing: unit prices, shipping rules and tax.

mod engine;
mod shipping;
mod tax;

pub use engine::{OrderTotals, PricedLine, PricingEngine};
pub use shipping::{ShippingKind, ShippingOption};
pub use tax::{FlatRateTax, Jurisdiction, RegionalTax, TaxPolicy};
