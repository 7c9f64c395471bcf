//! Product catalog module.
//!
//! Contains types for candle products, their customization options, inventory and listing.

mod inventory;
mod listing;
mod options;
mod product;

pub use inventory::InventoryLevel;
pub use listing::{ProductPage, ProductQuery, ProductSort};
pub use options::{
    CompatibilityRule, CompatibilityTable, CustomizationCatalog, CustomizationOption,
    IncompatiblePair, OptionAttributes, OptionDetails, OptionKind, ScentIntensity,
};
pub use product::{Product, ProductStatus};
