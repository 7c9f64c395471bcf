//! Candle customization, cart and checkout domain logic for Wick.
//!
//! Everything in this crate is synchronous and free of I/O:
//!
//! - **Catalog**: Products, customization options, compatibility rules, inventory
//! - **Customization**: Combination validation and surcharges
//! - **Pricing**: Unit prices, shipping rules, tax policies, order totals
//! - **Cart**: Cart aggregate and guest-to-user merge
//! - **Checkout**: Checkout state machine, orders, order lifecycle
//!
//! # Example
//!
//! ```rust
//! use wick_commerce::prelude::*;
//! use rust_decimal::Decimal;
//!
//! let product = Product::new("cozy-jar", "Cozy Jar", "cozy-jar", Money::from_minor(1599, Currency::USD))
//!     .with_inventory(InventoryLevel::new(10))
//!     .with_customization(
//!         CustomizationCatalog::new()
//!             .with_size(CustomizationOption::size("large", "Large", Decimal::new(200, 2), Some(60))),
//!     );
//!
//! let pricing = PricingEngine::default();
//! let mut cart = Cart::for_user(UserId::new("u1"), Currency::USD);
//! cart.add_item(&product, 2, CustomizationCombination::new().with_size("large"), &pricing)?;
//!
//! let totals = cart.totals(&pricing, None, &FlatRateTax::new(Decimal::new(8, 2)), None)?;
//! assert_eq!(totals.rounded().subtotal.display(), "$35.98");
//! # Ok::<(), CommerceError>(())
//! ```

pub mod error;
pub mod ids;
pub mod money;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod customization;
pub mod pricing;

pub use error::{CommerceError, FieldError};
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{CommerceError, FieldError};
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Catalog
    pub use crate::catalog::{
        CompatibilityRule, CompatibilityTable, CustomizationCatalog, CustomizationOption,
        InventoryLevel, OptionKind, Product, ProductQuery, ProductStatus, ScentIntensity,
    };

    // Customization
    pub use crate::customization::{
        CustomizationCombination, CustomizationValidator, InvalidReason, ValidationOutcome,
    };

    // Pricing
    pub use crate::pricing::{
        FlatRateTax, Jurisdiction, OrderTotals, PricingEngine, RegionalTax, ShippingKind,
        ShippingOption, TaxPolicy,
    };

    // Cart
    pub use crate::cart::{
        Cart, CartItem, CartItemUpdate, CartMergeResolver, CartOwner, MAX_QUANTITY_PER_ITEM,
    };

    // Checkout
    pub use crate::checkout::{
        Address, ChangeSource, CheckoutSession, CheckoutStep, Order, OrderItem, OrderStatus,
        PaymentAuthorization, PaymentEvent, PaymentEventKind, PaymentMethod, PaymentStatus,
        ShippingDetails, TransitionOutcome,
    };
}
