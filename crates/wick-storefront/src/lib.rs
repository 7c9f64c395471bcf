//! HTTP storefront for Wick.
//!
//! Wires the domain crate and the store into request-scoped services and
//! serves them over axum:
//!
//! - **config**: TOML/JSON configuration with CLI and environment overrides
//! - **gateway**: Payment gateway port, timeouts, sandbox and webhook signatures
//! - **services**: Catalog, cart, checkout and order use cases
//! - **api**: Routes, identity extractors and error rendering

pub mod api;
pub mod config;
pub mod context;
pub mod gateway;
pub mod notify;
pub mod services;
pub mod telemetry;

pub use config::{ConfigError, ConfigOverrides, StorefrontConfig};
pub use context::AppContext;

#[cfg(test)]
pub(crate) mod testing {
    use std::ops::Deref;
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use wick_commerce::cart::CartOwner;
    use wick_commerce::catalog::{
        CustomizationCatalog, CustomizationOption, InventoryLevel, Product, ScentIntensity,
    };
    use wick_commerce::checkout::{
        Address, NewOrder, Order, OrderItem, PaymentDetails, PaymentMethod, PaymentStatus,
        ShippingDetails,
    };
    use wick_commerce::customization::CustomizationCombination;
    use wick_commerce::ids::{CheckoutId, PaymentIntentId, ProductId, ShippingOptionId, UserId};
    use wick_commerce::pricing::{OrderTotals, ShippingOption};
    use wick_commerce::{Currency, Money};
    use wick_store::MemoryStore;

    use crate::config::StorefrontConfig;
    use crate::context::AppContext;
    use crate::gateway::{SandboxGateway, TimedGateway};
    use crate::notify::LogNotifier;
    use crate::services::AddItem;

    pub const COZY_JAR: &str = "cozy-jar";
    pub const COZY_JAR_STOCK: i64 = 20;
    pub const ADMIN_TOKEN: &str = "admin-secret";

    /// $15.99 jar with a +$2.00 large size; sea salt and charcoal clash.
    pub fn cozy_jar() -> Product {
        Product::new(COZY_JAR, "Cozy Jar", "cozy-jar", Money::from_minor(1599, Currency::USD))
            .with_inventory(InventoryLevel::new(COZY_JAR_STOCK))
            .with_images(vec!["https://cdn.wick.test/cozy-jar.jpg".to_string()])
            .with_customization(
                CustomizationCatalog::new()
                    .with_scent(CustomizationOption::scent(
                        "vanilla",
                        "Vanilla Bean",
                        Decimal::ZERO,
                        ScentIntensity::Medium,
                    ))
                    .with_scent(CustomizationOption::scent(
                        "sea-salt",
                        "Sea Salt",
                        Decimal::new(100, 2),
                        ScentIntensity::Light,
                    ))
                    .with_color(CustomizationOption::color("ivory", "Ivory", Decimal::ZERO, "#FFFFF0"))
                    .with_color(CustomizationOption::color(
                        "charcoal",
                        "Charcoal",
                        Decimal::new(50, 2),
                        "#36454F",
                    ))
                    .with_size(CustomizationOption::size("regular", "Regular", Decimal::ZERO, Some(40)))
                    .with_size(CustomizationOption::size("large", "Large", Decimal::new(200, 2), Some(60)))
                    .with_incompatible("sea-salt", "charcoal"),
            )
    }

    pub fn address() -> Address {
        Address {
            first_name: "Ada".into(),
            last_name: "Wick".into(),
            street: "12 Ember Lane".into(),
            apartment: None,
            city: "Portland".into(),
            state: "OR".into(),
            postal_code: "97201".into(),
            country: "US".into(),
            phone: None,
        }
    }

    pub fn shipping_details(option: &str) -> ShippingDetails {
        ShippingDetails {
            email: "ada@wick.test".into(),
            shipping_address: address(),
            billing_address: None,
            same_as_shipping: true,
            shipping_option_id: ShippingOptionId::new(option),
        }
    }

    /// A pending order for two large Cozy Jars, paid through `pi_test`.
    pub fn placed_order() -> Order {
        let usd = |minor| Money::from_minor(minor, Currency::USD);
        let size = CustomizationCombination::new().with_size("large");
        Order::place(NewOrder {
            order_number: "WK-20261016-000001".into(),
            checkout_id: CheckoutId::new("co_test"),
            user_id: Some(UserId::new("u1")),
            email: "ada@wick.test".into(),
            items: vec![OrderItem {
                product_id: ProductId::new(COZY_JAR),
                name: "Cozy Jar".into(),
                images: Vec::new(),
                unit_price: usd(1799),
                customization: size,
                customization_labels: vec!["Size: Large".into()],
                quantity: 2,
                line_total: usd(3598),
            }],
            shipping_address: address(),
            billing_address: address(),
            shipping_option: ShippingOption::defaults(Currency::USD).remove(0),
            payment: PaymentDetails {
                method: PaymentMethod::Card,
                transaction_id: PaymentIntentId::new("pi_test"),
                status: PaymentStatus::Authorized,
                failure_reason: None,
            },
            totals: OrderTotals {
                subtotal: usd(3598),
                tax: usd(288),
                shipping: usd(500),
                total: usd(4386),
            },
        })
    }

    /// An [`AppContext`] over a fresh store with the sandbox gateway exposed.
    pub struct TestContext {
        pub app: AppContext,
        pub gateway: Arc<SandboxGateway>,
    }

    impl Deref for TestContext {
        type Target = AppContext;

        fn deref(&self) -> &AppContext {
            &self.app
        }
    }

    pub async fn context() -> TestContext {
        let mut config = StorefrontConfig::default();
        config.server.admin_token = Some(ADMIN_TOKEN.to_string());
        let gateway = Arc::new(SandboxGateway::new());
        let timed = TimedGateway::from_config(gateway.clone(), &config.payments);
        let app = AppContext::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(timed),
            Arc::new(LogNotifier),
        );
        app.catalog.seed(vec![cozy_jar()]).await.unwrap();
        TestContext { app, gateway }
    }

    /// Put `quantity` large Cozy Jars in the owner's cart.
    pub async fn fill_cart(ctx: &TestContext, owner: &CartOwner, quantity: i64) {
        ctx.carts
            .add_item(
                owner,
                AddItem {
                    product_id: ProductId::new(COZY_JAR),
                    quantity,
                    customization: CustomizationCombination::new().with_size("large"),
                },
            )
            .await
            .unwrap();
    }
}
