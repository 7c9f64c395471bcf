//! Composition root.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use wick_store::MemoryStore;

use crate::config::{ConfigError, StorefrontConfig};
use crate::gateway::webhook::WebhookVerifier;
use crate::gateway::{PaymentGateway, SandboxGateway, TimedGateway};
use crate::notify::{LogNotifier, Notifier};
use crate::services::{
    spawn_sweeper, CartService, CatalogService, CheckoutDeps, CheckoutService, OrderService,
};

/// Everything a request handler needs. Cloned into every axum handler as state.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<StorefrontConfig>,
    pub catalog: CatalogService,
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub webhooks: WebhookVerifier,
    store: Arc<MemoryStore>,
}

impl AppContext {
    /// Wire services over `store`, `gateway` and `notifier`.
    pub fn new(
        config: StorefrontConfig,
        store: Arc<MemoryStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let pricing = config.pricing.engine();
        let tax = config.pricing.tax_policy();

        let catalog = CatalogService::new(store.clone(), pricing.clone());
        let carts = CartService::new(
            store.clone(),
            store.clone(),
            pricing.clone(),
            tax.clone(),
            config.carts.guest_ttl(),
        );
        let orders = OrderService::new(store.clone());
        let checkout = CheckoutService::new(CheckoutDeps {
            carts: carts.clone(),
            products: store.clone(),
            cart_store: store.clone(),
            sessions: store.clone(),
            order_store: store.clone(),
            orders: orders.clone(),
            gateway,
            notifier,
            pricing,
            tax,
            shipping_options: config.pricing.shipping_options(),
            session_ttl: config.checkout.session_ttl(),
        });
        let webhooks = WebhookVerifier::new(
            &config.payments.webhook_secret,
            config.payments.webhook_tolerance_secs,
        );

        Self {
            config: Arc::new(config),
            catalog,
            carts,
            checkout,
            orders,
            webhooks,
            store,
        }
    }

    /// In-memory store, sandbox gateway behind timeouts, and log notifications.
    pub fn from_config(config: StorefrontConfig) -> Self {
        let gateway = TimedGateway::from_config(Arc::new(SandboxGateway::new()), &config.payments);
        Self::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(gateway),
            Arc::new(LogNotifier),
        )
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Load the configured product seed file, if any.
    pub async fn seed_catalog(&self) -> Result<usize, ConfigError> {
        match &self.config.catalog_path {
            Some(path) => self.catalog.seed_from_file(path).await,
            None => {
                tracing::warn!("no catalog_path configured; starting with an empty catalog");
                Ok(0)
            }
        }
    }

    /// Start the periodic purge of expired guest carts and checkouts.
    /// Returns `None` when the sweep interval is zero.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        let every = self.config.carts.sweep_interval_secs;
        if every == 0 {
            tracing::info!("expiry sweeper disabled");
            return None;
        }
        Some(spawn_sweeper(
            self.store.clone(),
            self.store.clone(),
            Duration::from_secs(every),
        ))
    }
}
