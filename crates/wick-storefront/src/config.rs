//! Storefront configuration.
//!
//! Loaded from a TOML or JSON file (chosen by extension). Every field has a
//! default, so an empty file or no file at all yields a runnable dev config.
//! Command-line flags and environment variables override the file.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wick_commerce::ids::ShippingOptionId;
use wick_commerce::pricing::{
    FlatRateTax, PricingEngine, RegionalTax, ShippingKind, ShippingOption, TaxPolicy,
};
use wick_commerce::{Currency, Money};

use crate::telemetry::LogFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to parse JSON config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to seed catalog: {0}")]
    Seed(#[from] wick_commerce::CommerceError),
}

/// Top-level storefront configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub pricing: PricingConfig,

    #[serde(default)]
    pub payments: PaymentsConfig,

    #[serde(default)]
    pub carts: CartsConfig,

    #[serde(default)]
    pub checkout: CheckoutConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// JSON file of products loaded at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
}

impl StorefrontConfig {
    /// Load config from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line and environment overrides.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(host) = &overrides.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(token) = &overrides.admin_token {
            self.server.admin_token = Some(token.clone());
        }
        if let Some(secret) = &overrides.webhook_secret {
            self.payments.webhook_secret.clone_from(secret);
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
        if let Some(catalog) = &overrides.catalog {
            self.catalog_path = Some(catalog.clone());
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pricing.tax.has_negative_rate() {
            return Err(ConfigError::Invalid("tax rates must not be negative".into()));
        }
        if self.pricing.free_shipping_threshold.is_some_and(|t| t.is_sign_negative()) {
            return Err(ConfigError::Invalid(
                "free_shipping_threshold must not be negative".into(),
            ));
        }
        if self.payments.webhook_secret.is_empty() {
            return Err(ConfigError::Invalid("payments.webhook_secret is required".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for option in &self.pricing.shipping_options {
            if !seen.insert(option.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate shipping option id {}",
                    option.id
                )));
            }
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bad listen address: {e}")))
    }
}

/// Command-line flags that override the config file. Each also reads from the environment.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Address to bind
    #[arg(long, env = "WICK_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "WICK_PORT")]
    pub port: Option<u16>,

    /// Token required on admin routes
    #[arg(long, env = "WICK_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Shared secret for payment webhook signatures
    #[arg(long, env = "WICK_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Log output format
    #[arg(long, env = "WICK_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// Product seed file (JSON)
    #[arg(long, env = "WICK_CATALOG")]
    pub catalog: Option<PathBuf>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Admin routes are disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            admin_token: None,
        }
    }
}

/// Pricing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub currency: Currency,

    /// Standard shipping is free at or above this subtotal. Unset disables the rule.
    #[serde(default = "default_free_shipping_threshold")]
    pub free_shipping_threshold: Option<Decimal>,

    #[serde(default)]
    pub tax: TaxConfig,

    /// Falls back to the built-in standard, express and overnight options when empty.
    #[serde(default)]
    pub shipping_options: Vec<ShippingOptionConfig>,
}

fn default_free_shipping_threshold() -> Option<Decimal> {
    Some(Decimal::new(50, 0))
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            free_shipping_threshold: default_free_shipping_threshold(),
            tax: TaxConfig::default(),
            shipping_options: Vec::new(),
        }
    }
}

impl PricingConfig {
    pub fn engine(&self) -> PricingEngine {
        PricingEngine::new(
            self.currency,
            self.free_shipping_threshold
                .map(|amount| Money::new(amount, self.currency)),
        )
    }

    pub fn tax_policy(&self) -> Arc<dyn TaxPolicy> {
        self.tax.policy()
    }

    pub fn shipping_options(&self) -> Vec<ShippingOption> {
        if self.shipping_options.is_empty() {
            return ShippingOption::defaults(self.currency);
        }
        self.shipping_options
            .iter()
            .map(|option| option.build(self.currency))
            .collect()
    }
}

/// Tax policy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaxConfig {
    /// One rate everywhere.
    Flat { rate: Decimal },
    /// Per-region rates keyed by `"US-CA"` or `"US"`.
    Regional {
        default_rate: Decimal,
        #[serde(default)]
        rates: HashMap<String, Decimal>,
    },
}

impl Default for TaxConfig {
    fn default() -> Self {
        TaxConfig::Flat {
            rate: Decimal::new(8, 2),
        }
    }
}

impl TaxConfig {
    fn has_negative_rate(&self) -> bool {
        match self {
            TaxConfig::Flat { rate } => rate.is_sign_negative(),
            TaxConfig::Regional {
                default_rate,
                rates,
            } => default_rate.is_sign_negative() || rates.values().any(|r| r.is_sign_negative()),
        }
    }

    pub fn policy(&self) -> Arc<dyn TaxPolicy> {
        match self {
            TaxConfig::Flat { rate } => Arc::new(FlatRateTax::new(*rate)),
            TaxConfig::Regional {
                default_rate,
                rates,
            } => Arc::new(
                rates
                    .iter()
                    .fold(RegionalTax::new(*default_rate), |tax, (key, rate)| {
                        tax.with_rate(key.as_str(), *rate)
                    }),
            ),
        }
    }
}

/// A shipping option as written in config, priced in the store currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingOptionConfig {
    pub id: ShippingOptionId,
    pub name: String,
    pub kind: ShippingKind,
    pub price: Decimal,
    #[serde(default)]
    pub min_delivery_days: Option<u32>,
    #[serde(default)]
    pub max_delivery_days: Option<u32>,
}

impl ShippingOptionConfig {
    fn build(&self, currency: Currency) -> ShippingOption {
        let mut option = ShippingOption::new(
            self.id.clone(),
            self.name.clone(),
            self.kind,
            Money::new(self.price, currency),
        );
        option.min_delivery_days = self.min_delivery_days;
        option.max_delivery_days = self.max_delivery_days;
        option
    }
}

/// Payment gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    #[serde(default = "default_webhook_secret")]
    pub webhook_secret: String,

    /// Upper bound on any single gateway call.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts for read-only intent lookups.
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    /// First backoff delay; doubles on each retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: i64,
}

fn default_webhook_secret() -> String {
    "whsec_dev".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_read_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    200
}

fn default_webhook_tolerance_secs() -> i64 {
    300
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            webhook_secret: default_webhook_secret(),
            timeout_ms: default_timeout_ms(),
            read_retries: default_read_retries(),
            backoff_ms: default_backoff_ms(),
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
        }
    }
}

impl PaymentsConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.backoff_ms)
    }
}

/// Cart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartsConfig {
    /// Lifetime of an untouched guest cart.
    #[serde(default = "default_guest_ttl_hours")]
    pub guest_ttl_hours: i64,

    /// How often expired guest carts are swept. Zero disables the sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_guest_ttl_hours() -> i64 {
    24 * 7
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

impl Default for CartsConfig {
    fn default() -> Self {
        Self {
            guest_ttl_hours: default_guest_ttl_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CartsConfig {
    pub fn guest_ttl(&self) -> Duration {
        Duration::hours(self.guest_ttl_hours)
    }
}

/// Checkout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: i64,
}

fn default_session_ttl_minutes() -> i64 {
    60
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: default_session_ttl_minutes(),
        }
    }
}

impl CheckoutConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::minutes(self.session_ttl_minutes)
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "wick_storefront=info,wick_store=info,tower_http=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: StorefrontConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pricing.currency, Currency::USD);
        assert_eq!(config.pricing.free_shipping_threshold, Some(Decimal::new(50, 0)));
        assert_eq!(config.pricing.shipping_options().len(), 3);
        assert_eq!(config.checkout.session_ttl(), Duration::hours(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_sections() {
        let config: StorefrontConfig = toml::from_str(
            r#"
            catalog_path = "data/products.json"

            [server]
            port = 9000
            admin_token = "secret"

            [pricing]
            currency = "USD"
            free_shipping_threshold = "75"

            [pricing.tax]
            kind = "regional"
            default_rate = "0.05"
            rates = { "us-ca" = "0.0725" }

            [[pricing.shipping_options]]
            id = "pickup"
            name = "Local Pickup"
            kind = "standard"
            price = "0"

            [logging]
            format = "human"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.admin_token.as_deref(), Some("secret"));
        assert_eq!(config.logging.format, LogFormat::Human);
        assert_eq!(config.pricing.shipping_options().len(), 1);
        assert_eq!(
            config.catalog_path.as_deref(),
            Some(Path::new("data/products.json"))
        );

        let tax = config.pricing.tax_policy();
        let subtotal = Money::from_minor(10000, Currency::USD);
        let ca = wick_commerce::pricing::Jurisdiction::new("US", Some("CA".into()));
        assert_eq!(
            tax.tax(&subtotal, Some(&ca)).unwrap(),
            Money::from_minor(725, Currency::USD)
        );
        assert_eq!(
            tax.tax(&subtotal, None).unwrap(),
            Money::from_minor(500, Currency::USD)
        );
    }

    #[test]
    fn test_parse_json() {
        let config: StorefrontConfig =
            serde_json::from_str(r#"{"server": {"port": 3000}, "carts": {"guest_ttl_hours": 2}}"#)
                .unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.carts.guest_ttl(), Duration::hours(2));
    }

    #[test]
    fn test_overrides_win() {
        let overrides = ConfigOverrides {
            port: Some(4000),
            admin_token: Some("t0k".into()),
            ..Default::default()
        };
        let config = StorefrontConfig::default().with_overrides(&overrides).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.admin_token.as_deref(), Some("t0k"));
        assert_eq!(config.bind_addr().unwrap().port(), 4000);
    }

    #[test]
    fn test_rejects_negative_tax() {
        let mut config = StorefrontConfig::default();
        config.pricing.tax = TaxConfig::Flat {
            rate: Decimal::new(-1, 2),
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
