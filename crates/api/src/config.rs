//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::CartLimits;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs on in-memory stores
/// - `MAX_QUANTITY`, `MAX_CART_ITEMS`, `GUEST_CART_TTL_SECS`: cart limits
///
/// Unparseable or non-positive numeric values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub limits: CartLimits,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let positive = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
        };

        let limits = CartLimits {
            max_quantity: positive("MAX_QUANTITY")
                .and_then(|v| i64::try_from(v).ok())
                .unwrap_or(defaults.limits.max_quantity),
            max_cart_items: positive("MAX_CART_ITEMS")
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.limits.max_cart_items),
            guest_cart_ttl: positive("GUEST_CART_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.limits.guest_cart_ttl),
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            limits,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            limits: CartLimits::default(),
        }
    }
}
