//! Runtime configuration from the environment

use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::aggregates::ShippingPolicy;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub port: u16,
    /// `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub nats_url: Option<String>,
    pub cart_dir: PathBuf,
    pub currency: String,
    pub shipping_fee: Decimal,
    pub free_shipping_threshold: Decimal,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            database_url: None,
            max_connections: 10,
            nats_url: None,
            cart_dir: PathBuf::from("./carts"),
            currency: "NPR".to_string(),
            shipping_fee: Decimal::from(100),
            free_shipping_threshold: Decimal::from(2000),
        }
    }
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Ok(Self {
            port: parse(&var, "PORT")?.unwrap_or(defaults.port),
            database_url: var("DATABASE_URL"),
            max_connections: parse(&var, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(defaults.max_connections),
            nats_url: var("NATS_URL"),
            cart_dir: var("CART_DIR").map(PathBuf::from).unwrap_or(defaults.cart_dir),
            currency: var("STORE_CURRENCY").map(|c| c.to_uppercase()).unwrap_or(defaults.currency),
            shipping_fee: parse(&var, "SHIPPING_FEE")?.unwrap_or(defaults.shipping_fee),
            free_shipping_threshold: parse(&var, "FREE_SHIPPING_THRESHOLD")?.unwrap_or(defaults.free_shipping_threshold),
        })
    }

    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy {
            flat_fee: Money::new(self.shipping_fee, &self.currency),
            free_threshold: Money::new(self.free_shipping_threshold, &self.currency),
        }
    }
}

fn parse<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError> {
    var(key)
        .map(|raw| raw.parse::<T>().map_err(|_| ConfigError::Invalid { key, value: raw }))
        .transpose()
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])), Ok(Config::default()));
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("STORE_CURRENCY", "usd"),
            ("SHIPPING_FEE", "5.50"),
            ("DATABASE_URL", "postgres://localhost/glow"),
            ("NATS_URL", "  "),
        ]));
        let config = config.unwrap_or_default();
        assert_eq!(config.port, 9000);
        assert_eq!(config.currency, "USD");
        assert_eq!(config.shipping_fee, Decimal::new(550, 2));
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/glow"));
        assert_eq!(config.nats_url, None);
        assert_eq!(config.shipping_policy().flat_fee.currency(), "USD");
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[("FREE_SHIPPING_THRESHOLD", "lots")]));
        assert_eq!(err, Err(ConfigError::Invalid { key: "FREE_SHIPPING_THRESHOLD", value: "lots".into() }));
    }
}
