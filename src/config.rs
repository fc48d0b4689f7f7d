//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `DATABASE_URL` - Postgres connection string; without it the in-memory store is used
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `PAGE_SIZE` - Products per catalog page (default: 12)
//! - `NATS_URL` - NATS server for domain events
//! - `PAYPAL_CLIENT_ID`, `PAYPAL_APP_SECRET` - enable PayPal
//! - `PAYPAL_API_URL` - PayPal API base (default: sandbox)
//! - `STRIPE_SECRET_KEY` - enables Stripe
//! - `STRIPE_WEBHOOK_SECRET` - enables the Stripe webhook endpoint

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;

use crate::catalog::PAGE_SIZE;
use crate::payment::paypal::SANDBOX_API_URL;

const DEFAULT_PORT: u16 = 8083;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    Invalid(String, String),
}

#[derive(Clone)]
pub struct PayPalConfig {
    pub api_url: String,
    pub client_id: String,
    pub secret: String,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub page_size: u32,
    pub nats_url: Option<String>,
    pub paypal: Option<PayPalConfig>,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let paypal = match (get("PAYPAL_CLIENT_ID"), get("PAYPAL_APP_SECRET")) {
            (Some(client_id), Some(secret)) => Some(PayPalConfig {
                api_url: get("PAYPAL_API_URL").unwrap_or_else(|| SANDBOX_API_URL.to_string()),
                client_id,
                secret,
            }),
            _ => None,
        };

        let page_size = parse_or(get("PAGE_SIZE"), "PAGE_SIZE", PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::Invalid("PAGE_SIZE".into(), "must be at least 1".into()));
        }

        Ok(Self {
            database_url: get("DATABASE_URL"),
            host: parse_or(get("HOST"), "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
            page_size,
            nats_url: get("NATS_URL"),
            paypal,
            stripe_secret_key: get("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid(key.to_string(), format!("{v:?}: {e}"))),
        None => Ok(default),
    }
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() { "[REDACTED]" } else { "unset" }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &redacted(&self.database_url))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("page_size", &self.page_size)
            .field("nats_url", &self.nats_url)
            .field("paypal", &self.paypal.as_ref().map(|p| &p.api_url))
            .field("stripe_secret_key", &redacted(&self.stripe_secret_key))
            .field("stripe_webhook_secret", &redacted(&self.stripe_webhook_secret))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.socket_addr().to_string(), "0.0.0.0:8083");
        assert_eq!(c.page_size, 12);
        assert!(c.database_url.is_none());
        assert!(c.paypal.is_none());
    }

    #[test]
    fn paypal_needs_both_credentials() {
        assert!(config(&[("PAYPAL_CLIENT_ID", "id")]).unwrap().paypal.is_none());
        let c = config(&[("PAYPAL_CLIENT_ID", "id"), ("PAYPAL_APP_SECRET", "s")]).unwrap();
        assert_eq!(c.paypal.unwrap().api_url, SANDBOX_API_URL);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(config(&[("PORT", "eighty")]), Err(ConfigError::Invalid(k, _)) if k == "PORT"));
        assert!(config(&[("PAGE_SIZE", "0")]).is_err());
        assert!(config(&[("HOST", "localhost")]).is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = config(&[("STRIPE_SECRET_KEY", "sk_live_abc"), ("DATABASE_URL", "postgres://u:pw@db/shop")]).unwrap();
        let dump = format!("{c:?}");
        assert!(!dump.contains("sk_live_abc"));
        assert!(!dump.contains("pw@db"));
    }
}
