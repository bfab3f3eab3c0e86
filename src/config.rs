//! Runtime configuration from the environment.

use std::env;
use std::net::SocketAddr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::value_objects::DiscountRate;
use crate::mail::Sender;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// In-memory store when absent.
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub currency: String,
    pub discount_rate: DiscountRate,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    /// Mail is only logged when absent.
    pub brevo_api_key: Option<String>,
    pub sender: Sender,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the config from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |var: &str, default: &str| get(var).unwrap_or_else(|| default.to_string());

        let port = or("PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::Invalid { var: "PORT", reason: e.to_string() })?;
        let discount_rate = or("DISCOUNT_RATE", "0.25")
            .parse::<Decimal>()
            .map_err(|e| e.to_string())
            .and_then(|rate| DiscountRate::new(rate).map_err(|e| e.to_string()))
            .map_err(|reason| ConfigError::Invalid { var: "DISCOUNT_RATE", reason })?;
        let currency = or("CURRENCY", "INR");
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid { var: "CURRENCY", reason: format!("{currency:?} is not an ISO 4217 code") });
        }

        let config = Self {
            host: or("HOST", "0.0.0.0"),
            port,
            database_url: get("DATABASE_URL"),
            nats_url: get("NATS_URL"),
            currency: currency.to_uppercase(),
            discount_rate,
            razorpay_key_id: or("RAZORPAY_KEY_ID", ""),
            razorpay_key_secret: or("RAZORPAY_KEY_SECRET", ""),
            brevo_api_key: get("BREVO_API_KEY"),
            sender: Sender { email: or("BREVO_SENDER_EMAIL", "no-reply@nextbuy.shop"), name: or("BREVO_SENDER_NAME", "NextBuy") },
        };
        if config.razorpay_key_secret.is_empty() {
            tracing::warn!("RAZORPAY_KEY_SECRET is not set, payment signatures will not verify");
        }
        tracing::info!(host = %config.host, port = config.port, persistent = config.database_url.is_some(), "configuration loaded");
        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid { var: "HOST", reason: e.to_string() })
    }
}
