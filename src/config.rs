//! Environment-driven configuration.

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use crate::pricing::PricingConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub nats_url: Option<String>,
    pub pricing: PricingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(v) => v.parse().context("PORT must be a number")?,
            Err(_) => 8083,
        };
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let nats_url = std::env::var("NATS_URL").ok();

        let mut pricing = PricingConfig::default();
        if let Some(rate) = decimal_env("TAX_RATE")? {
            pricing.tax_rate = rate;
        }
        if let Some(flat) = decimal_env("SHIPPING_FLAT_RATE")? {
            pricing.shipping_flat_rate = flat;
        }
        if let Some(threshold) = decimal_env("FREE_SHIPPING_THRESHOLD")? {
            pricing.free_shipping_threshold = threshold;
        }

        Ok(Self { port, database_url, nats_url, pricing })
    }
}

fn decimal_env(key: &str) -> Result<Option<Decimal>> {
    match std::env::var(key) {
        Ok(v) => {
            let parsed = v.parse().with_context(|| format!("{key} must be a decimal"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}
