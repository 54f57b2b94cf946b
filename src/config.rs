use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL, e.g. `sqlite:energy.db?mode=rwc`
    pub database_url: String,
    pub tuya_client_id: String,
    pub tuya_client_secret: String,
    pub tuya_base_url: String,
    /// The single smart plug this service monitors
    pub tuya_device_id: String,
    pub server_host: String,
    pub server_port: u16,
    /// Collection cadence in seconds. Every downstream aggregate is derived
    /// from samples taken at this interval, so it fixes the granularity of
    /// the usage integration.
    pub poll_interval_secs: u64,
    /// Flat tariff applied to all cost estimates, currency units per kWh
    pub unit_price_per_kwh: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: optional("DATABASE_URL", "sqlite:energy.db?mode=rwc"),
            tuya_client_id: required("TUYA_CLIENT_ID")?,
            tuya_client_secret: required("TUYA_CLIENT_SECRET")?,
            tuya_base_url: required("TUYA_BASE_URL")?,
            tuya_device_id: required("TUYA_DEVICE_ID")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "3000")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            poll_interval_secs: optional("POLL_INTERVAL_SECS", "1")
                .parse()
                .context("POLL_INTERVAL_SECS must be a positive integer")?,
            unit_price_per_kwh: optional("UNIT_PRICE_PER_KWH", "0.12")
                .parse()
                .context("UNIT_PRICE_PER_KWH must be a number")?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
