//! Process-wide settings, read once at startup.
use anyhow::Context;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

/// What happens to a reservation its requester cancels while still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// Keep the row, marked cancelled, with its full status history.
    #[default]
    Retain,
    /// Remove the row outright. Approved reservations are still kept.
    Delete,
}

impl FromStr for CancelPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(Self::Retain),
            "delete" => Ok(Self::Delete),
            other => Err(anyhow::anyhow!(
                "unknown cancel policy '{other}', expected 'retain' or 'delete'"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub db_path: PathBuf,
    /// Distance quoted when no geolocation collaborator is wired in.
    pub default_distance_km: Decimal,
    pub cancel_policy: CancelPolicy,
    pub log_level: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("farm-market.db"),
            default_distance_km: Decimal::from(150),
            cancel_policy: CancelPolicy::Retain,
            log_level: "info".into(),
        }
    }
}

impl MarketConfig {
    /// Defaults, overridden by `MARKET_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("MARKET_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Some(distance) = lookup("MARKET_DEFAULT_DISTANCE_KM") {
            let distance = Decimal::from_str(distance.trim())
                .with_context(|| format!("MARKET_DEFAULT_DISTANCE_KM='{distance}'"))?;
            anyhow::ensure!(
                distance >= Decimal::ZERO,
                "MARKET_DEFAULT_DISTANCE_KM must not be negative"
            );
            config.default_distance_km = distance;
        }

        if let Some(policy) = lookup("MARKET_CANCEL_POLICY") {
            config.cancel_policy = policy.parse()?;
        }

        if let Some(level) = lookup("MARKET_LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }
}
