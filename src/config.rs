use crate::domain::Money;
use crate::engine::windows::{AUCTION_WINDOW_MS, OFFER_WINDOW_MS};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Purchase window length; defaults to the canonical 48h.
    pub auction_window_ms: i64,
    /// Offer/selection window length after auction end; defaults to 24h.
    pub offer_window_ms: i64,
    pub sweep_interval_ms: u64,
    /// Flat fee charged per lead unlock.
    pub lead_price: Money,
    /// Commission rate applied to an accepted offer's amount.
    pub commission_rate: Money,
    /// Optional collaborator endpoint for event notifications.
    pub webhook_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let auction_window_ms = parse_positive_i64(
            &env_map,
            "AUCTION_WINDOW_MS",
            &AUCTION_WINDOW_MS.to_string(),
        )?;
        let offer_window_ms =
            parse_positive_i64(&env_map, "OFFER_WINDOW_MS", &OFFER_WINDOW_MS.to_string())?;

        let sweep_interval_ms = env_map
            .get("SWEEP_INTERVAL_MS")
            .map(|s| s.as_str())
            .unwrap_or("300000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "SWEEP_INTERVAL_MS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let lead_price = parse_money(&env_map, "LEAD_PRICE", "250.00")?;
        if lead_price.is_negative() {
            return Err(ConfigError::InvalidValue(
                "LEAD_PRICE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let commission_rate = parse_money(&env_map, "COMMISSION_RATE", "0.02")?;
        if commission_rate.is_negative() {
            return Err(ConfigError::InvalidValue(
                "COMMISSION_RATE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let webhook_url = env_map
            .get("WEBHOOK_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Config {
            port,
            database_path,
            auction_window_ms,
            offer_window_ms,
            sweep_interval_ms,
            lead_price,
            commission_rate,
            webhook_url,
        })
    }

    /// Canonical-window config over a test database.
    #[cfg(test)]
    pub fn for_tests(database_path: String) -> Self {
        Config {
            port: 0,
            database_path,
            auction_window_ms: AUCTION_WINDOW_MS,
            offer_window_ms: OFFER_WINDOW_MS,
            sweep_interval_ms: 300_000,
            lead_price: Money::from_str("250").expect("valid test price"),
            commission_rate: Money::from_str("0.02").expect("valid test rate"),
            webhook_url: None,
        }
    }
}

fn parse_positive_i64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<i64, ConfigError> {
    let value = env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<i64>()
        .map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid i64".to_string())
        })?;

    if value <= 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be positive".to_string(),
        ));
    }
    Ok(value)
}

fn parse_money(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Money, ConfigError> {
    Money::from_str(env_map.get(key).map(|s| s.as_str()).unwrap_or(default)).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a valid decimal".to_string())
    })
}
