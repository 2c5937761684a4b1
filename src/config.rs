use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, TierError};

const DEFAULT_DATABASE_URL: &str = "sqlite:trusty_tier.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BACKFILL_INTERVAL_SECS: u64 = 300;
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub backfill_interval: Duration,
    pub broadcast_capacity: usize,
}

impl Config {
    /// Reads settings from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        Ok(Self {
            database_url,
            max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            backfill_interval: Duration::from_secs(parse_or(
                &lookup,
                "ANALYTICS_BACKFILL_INTERVAL_SECS",
                DEFAULT_BACKFILL_INTERVAL_SECS,
            )?),
            broadcast_capacity: parse_or(
                &lookup,
                "BROADCAST_CAPACITY",
                DEFAULT_BROADCAST_CAPACITY,
            )?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            backfill_interval: Duration::from_secs(DEFAULT_BACKFILL_INTERVAL_SECS),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| TierError::Validation(format!("{} is not a valid number: {}", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn falls_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, "sqlite:trusty_tier.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.backfill_interval, Duration::from_secs(300));
        assert_eq!(config.broadcast_capacity, 64);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DATABASE_MAX_CONNECTIONS", "1"),
            ("ANALYTICS_BACKFILL_INTERVAL_SECS", " 30 "),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.backfill_interval, Duration::from_secs(30));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let result = Config::from_lookup(lookup(&[("BROADCAST_CAPACITY", "lots")]));
        assert!(matches!(result, Err(TierError::Validation(_))));
    }
}
