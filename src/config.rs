use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("PRICE_COINS must list at least one coin id")]
    NoCoins,
}

/// Runtime configuration, read from the environment (and `.env` if present)
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub coingecko_base_url: String,
    pub open_meteo_base_url: String,
    pub coins: Vec<String>,
    pub vs_currency: String,
    pub latitude: f64,
    pub longitude: f64,
    pub session_idle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            coingecko_base_url: "https://api.coingecko.com/api/v3".to_string(),
            open_meteo_base_url: "https://api.open-meteo.com/v1".to_string(),
            coins: vec!["bitcoin".to_string(), "ethereum".to_string()],
            vs_currency: "usd".to_string(),
            // Denver
            latitude: 39.7392,
            longitude: -104.9903,
            session_idle: Duration::from_secs(1800),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => parse_var("BIND_ADDR", raw)?,
            None => defaults.bind_addr,
        };

        let coins = match lookup("PRICE_COINS") {
            Some(raw) => {
                let coins: Vec<String> = raw
                    .split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect();
                if coins.is_empty() {
                    return Err(ConfigError::NoCoins);
                }
                coins
            }
            None => defaults.coins,
        };

        let latitude = match lookup("WEATHER_LATITUDE") {
            Some(raw) => parse_var("WEATHER_LATITUDE", raw)?,
            None => defaults.latitude,
        };
        let longitude = match lookup("WEATHER_LONGITUDE") {
            Some(raw) => parse_var("WEATHER_LONGITUDE", raw)?,
            None => defaults.longitude,
        };

        let session_idle = match lookup("SESSION_IDLE_SECS") {
            Some(raw) => Duration::from_secs(parse_var("SESSION_IDLE_SECS", raw)?),
            None => defaults.session_idle,
        };

        Ok(Self {
            bind_addr,
            coingecko_base_url: lookup("COINGECKO_BASE_URL")
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.coingecko_base_url),
            open_meteo_base_url: lookup("OPEN_METEO_BASE_URL")
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.open_meteo_base_url),
            coins,
            vs_currency: lookup("PRICE_VS_CURRENCY")
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.vs_currency),
            latitude,
            longitude,
            session_idle,
        })
    }
}

fn parse_var<T>(name: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = raw.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
        value: raw,
    })
}
