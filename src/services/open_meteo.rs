//! Open-Meteo current conditions client
//!
//! Unlike the price feed, a failed weather fetch still yields a reading:
//! a placeholder stamped with the fetch time and no measurements, so the
//! history and metric code always has a row to work with.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::services::fetcher::{FailureReason, FetchResult, Fetcher};

/// Temperature in °C, wind in m/s as reported upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub time: NaiveDateTime,
    pub temperature: Option<f64>,
    pub wind: Option<f64>,
}

impl WeatherReading {
    pub fn placeholder(now: NaiveDateTime) -> Self {
        Self {
            time: now,
            temperature: None,
            wind: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.temperature.is_none() && self.wind.is_none()
    }
}

/// Result of one weather fetch: always a reading, plus the failure if there was one
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub reading: WeatherReading,
    pub failure: Option<FailureReason>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    time: String,
    temperature_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
}

#[derive(Clone)]
pub struct OpenMeteoService {
    fetcher: Fetcher,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

impl OpenMeteoService {
    pub fn new(fetcher: Fetcher, base_url: String, latitude: f64, longitude: f64) -> Self {
        Self {
            fetcher,
            base_url,
            latitude,
            longitude,
        }
    }

    pub fn forecast_url(&self) -> String {
        build_url(&self.base_url, self.latitude, self.longitude)
    }

    /// Fetch current conditions; `now` stamps the placeholder on failure
    pub async fn get_weather(&self, url: &str, now: NaiveDateTime) -> WeatherReport {
        info!(
            "Fetching current weather for ({}, {})",
            self.latitude, self.longitude
        );

        match self.fetch_current(url).await {
            Ok(reading) => {
                debug!(
                    "Weather at {}: {:?}°C, wind {:?}",
                    reading.time, reading.temperature, reading.wind
                );
                WeatherReport {
                    reading,
                    failure: None,
                }
            }
            Err(failure) => WeatherReport {
                reading: WeatherReading::placeholder(now),
                failure: Some(failure),
            },
        }
    }

    async fn fetch_current(&self, url: &str) -> FetchResult<WeatherReading> {
        let body = self.fetcher.get_json(url).await?;
        parse_current(body)
    }
}

pub fn build_url(base_url: &str, latitude: f64, longitude: f64) -> String {
    format!(
        "{}/forecast?latitude={}&longitude={}&current=temperature_2m,wind_speed_10m",
        base_url.trim_end_matches('/'),
        latitude,
        longitude
    )
}

pub fn parse_current(body: Value) -> FetchResult<WeatherReading> {
    let response: ForecastResponse =
        serde_json::from_value(body).map_err(|e| FailureReason::malformed(e.to_string()))?;
    let current = response.current;

    let time = parse_observation_time(&current.time).ok_or_else(|| {
        FailureReason::malformed(format!("unparseable observation time '{}'", current.time))
    })?;

    Ok(WeatherReading {
        time,
        temperature: current.temperature_2m,
        wind: current.wind_speed_10m,
    })
}

/// Open-Meteo reports ISO8601 minutes ("2024-05-01T12:15"), occasionally with seconds
fn parse_observation_time(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}
