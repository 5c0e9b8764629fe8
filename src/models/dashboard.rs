use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::services::fetcher::FailureReason;
use crate::services::open_meteo::WeatherReading;
use crate::services::refresh::RefreshControls;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Prices,
    Weather,
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Page::Prices => write!(f, "prices"),
            Page::Weather => write!(f, "weather"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub time: NaiveDateTime,
    pub value: f64,
    pub series: String,
}

/// Line chart: x = time, y = value, one line per series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineChart {
    pub title: Option<String>,
    pub x_label: String,
    pub y_label: String,
    pub markers: bool,
    pub points: Vec<ChartPoint>,
}

/// Table row named after the quoted currency: `{"coin": "bitcoin", "usd": 68000.0}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub coin: String,
    #[serde(flatten)]
    pub quote: BTreeMap<String, f64>,
}

impl PriceRow {
    pub fn new(coin: impl Into<String>, vs_currency: &str, price: f64) -> Self {
        Self {
            coin: coin.into(),
            quote: BTreeMap::from([(vs_currency.to_string(), price)]),
        }
    }

    pub fn price_in(&self, vs_currency: &str) -> Option<f64> {
        self.quote.get(vs_currency).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePageView {
    pub title: String,
    pub caption: String,
    pub last_refreshed: NaiveDateTime,
    pub last_refreshed_label: String,
    pub controls: RefreshControls,
    pub vs_currency: String,
    pub table: Vec<PriceRow>,
    /// True when `table` is the static sample rather than live data
    pub using_sample: bool,
    pub failure: Option<FailureReason>,
    pub warning: Option<String>,
    pub chart: LineChart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub label: String,
    pub value: Option<f64>,
    /// Value as displayed, "—" when missing
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPageView {
    pub title: String,
    pub caption: String,
    pub last_refreshed: NaiveDateTime,
    pub last_refreshed_label: String,
    pub controls: RefreshControls,
    pub current: WeatherReading,
    pub failure: Option<FailureReason>,
    pub warning: Option<String>,
    /// None until the first successful fetch lands in the window
    pub chart: Option<LineChart>,
    pub info: Option<String>,
    pub metrics: Vec<Metric>,
}

/// A rendered page pushed to WebSocket subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageUpdate {
    Prices { view: PricePageView },
    Weather { view: WeatherPageView },
}

impl PageUpdate {
    pub fn page(&self) -> Page {
        match self {
            PageUpdate::Prices { .. } => Page::Prices,
            PageUpdate::Weather { .. } => Page::Weather,
        }
    }
}
