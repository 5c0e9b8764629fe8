//! Page pipelines
//!
//! Each render pass runs fetch (through the page's TTL cache) → fallback →
//! append to history → window → view model. A pass never fails: upstream
//! problems become a warning on a complete view.

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::dashboard::{
    ChartPoint, LineChart, Metric, PricePageView, PriceRow, WeatherPageView,
};
use crate::services::coingecko::{self, CoinGeckoService, PriceSnapshot};
use crate::services::fetcher::{FetchResult, Fetcher};
use crate::services::history::{
    HistoryLog, Timestamped, PRICE_WINDOW_MINUTES, WEATHER_WINDOW_MINUTES,
};
use crate::services::open_meteo::{OpenMeteoService, WeatherReading, WeatherReport};
use crate::services::refresh::RefreshControls;
use crate::services::ttl_cache::{TtlCache, PRICE_TTL, WEATHER_TTL};

const PRICE_TITLE: &str = "Simple Live Data Demo (CoinGecko)";
const PRICE_CAPTION: &str =
    "Manual refresh + caching + short history, with a safe fallback if the API hiccups.";
const WEATHER_TITLE: &str = "Weather (Open-Meteo)";
const WEATHER_CAPTION: &str =
    "Temperature over time with caching + short history + auto-refresh.";
const WAITING_INFO: &str = "Waiting for first successful fetch…";
const MISSING_VALUE: &str = "—";

/// Upstream clients shared by every session
#[derive(Clone)]
pub struct Feeds {
    pub coingecko: CoinGeckoService,
    pub open_meteo: OpenMeteoService,
}

impl Feeds {
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let fetcher = Fetcher::new()?;

        Ok(Self {
            coingecko: CoinGeckoService::new(
                fetcher.clone(),
                config.coingecko_base_url.clone(),
                config.coins.clone(),
                config.vs_currency.clone(),
            ),
            open_meteo: OpenMeteoService::new(
                fetcher,
                config.open_meteo_base_url.clone(),
                config.latitude,
                config.longitude,
            ),
        })
    }
}

/// One coin's price at one capture time
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistoryRow {
    pub time: NaiveDateTime,
    pub coin: String,
    pub price: f64,
}

impl Timestamped for PriceHistoryRow {
    fn timestamp(&self) -> NaiveDateTime {
        self.time
    }
}

impl Timestamped for WeatherReading {
    fn timestamp(&self) -> NaiveDateTime {
        self.time
    }
}

fn refreshed_label(now: NaiveDateTime) -> String {
    now.format("%H:%M:%S").to_string()
}

pub struct PricePage {
    cache: TtlCache<String, FetchResult<PriceSnapshot>>,
    history: HistoryLog<PriceHistoryRow>,
    window: Duration,
}

impl Default for PricePage {
    fn default() -> Self {
        Self::new()
    }
}

impl PricePage {
    pub fn new() -> Self {
        let window = Duration::minutes(PRICE_WINDOW_MINUTES);
        Self {
            cache: TtlCache::new(PRICE_TTL),
            history: HistoryLog::for_window(window),
            window,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub async fn invalidate(&self, feed: &CoinGeckoService) {
        self.cache.invalidate(&feed.price_url()).await;
    }

    pub async fn render(
        &mut self,
        feed: &CoinGeckoService,
        controls: RefreshControls,
        now: NaiveDateTime,
    ) -> PricePageView {
        let url = feed.price_url();
        let result = self
            .cache
            .get_or_fetch(url.clone(), feed.fetch_prices(&url))
            .await;

        let (snapshot, failure, using_sample) = match result {
            Ok(snapshot) => (snapshot, None, false),
            Err(reason) => {
                warn!("Price fetch failed, showing sample data: {}", reason);
                (coingecko::sample_snapshot(), Some(reason), true)
            }
        };
        let warning = failure
            .as_ref()
            .map(|reason| format!("{}\nShowing sample data so the demo continues.", reason));

        // The sample is quoted in USD; keep it out of a history in another currency
        if snapshot.vs_currency == feed.vs_currency() {
            self.history
                .extend(snapshot.quotes.iter().map(|quote| PriceHistoryRow {
                    time: now,
                    coin: quote.coin.clone(),
                    price: quote.price,
                }));
        } else {
            debug!(
                "Not recording {} sample rows in {} history",
                snapshot.vs_currency,
                feed.vs_currency()
            );
        }

        let points: Vec<ChartPoint> = self
            .history
            .window(now, self.window)
            .into_iter()
            .map(|row| ChartPoint {
                time: row.time,
                value: row.price,
                series: row.coin,
            })
            .collect();

        debug!(
            "Rendered prices: {} rows, {} chart points",
            snapshot.quotes.len(),
            points.len()
        );

        let currency = feed.vs_currency().to_uppercase();

        PricePageView {
            title: PRICE_TITLE.to_string(),
            caption: PRICE_CAPTION.to_string(),
            last_refreshed: now,
            last_refreshed_label: refreshed_label(now),
            controls,
            table: snapshot
                .quotes
                .iter()
                .map(|quote| PriceRow::new(quote.coin.clone(), &snapshot.vs_currency, quote.price))
                .collect(),
            chart: LineChart {
                title: Some(format!(
                    "Rolling {}-minute prices ({})",
                    self.window.num_minutes(),
                    currency
                )),
                x_label: "Time".to_string(),
                y_label: format!("Price ({})", currency),
                markers: false,
                points,
            },
            vs_currency: snapshot.vs_currency,
            using_sample,
            failure,
            warning,
        }
    }
}

pub struct WeatherPage {
    cache: TtlCache<String, WeatherReport>,
    history: HistoryLog<WeatherReading>,
    window: Duration,
}

impl Default for WeatherPage {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherPage {
    pub fn new() -> Self {
        let window = Duration::minutes(WEATHER_WINDOW_MINUTES);
        Self {
            cache: TtlCache::new(WEATHER_TTL),
            history: HistoryLog::for_window(window),
            window,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub async fn invalidate(&self, feed: &OpenMeteoService) {
        self.cache.invalidate(&feed.forecast_url()).await;
    }

    pub async fn render(
        &mut self,
        feed: &OpenMeteoService,
        controls: RefreshControls,
        now: NaiveDateTime,
    ) -> WeatherPageView {
        let url = feed.forecast_url();
        let report = self
            .cache
            .get_or_fetch(url.clone(), feed.get_weather(&url, now))
            .await;

        let warning = report.failure.as_ref().map(|reason| {
            warn!("Weather fetch failed: {}", reason);
            reason.to_string()
        });

        self.history.append(report.reading.clone());

        let points: Vec<ChartPoint> = self
            .history
            .window(now, self.window)
            .into_iter()
            .filter_map(|reading| {
                Some(ChartPoint {
                    time: reading.time,
                    value: reading.temperature?,
                    series: "temperature".to_string(),
                })
            })
            .collect();

        let (chart, info) = if points.is_empty() {
            (None, Some(WAITING_INFO.to_string()))
        } else {
            let chart = LineChart {
                title: None,
                x_label: "Time".to_string(),
                y_label: "Temp (°C)".to_string(),
                markers: true,
                points,
            };
            (Some(chart), None)
        };

        let metrics = vec![
            metric("Current Temp (°C)", report.reading.temperature),
            metric("Wind (m/s)", report.reading.wind),
        ];

        debug!(
            "Rendered weather: placeholder={}, history={} rows",
            report.reading.is_placeholder(),
            self.history.len()
        );

        WeatherPageView {
            title: WEATHER_TITLE.to_string(),
            caption: WEATHER_CAPTION.to_string(),
            last_refreshed: now,
            last_refreshed_label: refreshed_label(now),
            controls,
            current: report.reading,
            failure: report.failure,
            warning,
            chart,
            info,
            metrics,
        }
    }
}

fn metric(label: &str, value: Option<f64>) -> Metric {
    Metric {
        label: label.to_string(),
        value,
        display: value
            .map(|v| v.to_string())
            .unwrap_or_else(|| MISSING_VALUE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_display() {
        assert_eq!(metric("Wind (m/s)", Some(3.5)).display, "3.5");
        assert_eq!(metric("Wind (m/s)", None).display, "—");
    }

    #[test]
    fn test_refreshed_label() {
        let now = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 5, 7)
            .unwrap();
        assert_eq!(refreshed_label(now), "09:05:07");
    }
}
