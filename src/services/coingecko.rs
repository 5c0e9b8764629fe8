use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::services::fetcher::{FailureReason, FetchResult, Fetcher};

/// One coin's price in the quoted currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub coin: String,
    pub price: f64,
}

/// Prices returned by a single /simple/price call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub vs_currency: String,
    pub quotes: Vec<PriceQuote>,
}

#[derive(Clone)]
pub struct CoinGeckoService {
    fetcher: Fetcher,
    base_url: String,
    coins: Vec<String>,
    vs_currency: String,
}

impl CoinGeckoService {
    pub fn new(fetcher: Fetcher, base_url: String, coins: Vec<String>, vs_currency: String) -> Self {
        Self {
            fetcher,
            base_url,
            coins,
            vs_currency,
        }
    }

    pub fn vs_currency(&self) -> &str {
        &self.vs_currency
    }

    /// URL for the configured coin list; doubles as the cache key
    pub fn price_url(&self) -> String {
        build_url(&self.base_url, &self.coins, &self.vs_currency)
    }

    pub async fn fetch_prices(&self, url: &str) -> FetchResult<PriceSnapshot> {
        info!("Fetching {} prices from CoinGecko", self.coins.len());

        let body = self.fetcher.get_json(url).await?;
        let snapshot = parse_prices(&body, &self.coins, &self.vs_currency)?;

        debug!(
            "Fetched {} quotes in {}",
            snapshot.quotes.len(),
            snapshot.vs_currency
        );

        Ok(snapshot)
    }
}

pub fn build_url(base_url: &str, ids: &[String], vs_currency: &str) -> String {
    format!(
        "{}/simple/price?ids={}&vs_currencies={}",
        base_url.trim_end_matches('/'),
        ids.join(","),
        vs_currency
    )
}

/// Parse `{"bitcoin": {"usd": 68000}, ...}` into quotes, in `coins` order.
/// Coins absent from the body are skipped; a body with none of them is malformed.
pub fn parse_prices(body: &Value, coins: &[String], vs_currency: &str) -> FetchResult<PriceSnapshot> {
    let object = body
        .as_object()
        .ok_or_else(|| FailureReason::malformed("expected a JSON object keyed by coin id"))?;

    let quotes: Vec<PriceQuote> = coins
        .iter()
        .filter_map(|coin| {
            let price = object.get(coin)?.get(vs_currency)?.as_f64()?;
            Some(PriceQuote {
                coin: coin.clone(),
                price,
            })
        })
        .collect();

    if quotes.is_empty() {
        return Err(FailureReason::malformed(format!(
            "no {} price for any of [{}]",
            vs_currency,
            coins.join(", ")
        )));
    }

    Ok(PriceSnapshot {
        vs_currency: vs_currency.to_string(),
        quotes,
    })
}

/// Static fallback so the page still has something to draw when the API is unavailable
pub fn sample_snapshot() -> PriceSnapshot {
    PriceSnapshot {
        vs_currency: "usd".to_string(),
        quotes: vec![
            PriceQuote {
                coin: "bitcoin".to_string(),
                price: 68000.0,
            },
            PriceQuote {
                coin: "ethereum".to_string(),
                price: 3500.0,
            },
        ],
    }
}
