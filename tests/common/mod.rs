#![allow(dead_code)]

use axum::{
    body::Body,
    extract::State,
    http::{header, Response, StatusCode},
    routing::get,
    Router,
};
use livedash_backend::{
    config::Config,
    services::{dashboard::Feeds, session::SessionStore},
    AppState,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the fake upstream answers with
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub retry_after: Option<String>,
}

impl Reply {
    pub fn json(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.to_string(),
            retry_after: None,
        }
    }

    pub fn raw(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            retry_after: None,
        }
    }

    pub fn rate_limited(retry_after: Option<&str>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: r#"{"status":{"error_code":429}}"#.to_string(),
            retry_after: retry_after.map(str::to_string),
        }
    }
}

pub fn prices_body() -> Value {
    json!({"bitcoin": {"usd": 68000}, "ethereum": {"usd": 3500}})
}

pub fn weather_body() -> Value {
    json!({
        "latitude": 39.74,
        "longitude": -104.99,
        "current": {
            "time": chrono::Utc::now().naive_utc().format("%Y-%m-%dT%H:%M").to_string(),
            "interval": 900,
            "temperature_2m": 21.5,
            "wind_speed_10m": 4.1
        }
    })
}

#[derive(Clone)]
struct UpstreamState {
    reply: Arc<Mutex<Reply>>,
    hits: Arc<AtomicUsize>,
}

/// A local stand-in for CoinGecko / Open-Meteo serving a configurable reply
pub struct FakeUpstream {
    pub base_url: String,
    state: UpstreamState,
}

impl FakeUpstream {
    pub async fn start(reply: Reply) -> Self {
        let state = UpstreamState {
            reply: Arc::new(Mutex::new(reply)),
            hits: Arc::new(AtomicUsize::new(0)),
        };

        let app = Router::new()
            .route("/simple/price", get(respond))
            .route("/forecast", get(respond))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.state.reply.lock() = reply;
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

async fn respond(State(state): State<UpstreamState>) -> Response<Body> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let reply = state.reply.lock().clone();

    let mut builder = Response::builder()
        .status(reply.status)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(retry_after) = reply.retry_after {
        builder = builder.header(header::RETRY_AFTER, retry_after);
    }
    builder.body(Body::from(reply.body)).unwrap()
}

/// Base URL on which nothing is listening
pub fn closed_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

pub fn test_config(prices_base_url: &str, weather_base_url: &str) -> Config {
    Config {
        coingecko_base_url: prices_base_url.to_string(),
        open_meteo_base_url: weather_base_url.to_string(),
        ..Config::default()
    }
}

pub fn test_feeds(prices_base_url: &str, weather_base_url: &str) -> Feeds {
    Feeds::from_config(&test_config(prices_base_url, weather_base_url)).unwrap()
}

pub fn test_state(prices_base_url: &str, weather_base_url: &str) -> AppState {
    AppState {
        feeds: test_feeds(prices_base_url, weather_base_url),
        sessions: SessionStore::new(Duration::from_secs(60)),
    }
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
