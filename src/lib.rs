// src/lib.rs

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use services::{dashboard::Feeds, session::SessionStore};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub feeds: Feeds,
    pub sessions: SessionStore,
}

pub mod config;

pub mod services {
    pub mod fetcher;
    pub mod coingecko;
    pub mod open_meteo;
    pub mod ttl_cache;
    pub mod history;
    pub mod refresh;
    pub mod dashboard;
    pub mod session;
}

pub mod jobs;
pub mod models;
pub mod handlers;

/// Full application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::session::hello))
        .route("/health", get(handlers::session::health))
        .route("/api/sessions", post(handlers::session::create_session))
        .route(
            "/api/sessions/{id}",
            delete(handlers::session::end_session),
        )
        .route("/api/sessions/{id}/prices", get(handlers::dashboard::get_prices))
        .route(
            "/api/sessions/{id}/prices/auto-refresh",
            put(handlers::dashboard::update_prices_auto_refresh),
        )
        .route("/api/sessions/{id}/weather", get(handlers::dashboard::get_weather))
        .route(
            "/api/sessions/{id}/weather/auto-refresh",
            put(handlers::dashboard::update_weather_auto_refresh),
        )
        .route("/api/sessions/{id}/ws", get(handlers::dashboard_ws::dashboard_websocket))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
