use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use crate::handlers::session::{find_session, ApiError};
use crate::models::dashboard::{Page, PricePageView, WeatherPageView};
use crate::models::session::AutoRefreshRequest;
use crate::services::refresh::RefreshControls;
use crate::AppState;

/// GET /api/sessions/{id}/prices
///
/// Manual refresh of the prices page. Served from the session cache unless the
/// 5 minute TTL has run out; upstream failures come back as a warning with the
/// sample table, never as an error status.
pub async fn get_prices(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PricePageView>, ApiError> {
    let session = find_session(&state, &id).await?;
    let view = session
        .render_prices(&state.feeds, Utc::now().naive_utc())
        .await;
    Ok(Json(view))
}

/// GET /api/sessions/{id}/weather
pub async fn get_weather(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WeatherPageView>, ApiError> {
    let session = find_session(&state, &id).await?;
    let view = session
        .render_weather(&state.feeds, Utc::now().naive_utc())
        .await;
    Ok(Json(view))
}

/// PUT /api/sessions/{id}/prices/auto-refresh
pub async fn update_prices_auto_refresh(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AutoRefreshRequest>,
) -> Result<Json<RefreshControls>, ApiError> {
    update_auto_refresh(state, id, Page::Prices, request).await
}

/// PUT /api/sessions/{id}/weather/auto-refresh
pub async fn update_weather_auto_refresh(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AutoRefreshRequest>,
) -> Result<Json<RefreshControls>, ApiError> {
    update_auto_refresh(state, id, Page::Weather, request).await
}

async fn update_auto_refresh(
    state: AppState,
    id: String,
    page: Page,
    request: AutoRefreshRequest,
) -> Result<Json<RefreshControls>, ApiError> {
    let session = find_session(&state, &id).await?;
    tracing::info!("Auto-refresh update for {} on {}: {:?}", page, id, request);

    let controls =
        session.configure_auto_refresh(page, request.enabled, request.interval_secs, &state.feeds);
    Ok(Json(controls))
}
