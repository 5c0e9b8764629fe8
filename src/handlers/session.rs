use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::session::{CreateSessionResponse, ErrorResponse, HealthResponse};
use crate::services::session::DashboardSession;
use crate::AppState;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: String) -> ApiError {
    (status, Json(ErrorResponse { error }))
}

/// Resolve a path session id, 400 if it isn't a UUID, 404 if it's unknown or expired
pub async fn find_session(state: &AppState, raw_id: &str) -> Result<Arc<DashboardSession>, ApiError> {
    let id = Uuid::parse_str(raw_id).map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid session id '{}': {}", raw_id, e),
        )
    })?;

    state.sessions.get(&id).await.ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", id),
        )
    })
}

pub async fn hello() -> &'static str {
    "Hello from the live dashboard backend!"
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.sessions.count().await,
    })
}

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id(),
        }),
    )
}

/// DELETE /api/sessions/{id}
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = find_session(&state, &id).await?;
    state.sessions.remove(&session.id()).await;
    session.end();
    Ok(StatusCode::NO_CONTENT)
}
