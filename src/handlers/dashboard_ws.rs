//! WebSocket stream of auto-refreshed page views
//!
//! Every view produced by a session's auto-refresh loop is forwarded to the
//! socket as `{"type": "prices" | "weather", "view": {...}}`. Clients can also
//! request a manual refresh over the socket.
//!
//! A connected socket keeps its session from going idle. When the session ends
//! (deleted or evicted) the socket gets a close frame.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::handlers::session::{find_session, ApiError};
use crate::models::dashboard::Page;
use crate::services::dashboard::Feeds;
use crate::services::session::{DashboardSession, SessionStore};
use crate::AppState;

/// Control messages from the client
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WsRequest {
    Ping,
    /// Manual refresh through the cache, answered on this socket only
    Refresh { page: Page },
    Unsubscribe,
}

/// Control messages to the client; page views are sent as `PageUpdate`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    Subscribed { session_id: Uuid },
    Pong,
    Error { message: String },
}

/// GET /api/sessions/{id}/ws
pub async fn dashboard_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = find_session(&state, &id).await?;
    let feeds = state.feeds.clone();
    let sessions = state.sessions.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session, feeds, sessions)))
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), axum::Error> {
    match serde_json::to_string(payload) {
        Ok(text) => sender.send(Message::Text(text.into())).await,
        Err(e) => {
            error!("Failed to serialize WebSocket payload: {}", e);
            Ok(())
        }
    }
}

async fn close_ended(sender: &mut SplitSink<WebSocket, Message>) {
    let frame = CloseFrame {
        code: close_code::NORMAL,
        reason: "Session ended".into(),
    };
    let _ = sender.send(Message::Close(Some(frame))).await;
}

async fn handle_socket(
    socket: WebSocket,
    session: Arc<DashboardSession>,
    feeds: Feeds,
    sessions: SessionStore,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = session.subscribe();
    let mut ended = session.end_signal();
    let session_id = session.id();

    let mut keepalive = interval(sessions.keepalive_interval());
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Dashboard WebSocket connected for session {}", session_id);

    if send_json(&mut sender, &WsMessage::Subscribed { session_id })
        .await
        .is_err()
    {
        return;
    }

    if session.is_ended() {
        close_ended(&mut sender).await;
        return;
    }

    loop {
        tokio::select! {
            changed = ended.changed() => {
                if changed.is_err() || *ended.borrow_and_update() {
                    info!("Session {} ended, closing WebSocket", session_id);
                    close_ended(&mut sender).await;
                    break;
                }
            }

            _ = keepalive.tick() => {
                if !sessions.touch(&session_id).await {
                    info!("Session {} is gone, closing WebSocket", session_id);
                    close_ended(&mut sender).await;
                    break;
                }
            }

            update = updates.recv() => {
                match update {
                    Ok(update) => {
                        if let Err(e) = send_json(&mut sender, &update).await {
                            debug!("WebSocket send error: {}", e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("WebSocket for session {} skipped {} updates", session_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply_ok = match serde_json::from_str::<WsRequest>(&text) {
                            Ok(WsRequest::Ping) => send_json(&mut sender, &WsMessage::Pong).await.is_ok(),
                            Ok(WsRequest::Refresh { page }) => {
                                let update = session.render(page, &feeds).await;
                                send_json(&mut sender, &update).await.is_ok()
                            }
                            Ok(WsRequest::Unsubscribe) => {
                                info!("Client unsubscribed from session {}", session_id);
                                break;
                            }
                            Err(e) => {
                                let message = format!("Unrecognized request: {}", e);
                                send_json(&mut sender, &WsMessage::Error { message }).await.is_ok()
                            }
                        };
                        if !reply_ok {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket receive error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Dashboard WebSocket for session {} closed", session_id);
}
