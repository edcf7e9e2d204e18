//! Webhook endpoint for platform vote notifications.
//!
//! Endpoints:
//!   POST /webhook  -> Receive a vote/test notification
//!   GET  /health   -> Liveness probe
//!
//! The platform is configured with the generated authorization token; a
//! request is accepted only when its `Authorization` header matches. The
//! handler acknowledges immediately - crediting happens asynchronously on
//! the event bus.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::SettingsHandle;
use crate::ingest::{BridgeEvent, VoteEvent, VotePayload};

/// Webhook API state
#[derive(Clone)]
pub struct WebhookState {
    pub events: mpsc::Sender<BridgeEvent>,
    pub settings: SettingsHandle,
}

pub fn create_webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", post(receive_vote))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}

async fn receive_vote(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(payload): Json<VotePayload>,
) -> StatusCode {
    let settings = state.settings.snapshot().await;
    let Some(expected) = settings.webhook_auth else {
        warn!("Webhook request received but no authorization token is configured");
        return StatusCode::SERVICE_UNAVAILABLE;
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected.as_str()) {
        warn!("Webhook request with missing or invalid authorization");
        return StatusCode::UNAUTHORIZED;
    }

    debug!(user_id = payload.user, kind = ?payload.kind, "Webhook event accepted");
    let event = BridgeEvent::Vote(VoteEvent::from_payload(payload, Utc::now()));
    if state.events.send(event).await.is_err() {
        warn!("Event channel closed, dropping webhook event");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::OK
}
