//! Webhook receiver: the push half of the delivery-mode choice.
//!
//! The platform POSTs one raw update per request. The body is decoded
//! at this boundary and handed to the dispatcher; a dispatch failure is
//! answered with 500 so the platform redelivers (at-least-once, same as
//! the poll loop).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::Value;
use tracing::warn;

use crate::decode::decode_update;
use crate::dispatch::Dispatcher;

const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

#[derive(Clone)]
pub struct WebhookState {
    pub dispatcher: Arc<Dispatcher>,
    pub secret: Option<String>,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", post(handle_update))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn secret_valid(expected: &Option<String>, provided: Option<&str>) -> bool {
    match expected {
        Some(exp) => provided == Some(exp.as_str()),
        None => true,
    }
}

async fn handle_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> axum::response::Response {
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if !secret_valid(&state.secret, provided) {
        warn!(event = "webhook_rejected", reason = "secret_mismatch");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let raw = match serde_json::from_value(payload) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(event = "webhook_rejected", reason = "bad_payload", error = %err);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let envelope = decode_update(raw);
    match state.dispatcher.dispatch(&envelope).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            warn!(
                event = "dispatch_failed",
                seq = envelope.seq,
                chat_id = envelope.chat_id().unwrap_or("-"),
                error = %err,
                "asking the platform to redeliver"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
