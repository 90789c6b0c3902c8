//! HTTP endpoint for inbound peer messages (`axum`).
//!
//! - `POST /message`: body is a `WireMessage`; the response acknowledges
//!   receipt only (`{"received": true, "messageId": ...}`)
//! - `GET /health`: the node's [`HealthInfo`]

use crate::domain::HealthInfo;
use crate::ports::InboundHandler;
use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use shared_types::WireMessage;
use std::sync::Arc;
use tracing::debug;

type SharedHandler = Arc<dyn InboundHandler>;

/// Router serving the peer wire protocol for `handler`.
pub fn http_router(handler: Arc<dyn InboundHandler>) -> Router {
    Router::new()
        .route("/message", post(receive_message))
        .route("/health", get(health))
        .with_state(handler)
}

async fn receive_message(
    State(handler): State<SharedHandler>,
    Json(message): Json<WireMessage>,
) -> Json<Value> {
    let message_id = message.message_id;
    debug!(
        message_id = %message_id,
        kind = %message.kind,
        from = %message.from,
        "[cn-01] inbound message"
    );
    handler.on_message(message).await;
    Json(json!({ "received": true, "messageId": message_id }))
}

async fn health(State(handler): State<SharedHandler>) -> Json<HealthInfo> {
    Json(handler.health())
}
