//! The Control Surface: the axum `Router` wiring spec.md §6's endpoints
//! onto `Node`'s framework-independent operations.

use crate::error::NodeError;
use crate::inbox::Phase;
use crate::node::Node;
use crate::transport::WireMessage;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/getState", get(get_state))
        .route("/start", get(start))
        .route("/stop", get(stop))
        .route("/message", post(message))
        .route("/health", get(health))
        .with_state(node)
        .layer(TraceLayer::new_for_http())
}

// Unlike /start and /message, spec.md's wire table has /status report its
// failure as a bare JSON string ("faulty"), not the {error} object the other
// endpoints use, so this handler builds its own response instead of relying
// on `NodeError`'s `IntoResponse` impl.
async fn status(State(node): State<Arc<Node>>) -> axum::response::Response {
    match node.status() {
        Ok(live) => Json(live).into_response(),
        Err(_) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, Json("faulty")).into_response(),
    }
}

async fn get_state(State(node): State<Arc<Node>>) -> Json<crate::node::StateSnapshot> {
    Json(node.get_state())
}

async fn start(State(node): State<Arc<Node>>) -> Result<Json<JsonValue>, NodeError> {
    node.start()?;
    info!(node = node.id(), "start requested");
    Ok(Json(json!({ "success": true })))
}

async fn stop(State(node): State<Arc<Node>>) -> Json<JsonValue> {
    node.stop();
    info!(node = node.id(), "stop requested");
    Json(json!({ "success": true }))
}

async fn message(
    State(node): State<Arc<Node>>,
    Json(body): Json<WireMessage>,
) -> Result<Json<JsonValue>, NodeError> {
    let phase = body
        .phase()
        .ok_or_else(|| NodeError::Malformed(format!("unknown phase {}", body.phase)))?;
    node.receive_message(phase, body.k, body.value, body.from)?;
    Ok(Json(json!({ "success": true })))
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "ok": true }))
}
