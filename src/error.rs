//! The node's closed set of request-time errors (spec.md §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node is faulty")]
    Faulty,
    #[error("node is killed")]
    Killed,
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = match self {
            NodeError::Faulty | NodeError::Killed => StatusCode::INTERNAL_SERVER_ERROR,
            NodeError::Malformed(_) => StatusCode::BAD_REQUEST,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
