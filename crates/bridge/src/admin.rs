//! Admin surface for the event-stream binding.

use crate::service::BridgeService;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;

pub fn router(service: Arc<BridgeService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reload", post(reload))
        .with_state(service)
}

async fn health(State(service): State<Arc<BridgeService>>) -> Json<Value> {
    let (tools, unsecured) = service.publisher.snapshot().map_or((0, 0), |s| {
        (s.tools.len(), s.analysis.unsecured_operations.len())
    });
    Json(json!({
        "status": "ok",
        "sessions": service.registry.len(),
        "tools": tools,
        "unsecuredOperations": unsecured
    }))
}

async fn reload(State(service): State<Arc<BridgeService>>) -> (StatusCode, Json<Value>) {
    match service.reload().await {
        Ok(count) => (
            StatusCode::OK,
            Json(json!({ "status": "reloaded", "tools": count })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}
