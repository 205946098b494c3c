//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub index: IndexStatus,
}

#[derive(Serialize)]
pub struct IndexStatus {
    pub provider: String,
    pub name: String,
}

/// Liveness probe - always returns ok if the server is running
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: lexbridge_common::VERSION.to_string(),
        index: IndexStatus {
            provider: state.config.index.provider.clone(),
            name: state.pipeline.index_name().to_string(),
        },
    })
}
