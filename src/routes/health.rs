//! Lightweight service health endpoint used for readiness checks and tests.

use crate::models::ApiResponse;
use rocket::get;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};

/// Basic response payload describing API health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Static status string reporting application readiness.
    pub status: String,
    pub version: String,
}

/// Health check endpoint returning a trivial JSON payload.
#[get("/health")]
pub fn health_check() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::new(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
