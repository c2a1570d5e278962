//! Liveness endpoint

use hyper::StatusCode;
use serde::Serialize;

use super::{json_response, ApiResponse};
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub commit: &'static str,
    pub built_at: &'static str,
    pub node_id: String,
    /// "mongodb" or "memory"
    pub storage: &'static str,
    pub mode: &'static str,
    pub uptime: u64,
    pub timestamp: String,
}

/// GET /health
pub fn health_check(state: &AppState) -> ApiResponse {
    let body = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("GIT_COMMIT_SHORT"),
        built_at: env!("BUILD_TIMESTAMP"),
        node_id: state.args.node_id.to_string(),
        storage: state.storage,
        mode: if state.args.dev_mode { "development" } else { "production" },
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    json_response(StatusCode::OK, &body)
}
