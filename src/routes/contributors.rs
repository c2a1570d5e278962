//! Contributor leaderboard

use serde_json::json;

use super::{ok_json, ApiResponse};
use crate::server::AppState;
use crate::types::Result;

/// GET /api/contributors/leaderboard
pub async fn leaderboard(state: &AppState) -> Result<ApiResponse> {
    let users = state.desk.leaderboard().await?;
    ok_json(&json!({ "users": users }))
}
