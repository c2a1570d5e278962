//! Notification routes. Every handler is scoped to the caller's own
//! notifications; another user's id reads as not found.

use serde_json::json;

use super::{authenticate, ok_json, parse_id, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::types::Result;

/// GET /api/notifications
pub async fn list(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let notifications = state.desk.notifications(&actor).await?;
    ok_json(&json!({ "notifications": notifications }))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let count = state.desk.unread_notifications(&actor).await?;
    ok_json(&json!({ "unreadCount": count }))
}

/// PATCH /api/notifications/{id}/read
pub async fn mark_read(state: &AppState, req: &ApiRequest, id: &str) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let notification_id = parse_id(id)?;
    ok_json(&state.desk.mark_notification_read(&actor, &notification_id).await?)
}

/// PATCH /api/notifications/read-all
pub async fn mark_all_read(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let updated = state.desk.mark_all_notifications_read(&actor).await?;
    ok_json(&json!({ "ok": true, "updated": updated }))
}

/// DELETE /api/notifications/{id}
pub async fn delete(state: &AppState, req: &ApiRequest, id: &str) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let notification_id = parse_id(id)?;
    state.desk.delete_notification(&actor, &notification_id).await?;
    ok_json(&json!({ "ok": true }))
}
