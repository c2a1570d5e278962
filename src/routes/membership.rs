//! Community membership

use serde_json::json;

use super::{authenticate, ok_json, ApiRequest, ApiResponse};
use crate::actions::UserProfile;
use crate::server::AppState;
use crate::types::Result;

/// POST /api/membership/join
pub async fn join(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let user = state.desk.join_community(&actor).await?;
    ok_json(&json!({
        "ok": true,
        "user": UserProfile::from(&user),
    }))
}
