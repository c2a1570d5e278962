//! Question follow routes

use serde_json::json;

use super::{authenticate, ok_json, parse_id, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::types::Result;

/// POST /api/follow/question/{qid}
pub async fn follow(state: &AppState, req: &ApiRequest, qid: &str) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let question_id = parse_id(qid)?;
    let change = state.desk.follow_question(&actor, &question_id).await?;
    ok_json(&json!({
        "ok": true,
        "following": true,
        "changed": change.changed,
        "followerCount": change.follower_count,
    }))
}

/// DELETE /api/follow/question/{qid}
pub async fn unfollow(state: &AppState, req: &ApiRequest, qid: &str) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let question_id = parse_id(qid)?;
    let change = state.desk.unfollow_question(&actor, &question_id).await?;
    ok_json(&json!({
        "ok": true,
        "following": false,
        "changed": change.changed,
        "followerCount": change.follower_count,
    }))
}

/// GET /api/follow/question/{qid}/is-following
pub async fn is_following(state: &AppState, req: &ApiRequest, qid: &str) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let question_id = parse_id(qid)?;
    let following = state.desk.is_following(&actor, &question_id).await?;
    ok_json(&json!({ "isFollowing": following }))
}

/// GET /api/follow/question/{qid}/count
pub async fn count(state: &AppState, qid: &str) -> Result<ApiResponse> {
    let question_id = parse_id(qid)?;
    let count = state.desk.follower_count(&question_id).await?;
    ok_json(&json!({ "followerCount": count }))
}

/// GET /api/follow/my-following
pub async fn my_following(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let questions = state.desk.followed_questions(&actor).await?;
    ok_json(&json!({ "questions": questions }))
}
