//! Question and answer routes

use hyper::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::{authenticate, json_response, ok_json, parse_id, parse_json, ApiRequest, ApiResponse};
use crate::actions::NewQuestion;
use crate::db::schemas::Category;
use crate::db::QuestionFilter;
use crate::server::AppState;
use crate::stats::Rating;
use crate::types::{DeskError, Result};

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub body: String,
}

fn question_filter(req: &ApiRequest) -> Result<QuestionFilter> {
    let params = req.query_params();

    let text = params
        .get("q")
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());
    let category = match params.get("category").map(|c| c.trim()) {
        Some(c) if !c.is_empty() && c != "All" => Some(c.parse::<Category>()?),
        _ => None,
    };
    let unanswered = params.get("unanswered").map(|v| v == "true").unwrap_or(false);
    let tags = params
        .get("tags")
        .map(|t| {
            t.split(',')
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(QuestionFilter {
        text,
        category,
        unanswered,
        tags,
        limit: 0,
    })
}

/// GET /api/questions
pub async fn list(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    authenticate(state, req)?;
    let filter = question_filter(req)?;
    let questions = state.desk.list_questions(filter).await?;
    ok_json(&json!({ "questions": questions }))
}

/// POST /api/questions
pub async fn create(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let body: NewQuestion = parse_json(req)?;
    let id = state.desk.ask_question(&actor, body).await?;
    Ok(json_response(StatusCode::CREATED, &json!({ "id": id.to_hex() })))
}

/// GET /api/questions/{qid}
pub async fn detail(state: &AppState, req: &ApiRequest, qid: &str) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let question_id = parse_id(qid)?;
    ok_json(&state.desk.question_detail(&question_id, Some(&actor)).await?)
}

/// POST /api/questions/{qid}/answers
pub async fn post_answer(state: &AppState, req: &ApiRequest, qid: &str) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let question_id = parse_id(qid)?;
    let body: AnswerRequest = parse_json(req)?;
    let id = state.desk.submit_answer(&actor, &question_id, &body.body).await?;
    Ok(json_response(StatusCode::CREATED, &json!({ "id": id.to_hex() })))
}

/// POST /api/questions/{qid}/answers/{aid}/accept
pub async fn accept(state: &AppState, req: &ApiRequest, qid: &str, aid: &str) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let (question_id, answer_id) = (parse_id(qid)?, parse_id(aid)?);
    let outcome = state.desk.accept_answer(&actor, &question_id, &answer_id).await?;
    ok_json(&json!({ "ok": true, "changed": outcome.changed }))
}

/// POST /api/questions/{qid}/answers/{aid}/like
pub async fn like(state: &AppState, req: &ApiRequest, qid: &str, aid: &str) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let (question_id, answer_id) = (parse_id(qid)?, parse_id(aid)?);
    let liked = state.desk.toggle_like(&actor, &question_id, &answer_id).await?;
    ok_json(&json!({ "ok": true, "liked": liked }))
}

/// POST /api/questions/{qid}/answers/{aid}/rate
pub async fn rate(state: &AppState, req: &ApiRequest, qid: &str, aid: &str) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    let (question_id, answer_id) = (parse_id(qid)?, parse_id(aid)?);
    let body: serde_json::Value = parse_json(req)?;
    let rating = body
        .get("rating")
        .ok_or_else(|| DeskError::validation("rating is required"))
        .and_then(Rating::from_json)?;

    let outcome = state
        .desk
        .rate_answer(&actor, &question_id, &answer_id, rating)
        .await?;
    ok_json(&json!({
        "ok": true,
        "isNew": outcome.is_new,
        "totalRatings": outcome.answer.count,
        "averageRating": outcome.answer.average,
    }))
}
