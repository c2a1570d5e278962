//! HTTP routes for doubtdesk
//!
//! `dispatch` matches on method and path segments and hands the request to
//! one handler. Handlers return `Result<Response, DeskError>`; errors are
//! rendered here as `{"error", "code"}` with the error's status.

pub mod auth_routes;
pub mod contributors;
pub mod follow;
pub mod health;
pub mod membership;
pub mod notifications;
pub mod questions;

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, CONTENT_TYPE};
use hyper::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::auth::extract_token_from_header;
use crate::server::AppState;
use crate::types::{DeskError, Result};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 256 * 1024;

const ALLOWED_METHODS: &str = "GET, POST, PATCH, DELETE, OPTIONS";

/// A request with its body already read
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            authorization: None,
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        self.authorization = Some(format!("Bearer {}", token));
        self
    }

    pub fn with_json(mut self, body: &serde_json::Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self
    }

    /// Decoded query parameters; later duplicates win
    pub fn query_params(&self) -> HashMap<String, String> {
        parse_query(self.query.as_deref().unwrap_or(""))
    }
}

pub type ApiResponse = Response<Full<Bytes>>;

/// Route a request to its handler
pub async fn dispatch(state: &AppState, req: ApiRequest) -> ApiResponse {
    let segments: Vec<&str> = req
        .path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    let result = match (&req.method, segments.as_slice()) {
        (&Method::OPTIONS, _) => Ok(preflight_response()),

        (&Method::GET, ["health"]) => Ok(health::health_check(state)),

        // Accounts
        (&Method::POST, ["api", "auth", "register"]) => auth_routes::register(state, &req).await,
        (&Method::POST, ["api", "auth", "login"]) => auth_routes::login(state, &req).await,
        (&Method::GET, ["api", "auth", "me"]) => auth_routes::me(state, &req).await,
        (&Method::POST, ["api", "membership", "join"]) => membership::join(state, &req).await,

        // Questions and answers
        (&Method::GET, ["api", "questions"]) => questions::list(state, &req).await,
        (&Method::POST, ["api", "questions"]) => questions::create(state, &req).await,
        (&Method::GET, ["api", "questions", qid]) => questions::detail(state, &req, qid).await,
        (&Method::POST, ["api", "questions", qid, "answers"]) => {
            questions::post_answer(state, &req, qid).await
        }
        (&Method::POST, ["api", "questions", qid, "answers", aid, "accept"]) => {
            questions::accept(state, &req, qid, aid).await
        }
        (&Method::POST, ["api", "questions", qid, "answers", aid, "like"]) => {
            questions::like(state, &req, qid, aid).await
        }
        (&Method::POST, ["api", "questions", qid, "answers", aid, "rate"]) => {
            questions::rate(state, &req, qid, aid).await
        }

        (&Method::GET, ["api", "contributors", "leaderboard"]) => {
            contributors::leaderboard(state).await
        }

        // Follow
        (&Method::POST, ["api", "follow", "question", qid]) => follow::follow(state, &req, qid).await,
        (&Method::DELETE, ["api", "follow", "question", qid]) => {
            follow::unfollow(state, &req, qid).await
        }
        (&Method::GET, ["api", "follow", "question", qid, "is-following"]) => {
            follow::is_following(state, &req, qid).await
        }
        (&Method::GET, ["api", "follow", "question", qid, "count"]) => {
            follow::count(state, qid).await
        }
        (&Method::GET, ["api", "follow", "my-following"]) => follow::my_following(state, &req).await,

        // Notifications
        (&Method::GET, ["api", "notifications"]) => notifications::list(state, &req).await,
        (&Method::GET, ["api", "notifications", "unread-count"]) => {
            notifications::unread_count(state, &req).await
        }
        (&Method::PATCH, ["api", "notifications", "read-all"]) => {
            notifications::mark_all_read(state, &req).await
        }
        (&Method::PATCH, ["api", "notifications", id, "read"]) => {
            notifications::mark_read(state, &req, id).await
        }
        (&Method::DELETE, ["api", "notifications", id]) => {
            notifications::delete(state, &req, id).await
        }

        _ => Err(DeskError::not_found(format!("No route for {} {}", req.method, req.path))),
    };

    let response = result.unwrap_or_else(|e| {
        if e.status_code().is_server_error() {
            warn!("{} {} failed: {}", req.method, req.path, e);
        } else {
            debug!("{} {} rejected: {}", req.method, req.path, e);
        }
        error_response(&e)
    });

    with_cors(response, &state.args.cors_origin)
}

// =============================================================================
// Request helpers
// =============================================================================

/// Resolve the caller from the bearer token
pub fn authenticate(state: &AppState, req: &ApiRequest) -> Result<ObjectId> {
    let token = extract_token_from_header(req.authorization.as_deref())
        .ok_or_else(|| DeskError::Unauthorized("Missing bearer token".into()))?;

    let result = state.jwt.verify_token(token);
    match result.claims {
        Some(claims) if result.valid => claims.user_id(),
        _ => Err(DeskError::Unauthorized(
            result.error.unwrap_or_else(|| "Invalid token".into()),
        )),
    }
}

pub fn parse_id(raw: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| DeskError::validation(format!("Invalid id: {}", raw)))
}

pub fn parse_json<T: DeserializeOwned>(req: &ApiRequest) -> Result<T> {
    if req.body.len() > MAX_BODY_BYTES {
        return Err(DeskError::validation("Request body too large"));
    }
    if req.body.is_empty() {
        return Err(DeskError::validation("Request body is required"));
    }
    Ok(serde_json::from_slice(&req.body)?)
}

pub fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

// =============================================================================
// Response helpers
// =============================================================================

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> ApiResponse {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn ok_json<T: Serialize>(body: &T) -> Result<ApiResponse> {
    Ok(json_response(StatusCode::OK, body))
}

pub fn error_response(err: &DeskError) -> ApiResponse {
    json_response(
        err.status_code(),
        &serde_json::json!({
            "error": err.message(),
            "code": err.code(),
        }),
    )
}

fn preflight_response() -> ApiResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

fn with_cors(mut response: ApiResponse, origin: &str) -> ApiResponse {
    let origin = HeaderValue::from_str(origin).unwrap_or(HeaderValue::from_static("*"));
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}
