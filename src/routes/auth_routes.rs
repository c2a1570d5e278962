//! Account routes: register, login, current user

use hyper::StatusCode;
use serde::{Deserialize, Serialize};

use super::{authenticate, json_response, ok_json, parse_json, ApiRequest, ApiResponse};
use crate::actions::{NewUser, UserProfile};
use crate::auth::TokenInput;
use crate::db::schemas::{Identified, UserDoc};
use crate::server::AppState;
use crate::types::Result;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: u64,
    pub user: UserProfile,
}

fn issue_token(state: &AppState, user: &UserDoc) -> Result<AuthResponse> {
    let (token, expires_at) = state.jwt.generate_token(TokenInput {
        user_id: user.id()?,
        email: user.email.clone(),
        name: user.name.clone(),
    })?;
    Ok(AuthResponse {
        token,
        expires_at,
        user: UserProfile::from(user),
    })
}

/// POST /api/auth/register
pub async fn register(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let body: NewUser = parse_json(req)?;
    let user = state.desk.register(body).await?;
    Ok(json_response(StatusCode::CREATED, &issue_token(state, &user)?))
}

/// POST /api/auth/login
pub async fn login(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let body: LoginRequest = parse_json(req)?;
    let user = state.desk.login(&body.email, &body.password).await?;
    ok_json(&issue_token(state, &user)?)
}

/// GET /api/auth/me
pub async fn me(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    let actor = authenticate(state, req)?;
    ok_json(&state.desk.profile(&actor).await?)
}
