use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppJson;
use crate::auth::{self, AuthUser};
use crate::db::models::UserProfile;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

/// Create an account
async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let user = auth::register(state.store.as_ref(), &req.email, &req.username, req.password).await?;
    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

/// Exchange credentials for a bearer token
async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let grant = auth::login(
        state.store.as_ref(),
        &req.email,
        req.password,
        state.config.session_ttl,
    )
    .await?;
    Ok(Json(LoginResponse {
        token: grant.token,
        expires_at: grant.session.expires_at,
        user: UserProfile::from(&grant.user),
    }))
}

/// End the presented session
async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode, AppError> {
    state.store.delete_session(&auth.token_hash).await?;
    tracing::info!(user_id = %auth.user.id, "session closed");
    Ok(StatusCode::NO_CONTENT)
}

async fn me(auth: AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&auth.user))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}
