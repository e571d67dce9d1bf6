//! Accounts and login sessions.
//!
//! Passwords are stored as Argon2id PHC strings. A login hands out an opaque
//! bearer token; only its SHA-256 digest is persisted, so a leaked sessions
//! table can't be replayed.

mod password;
mod token;

use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use chrono::Utc;
use inkpad_core::{normalize_email, Identity};
use serde::Deserialize;

use crate::db::models::{NewUser, Session, User};
use crate::db::Store;
use crate::error::AppError;
use crate::AppState;

pub use password::{hash_password, verify_password, MIN_PASSWORD_LEN};
pub use token::{generate_token, hash_token};

/// Issued on successful login
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: String,
    pub session: Session,
    pub user: User,
}

/// Create an account
pub async fn register(
    store: &dyn Store,
    email: &str,
    username: &str,
    password: String,
) -> Result<User, AppError> {
    let email = normalize_email(email)?;
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username is required".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = hash_password(password).await?;
    let user = store
        .create_user(NewUser {
            email,
            username: username.to_string(),
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, "registered user");
    Ok(user)
}

/// Check credentials and open a session.
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn login(
    store: &dyn Store,
    email: &str,
    password: String,
    ttl: chrono::Duration,
) -> Result<LoginGrant, AppError> {
    let email = normalize_email(email).map_err(|_| AppError::Unauthorized)?;
    let Some(user) = store.find_user_by_email(&email).await? else {
        tracing::debug!("login for unknown email");
        return Err(AppError::Unauthorized);
    };
    if !verify_password(password, user.password_hash.clone()).await? {
        tracing::debug!(user_id = %user.id, "login with wrong password");
        return Err(AppError::Unauthorized);
    }

    let token = generate_token();
    let now = Utc::now();
    let session = Session {
        token_hash: hash_token(&token),
        user_id: user.id,
        created_at: now,
        expires_at: now + ttl,
    };
    store.create_session(session.clone()).await?;

    tracing::info!(user_id = %user.id, "session opened");
    Ok(LoginGrant {
        token,
        session,
        user,
    })
}

/// Resolve a bearer token to its user; expired sessions are removed
pub async fn authenticate(store: &dyn Store, token: &str) -> Result<(User, String), AppError> {
    let token_hash = hash_token(token);
    let session = store
        .find_session(&token_hash)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if session.is_expired(Utc::now()) {
        store.delete_session(&token_hash).await?;
        return Err(AppError::Unauthorized);
    }

    let user = store
        .find_user_by_id(session.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok((user, token_hash))
}

/// Bearer token from `Authorization`, or `?token=` for WebSocket upgrades
fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.token)
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Extractor for handlers that need a logged-in user
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token_hash: String,
}

impl AuthUser {
    pub fn identity(&self) -> Identity {
        self.user.identity()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or(AppError::Unauthorized)?;
        let (user, token_hash) = authenticate(state.store.as_ref(), &token).await?;
        Ok(AuthUser { user, token_hash })
    }
}
