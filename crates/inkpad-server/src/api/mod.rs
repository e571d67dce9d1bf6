mod auth;
mod extract;
mod health;
mod notebooks;

use axum::Router;

use crate::AppState;

pub use extract::AppJson;

/// Create the API router
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(notebooks::router())
}
