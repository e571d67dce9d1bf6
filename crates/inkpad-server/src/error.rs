use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use inkpad_core::NotebookError;
use serde_json::json;
use thiserror::Error;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),
}

impl From<NotebookError> for AppError {
    fn from(err: NotebookError) -> Self {
        match err {
            // Denials look like missing notebooks so existence doesn't leak
            NotebookError::NotFound | NotebookError::Forbidden => {
                AppError::NotFound("Notebook not found or unauthorized".to_string())
            }
            NotebookError::InvitationNotFound(_) => {
                AppError::NotFound("Notebook not found or unauthorized".to_string())
            }
            NotebookError::AlreadyCollaborator(_) => {
                AppError::BadRequest("User is already a collaborator".to_string())
            }
            NotebookError::InvalidInput(msg) => AppError::BadRequest(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            // Any body the JSON extractor refuses is an input error
            AppError::InvalidBody(rejection) => {
                tracing::debug!("Rejected request body: {}", rejection);
                (StatusCode::BAD_REQUEST, rejection.body_text())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
