use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use inkpad_core::{Mutation, Notebook, Permission};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppJson;
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::AppState;

/// Request to create a new notebook
#[derive(Debug, Deserialize)]
pub struct CreateNotebookRequest {
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Full-content replace
#[derive(Debug, Deserialize)]
pub struct ReplaceContentRequest {
    #[serde(default)]
    pub content: Option<String>,
}

/// Partial update: optional content and/or one sketch to append
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUpdateRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub sketch_data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    #[serde(default)]
    pub notebook_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub permission: Option<Permission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteRequest {
    #[serde(default)]
    pub notebook_id: Option<String>,
}

/// Response for invitation operations
#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub message: &'static str,
    pub notebook: Notebook,
}

fn missing_fields() -> AppError {
    AppError::BadRequest("Missing required fields".to_string())
}

/// Ids arrive as strings in paths and bodies; an unparsable one can't name a notebook
fn parse_notebook_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::NotFound("Notebook not found or unauthorized".to_string()))
}

/// List owned and shared notebooks
async fn list_notebooks(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Notebook>>, AppError> {
    let notebooks = state.notebooks.list(&auth.identity()).await?;
    Ok(Json(notebooks))
}

/// Create a new notebook
async fn create_notebook(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(req): AppJson<CreateNotebookRequest>,
) -> Result<(StatusCode, Json<Notebook>), AppError> {
    let notebook = state
        .notebooks
        .create(&auth.identity(), &req.title, req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(notebook)))
}

/// Get a notebook by ID
async fn get_notebook(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Notebook>, AppError> {
    let id = parse_notebook_id(&raw_id)?;
    let notebook = state.notebooks.get(id, &auth.identity()).await?;
    Ok(Json(notebook))
}

/// Replace the content wholesale
async fn replace_content(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(raw_id): Path<String>,
    AppJson(req): AppJson<ReplaceContentRequest>,
) -> Result<Json<Notebook>, AppError> {
    let id = parse_notebook_id(&raw_id)?;
    let mutations = Mutation::replace(req.content)?;
    let notebook = state
        .notebooks
        .update(id, &auth.identity(), mutations)
        .await?;
    Ok(Json(notebook))
}

/// Replace content and/or append a sketch
async fn partial_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(raw_id): Path<String>,
    AppJson(req): AppJson<PartialUpdateRequest>,
) -> Result<Json<Notebook>, AppError> {
    let id = parse_notebook_id(&raw_id)?;
    let mutations = Mutation::partial(req.content, req.sketch_data)?;
    let notebook = state
        .notebooks
        .update(id, &auth.identity(), mutations)
        .await?;
    Ok(Json(notebook))
}

/// Owner invites a collaborator by email
async fn invite(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(req): AppJson<InviteRequest>,
) -> Result<Json<InvitationResponse>, AppError> {
    let (Some(raw_id), Some(email)) = (req.notebook_id, req.email) else {
        return Err(missing_fields());
    };
    if raw_id.trim().is_empty() || email.trim().is_empty() {
        return Err(missing_fields());
    }
    let id = parse_notebook_id(&raw_id)?;

    let notebook = state
        .notebooks
        .invite(id, &auth.identity(), &email, req.permission)
        .await?;
    Ok(Json(InvitationResponse {
        message: "Invitation sent successfully",
        notebook,
    }))
}

/// Invitee accepts a pending invitation
async fn accept_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(req): AppJson<AcceptInviteRequest>,
) -> Result<Json<InvitationResponse>, AppError> {
    let raw_id = req
        .notebook_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(missing_fields)?;
    let id = parse_notebook_id(&raw_id)?;

    let notebook = state.notebooks.accept(id, &auth.identity()).await?;
    Ok(Json(InvitationResponse {
        message: "Invitation accepted",
        notebook,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notebooks", get(list_notebooks).post(create_notebook))
        .route(
            "/notebooks/{id}",
            get(get_notebook).patch(replace_content).put(partial_update),
        )
        .route("/notebooks/invite", post(invite))
        .route("/notebooks/accept-invite", post(accept_invite))
}
