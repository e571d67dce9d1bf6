use chrono::{DateTime, Utc};
use inkpad_core::{Collaborator, Identity, InviteStatus, Permission, SketchSnapshot, UserRef};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

/// Registered account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.email.clone(), self.username.clone())
    }

    pub fn user_ref(&self) -> UserRef {
        UserRef {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// Account fields safe to send to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            created_at: user.created_at,
        }
    }
}

/// Input for a new account; the email is already normalized
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

/// Login session, keyed by the digest of its bearer token
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Notebook row joined with its owner
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotebookRow {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub owner_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Collaborator row; permission and status are stored as text
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollaboratorRow {
    pub notebook_id: Uuid,
    pub email: String,
    pub user_id: Option<Uuid>,
    pub permission: String,
    pub status: String,
    pub invited_at: DateTime<Utc>,
}

impl TryFrom<CollaboratorRow> for Collaborator {
    type Error = AppError;

    fn try_from(row: CollaboratorRow) -> Result<Self, Self::Error> {
        let permission: Permission = row
            .permission
            .parse()
            .map_err(|e| AppError::Internal(format!("stored permission: {}", e)))?;
        let status: InviteStatus = row
            .status
            .parse()
            .map_err(|e| AppError::Internal(format!("stored status: {}", e)))?;
        Ok(Collaborator {
            email: row.email,
            user_id: row.user_id,
            permission,
            status,
            invited_at: row.invited_at,
        })
    }
}

/// Sketch history row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SketchRow {
    pub notebook_id: Uuid,
    pub data: String,
    pub created_at: DateTime<Utc>,
}

impl From<SketchRow> for SketchSnapshot {
    fn from(row: SketchRow) -> Self {
        SketchSnapshot {
            data: row.data,
            created_at: row.created_at,
        }
    }
}
