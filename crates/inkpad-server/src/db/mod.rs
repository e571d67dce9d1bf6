pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use inkpad_core::{Collaborator, Mutation, NewNotebook, Notebook, UserRef};
use uuid::Uuid;

use crate::error::AppError;
use models::{NewUser, Session, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence for users, sessions and notebooks.
///
/// Every method is one independent, atomic operation; callers decide access
/// before calling in.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert an account; duplicate email or username is a bad request
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn create_session(&self, session: Session) -> Result<(), AppError>;

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, AppError>;

    async fn delete_session(&self, token_hash: &str) -> Result<(), AppError>;

    async fn create_notebook(&self, owner: &UserRef, draft: NewNotebook)
        -> Result<Notebook, AppError>;

    async fn get_notebook(&self, id: Uuid) -> Result<Option<Notebook>, AppError>;

    /// Notebooks owned by the user or carrying an entry for their email,
    /// most recently updated first
    async fn list_notebooks_for(&self, user_id: Uuid, email: &str)
        -> Result<Vec<Notebook>, AppError>;

    /// Apply mutations in order as one unit and stamp `updated_at`
    async fn apply_mutations(&self, id: Uuid, mutations: &[Mutation])
        -> Result<Notebook, AppError>;

    /// Add a collaborator entry; unique per (notebook, email)
    async fn insert_collaborator(&self, id: Uuid, entry: &Collaborator)
        -> Result<Notebook, AppError>;

    /// Mark the entry for `email` accepted and record the accepting account
    async fn mark_accepted(&self, id: Uuid, email: &str, user_id: Uuid)
        -> Result<Notebook, AppError>;
}
