use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use inkpad_core::{
    Collaborator, InviteStatus, Mutation, NewNotebook, Notebook, NotebookError, UserRef,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{NewUser, Session, User};
use super::Store;
use crate::error::AppError;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    notebooks: HashMap<Uuid, Notebook>,
}

/// In-process store with the same guarantees as the SQL one.
///
/// Each operation holds the write lock for its whole duration, which gives
/// the same per-call atomicity as a transaction.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notebooks
    pub async fn notebook_count(&self) -> usize {
        self.tables.read().await.notebooks.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username);
        if taken {
            return Err(AppError::BadRequest(
                "Email or username already registered".to_string(),
            ));
        }

        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn create_session(&self, session: Session) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.sessions.insert(session.token_hash.clone(), session);
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>, AppError> {
        Ok(self.tables.read().await.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), AppError> {
        self.tables.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn create_notebook(
        &self,
        owner: &UserRef,
        draft: NewNotebook,
    ) -> Result<Notebook, AppError> {
        let notebook = Notebook::create(Uuid::new_v4(), owner.clone(), draft, Utc::now());
        let mut tables = self.tables.write().await;
        tables.notebooks.insert(notebook.id, notebook.clone());
        Ok(notebook)
    }

    async fn get_notebook(&self, id: Uuid) -> Result<Option<Notebook>, AppError> {
        Ok(self.tables.read().await.notebooks.get(&id).cloned())
    }

    async fn list_notebooks_for(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<Vec<Notebook>, AppError> {
        let tables = self.tables.read().await;
        let mut found: Vec<Notebook> = tables
            .notebooks
            .values()
            .filter(|n| n.owner.id == user_id || n.collaborator(email).is_some())
            .cloned()
            .collect();
        found.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(found)
    }

    async fn apply_mutations(
        &self,
        id: Uuid,
        mutations: &[Mutation],
    ) -> Result<Notebook, AppError> {
        let mut tables = self.tables.write().await;
        let notebook = tables.notebooks.get_mut(&id).ok_or(NotebookError::NotFound)?;
        notebook.apply(mutations, Utc::now());
        Ok(notebook.clone())
    }

    async fn insert_collaborator(
        &self,
        id: Uuid,
        entry: &Collaborator,
    ) -> Result<Notebook, AppError> {
        let mut tables = self.tables.write().await;
        let notebook = tables.notebooks.get_mut(&id).ok_or(NotebookError::NotFound)?;
        if notebook.collaborator(&entry.email).is_some() {
            return Err(NotebookError::AlreadyCollaborator(entry.email.clone()).into());
        }
        notebook.collaborators.push(entry.clone());
        Ok(notebook.clone())
    }

    async fn mark_accepted(
        &self,
        id: Uuid,
        email: &str,
        user_id: Uuid,
    ) -> Result<Notebook, AppError> {
        let mut tables = self.tables.write().await;
        let notebook = tables.notebooks.get_mut(&id).ok_or(NotebookError::NotFound)?;
        let entry = notebook
            .collaborators
            .iter_mut()
            .find(|c| c.email == email)
            .ok_or_else(|| NotebookError::InvitationNotFound(email.to_string()))?;
        entry.status = InviteStatus::Accepted;
        entry.user_id = Some(user_id);
        Ok(notebook.clone())
    }
}
