use std::sync::Arc;

use chrono::Utc;
use inkpad_core::{
    AcceptOutcome, AccessLevel, AccessPolicy, Identity, InvitationPolicy, Mutation, NewNotebook,
    Notebook, NotebookError, Permission,
};
use uuid::Uuid;

use crate::db::Store;
use crate::error::AppError;

/// Notebook operations with access checks applied before every store call
#[derive(Clone)]
pub struct NotebookService {
    store: Arc<dyn Store>,
    access: AccessPolicy,
    invitations: InvitationPolicy,
}

impl NotebookService {
    pub fn new(store: Arc<dyn Store>, access: AccessPolicy, invitations: InvitationPolicy) -> Self {
        Self {
            store,
            access,
            invitations,
        }
    }

    async fn load(&self, id: Uuid) -> Result<Notebook, AppError> {
        self.store
            .get_notebook(id)
            .await?
            .ok_or_else(|| NotebookError::NotFound.into())
    }

    /// Notebooks the identity owns or has an entry on.
    ///
    /// Entries the identity may not read yet are reduced to their invitation view.
    pub async fn list(&self, who: &Identity) -> Result<Vec<Notebook>, AppError> {
        let notebooks = self.store.list_notebooks_for(who.user_id, &who.email).await?;
        Ok(notebooks
            .into_iter()
            .map(|notebook| match self.access.level(&notebook, who) {
                AccessLevel::None => notebook.invitation_view(&who.email),
                _ => notebook,
            })
            .collect())
    }

    pub async fn get(&self, id: Uuid, who: &Identity) -> Result<Notebook, AppError> {
        let notebook = self.load(id).await?;
        self.access.authorize_read(&notebook, who).inspect_err(|_| {
            tracing::debug!(notebook_id = %id, user_id = %who.user_id, "read denied");
        })?;
        Ok(notebook)
    }

    pub async fn create(
        &self,
        who: &Identity,
        title: &str,
        content: Option<String>,
    ) -> Result<Notebook, AppError> {
        let draft = NewNotebook::new(title, content)?;
        let notebook = self.store.create_notebook(&who.as_user_ref(), draft).await?;
        tracing::info!(notebook_id = %notebook.id, owner = %who.user_id, "notebook created");
        Ok(notebook)
    }

    /// Authorize a write, then apply all mutations as one unit
    pub async fn update(
        &self,
        id: Uuid,
        who: &Identity,
        mutations: Vec<Mutation>,
    ) -> Result<Notebook, AppError> {
        let notebook = self.load(id).await?;
        self.access.authorize_write(&notebook, who).inspect_err(|_| {
            tracing::debug!(notebook_id = %id, user_id = %who.user_id, "write denied");
        })?;
        self.store.apply_mutations(id, &mutations).await
    }

    /// Owner invites an email; the invitee's account is linked if it exists
    pub async fn invite(
        &self,
        id: Uuid,
        who: &Identity,
        email: &str,
        permission: Option<Permission>,
    ) -> Result<Notebook, AppError> {
        let mut notebook = self.load(id).await?;
        let permission = self.invitations.permission_or_default(permission);

        let invitee = match inkpad_core::normalize_email(email) {
            Ok(normalized) => self.store.find_user_by_email(&normalized).await?,
            Err(_) => None,
        };
        let entry = notebook.invite(who, email, permission, invitee.map(|u| u.id), Utc::now())?;

        let updated = self.store.insert_collaborator(id, &entry).await?;
        tracing::info!(
            notebook_id = %id,
            invitee = %entry.email,
            permission = %entry.permission,
            "collaborator invited"
        );
        Ok(updated)
    }

    /// Invitee accepts; repeating is a no-op
    pub async fn accept(&self, id: Uuid, who: &Identity) -> Result<Notebook, AppError> {
        let mut notebook = self.load(id).await?;
        match notebook.accept_invitation(who)? {
            AcceptOutcome::AlreadyAccepted => {
                tracing::debug!(notebook_id = %id, user_id = %who.user_id, "invitation already accepted");
            }
            AcceptOutcome::Accepted => {
                tracing::info!(notebook_id = %id, user_id = %who.user_id, "invitation accepted");
            }
        }
        self.store.mark_accepted(id, &who.email, who.user_id).await
    }

    /// Effective access, treating a missing notebook as no access
    pub async fn access_level(&self, id: Uuid, who: &Identity) -> Result<AccessLevel, AppError> {
        match self.store.get_notebook(id).await? {
            Some(notebook) => Ok(self.access.level(&notebook, who)),
            None => Ok(AccessLevel::None),
        }
    }
}
