use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::access::is_owner;
use crate::error::NotebookError;
use crate::identity::{normalize_email, Identity};
use crate::notebook::{Collaborator, InviteStatus, Notebook, Permission};

/// Settings applied when an invite does not say which permission to grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvitationPolicy {
    pub default_permission: Permission,
}

impl Default for InvitationPolicy {
    fn default() -> Self {
        Self {
            default_permission: Permission::Write,
        }
    }
}

impl InvitationPolicy {
    pub fn permission_or_default(&self, requested: Option<Permission>) -> Permission {
        requested.unwrap_or(self.default_permission)
    }
}

/// Result of accepting an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    AlreadyAccepted,
}

impl Notebook {
    /// Add a pending collaborator entry.
    ///
    /// Only the owner may invite, and each email may appear once per notebook
    /// regardless of the existing entry's status.
    pub fn invite(
        &mut self,
        inviter: &Identity,
        email: &str,
        permission: Permission,
        invitee: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Collaborator, NotebookError> {
        if !is_owner(self, inviter) {
            return Err(NotebookError::Forbidden);
        }
        let email = normalize_email(email)?;
        if email == self.owner.email {
            return Err(NotebookError::invalid("the owner cannot be invited"));
        }
        if self.collaborator(&email).is_some() {
            return Err(NotebookError::AlreadyCollaborator(email));
        }

        let entry = Collaborator {
            email,
            user_id: invitee,
            permission,
            status: InviteStatus::Pending,
            invited_at: now,
        };
        self.collaborators.push(entry.clone());
        Ok(entry)
    }

    /// Move the identity's entry to accepted and record their account.
    ///
    /// Accepting twice is harmless; the entry stays accepted.
    pub fn accept_invitation(&mut self, who: &Identity) -> Result<AcceptOutcome, NotebookError> {
        let entry = self
            .collaborator_mut(&who.email)
            .ok_or_else(|| NotebookError::InvitationNotFound(who.email.clone()))?;

        entry.user_id = Some(who.user_id);
        match entry.status {
            InviteStatus::Accepted => Ok(AcceptOutcome::AlreadyAccepted),
            InviteStatus::Pending => {
                entry.status = InviteStatus::Accepted;
                Ok(AcceptOutcome::Accepted)
            }
        }
    }
}
