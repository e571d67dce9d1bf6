//! Who may read or write a notebook.
//!
//! The owner always has full access. A collaborator's access follows their
//! entry: any entry grants read (unless the policy hides pending invitees),
//! and only an accepted entry with write permission grants write. A pending
//! entry never grants write, whatever its permission says.

use serde::{Deserialize, Serialize};

use crate::error::NotebookError;
use crate::identity::Identity;
use crate::notebook::{InviteStatus, Notebook, Permission};

/// Effective access an identity holds on a notebook
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    None,
    Read,
    Write,
}

impl AccessLevel {
    pub fn can_read(self) -> bool {
        self >= AccessLevel::Read
    }

    pub fn can_write(self) -> bool {
        self == AccessLevel::Write
    }
}

/// Tunable part of the read rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Whether an invitee can read before accepting
    pub pending_can_read: bool,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            pending_can_read: true,
        }
    }
}

impl AccessPolicy {
    pub fn level(&self, notebook: &Notebook, who: &Identity) -> AccessLevel {
        if is_owner(notebook, who) {
            return AccessLevel::Write;
        }
        match notebook.collaborator(&who.email) {
            None => AccessLevel::None,
            Some(c) => match (c.status, c.permission) {
                (InviteStatus::Accepted, Permission::Write) => AccessLevel::Write,
                (InviteStatus::Accepted, Permission::Read) => AccessLevel::Read,
                (InviteStatus::Pending, _) if self.pending_can_read => AccessLevel::Read,
                (InviteStatus::Pending, _) => AccessLevel::None,
            },
        }
    }

    pub fn authorize_read(&self, notebook: &Notebook, who: &Identity) -> Result<(), NotebookError> {
        if self.level(notebook, who).can_read() {
            Ok(())
        } else {
            Err(NotebookError::Forbidden)
        }
    }

    pub fn authorize_write(&self, notebook: &Notebook, who: &Identity) -> Result<(), NotebookError> {
        if self.level(notebook, who).can_write() {
            Ok(())
        } else {
            Err(NotebookError::Forbidden)
        }
    }
}

pub fn is_owner(notebook: &Notebook, who: &Identity) -> bool {
    notebook.owner.id == who.user_id
}

/// Owner, or any collaborator entry for the identity's email regardless of status
pub fn can_read(notebook: &Notebook, who: &Identity) -> bool {
    AccessPolicy::default().level(notebook, who).can_read()
}

/// Owner, or an accepted collaborator with write permission
pub fn can_write(notebook: &Notebook, who: &Identity) -> bool {
    AccessPolicy::default().level(notebook, who).can_write()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserRef;
    use crate::notebook::{Collaborator, NewNotebook};
    use chrono::Utc;
    use uuid::Uuid;

    fn identity(name: &str) -> Identity {
        Identity::new(Uuid::new_v4(), format!("{}@x.com", name), name)
    }

    fn notebook_owned_by(owner: &Identity) -> Notebook {
        Notebook::create(
            Uuid::new_v4(),
            owner.as_user_ref(),
            NewNotebook::new("Ideas", None).unwrap(),
            Utc::now(),
        )
    }

    fn with_entry(nb: &mut Notebook, email: &str, permission: Permission, status: InviteStatus) {
        nb.collaborators.push(Collaborator {
            email: email.to_string(),
            user_id: None,
            permission,
            status,
            invited_at: Utc::now(),
        });
    }

    #[test]
    fn test_owner_has_full_access() {
        let alice = identity("alice");
        let nb = notebook_owned_by(&alice);
        assert!(can_read(&nb, &alice));
        assert!(can_write(&nb, &alice));
    }

    #[test]
    fn test_owner_matched_by_id_not_email() {
        let alice = identity("alice");
        let nb = notebook_owned_by(&alice);
        let impostor = Identity::new(Uuid::new_v4(), "alice@x.com", "mallory");
        assert!(!can_read(&nb, &impostor));
    }

    #[test]
    fn test_stranger_has_no_access() {
        let alice = identity("alice");
        let eve = identity("eve");
        let nb = notebook_owned_by(&alice);
        assert!(!can_read(&nb, &eve));
        assert!(!can_write(&nb, &eve));
        assert_eq!(AccessPolicy::default().level(&nb, &eve), AccessLevel::None);
    }

    #[test]
    fn test_access_matrix_for_collaborators() {
        let alice = identity("alice");
        let bob = identity("bob");
        let cases = [
            (Permission::Read, InviteStatus::Pending, true, false),
            (Permission::Write, InviteStatus::Pending, true, false),
            (Permission::Read, InviteStatus::Accepted, true, false),
            (Permission::Write, InviteStatus::Accepted, true, true),
        ];
        for (permission, status, read, write) in cases {
            let mut nb = notebook_owned_by(&alice);
            with_entry(&mut nb, &bob.email, permission, status);
            assert_eq!(can_read(&nb, &bob), read, "{:?}/{:?} read", permission, status);
            assert_eq!(can_write(&nb, &bob), write, "{:?}/{:?} write", permission, status);
        }
    }

    #[test]
    fn test_other_collaborators_entries_do_not_leak() {
        let alice = identity("alice");
        let bob = identity("bob");
        let carol = identity("carol");
        let mut nb = notebook_owned_by(&alice);
        with_entry(&mut nb, &carol.email, Permission::Write, InviteStatus::Accepted);
        assert!(!can_read(&nb, &bob));
        assert!(!can_write(&nb, &bob));
    }

    #[test]
    fn test_pending_hidden_when_policy_disallows() {
        let alice = identity("alice");
        let bob = identity("bob");
        let mut nb = notebook_owned_by(&alice);
        with_entry(&mut nb, &bob.email, Permission::Write, InviteStatus::Pending);

        let strict = AccessPolicy {
            pending_can_read: false,
        };
        assert_eq!(strict.level(&nb, &bob), AccessLevel::None);
        assert_eq!(strict.authorize_read(&nb, &bob), Err(NotebookError::Forbidden));
        // accepted readers are unaffected
        nb.collaborators[0].status = InviteStatus::Accepted;
        assert_eq!(strict.level(&nb, &bob), AccessLevel::Write);
    }

    #[test]
    fn test_authorize_write_rejects_reader() {
        let alice = identity("alice");
        let bob = identity("bob");
        let mut nb = notebook_owned_by(&alice);
        with_entry(&mut nb, &bob.email, Permission::Read, InviteStatus::Accepted);
        let policy = AccessPolicy::default();
        assert!(policy.authorize_read(&nb, &bob).is_ok());
        assert_eq!(policy.authorize_write(&nb, &bob), Err(NotebookError::Forbidden));
    }
}
