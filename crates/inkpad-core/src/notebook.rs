use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NotebookError;
use crate::identity::UserRef;
use crate::mutation::Mutation;

/// What an accepted collaborator may do with a notebook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => write!(f, "read"),
            Permission::Write => write!(f, "write"),
        }
    }
}

impl FromStr for Permission {
    type Err = NotebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            other => Err(NotebookError::invalid(format!("unknown permission '{}'", other))),
        }
    }
}

/// Where a collaborator entry sits in the invitation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InviteStatus::Pending => write!(f, "pending"),
            InviteStatus::Accepted => write!(f, "accepted"),
        }
    }
}

impl FromStr for InviteStatus {
    type Err = NotebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(InviteStatus::Pending),
            "accepted" => Ok(InviteStatus::Accepted),
            other => Err(NotebookError::invalid(format!("unknown invite status '{}'", other))),
        }
    }
}

/// A collaborator entry, logically keyed by email within its notebook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub email: String,
    /// Resolved account, if the invitee had one at invite time or has accepted
    pub user_id: Option<Uuid>,
    pub permission: Permission,
    pub status: InviteStatus,
    pub invited_at: DateTime<Utc>,
}

impl Collaborator {
    pub fn is_accepted(&self) -> bool {
        self.status == InviteStatus::Accepted
    }
}

/// One saved canvas state; history is append-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchSnapshot {
    /// Encoded image payload (typically a data URL), stored opaquely
    pub data: String,
    pub created_at: DateTime<Utc>,
}

/// A shared document of free text plus sketch history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub owner: UserRef,
    pub collaborators: Vec<Collaborator>,
    pub sketches: Vec<SketchSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notebook {
    /// Build a fresh notebook owned by `owner`
    pub fn create(id: Uuid, owner: UserRef, draft: NewNotebook, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            content: draft.content,
            owner,
            collaborators: Vec::new(),
            sketches: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up the collaborator entry for a normalized email
    pub fn collaborator(&self, email: &str) -> Option<&Collaborator> {
        self.collaborators.iter().find(|c| c.email == email)
    }

    pub(crate) fn collaborator_mut(&mut self, email: &str) -> Option<&mut Collaborator> {
        self.collaborators.iter_mut().find(|c| c.email == email)
    }

    /// Apply mutations in order and stamp the update time.
    ///
    /// An empty slice still counts as an update.
    pub fn apply(&mut self, mutations: &[Mutation], now: DateTime<Utc>) {
        for mutation in mutations {
            match mutation {
                Mutation::ReplaceContent(content) => self.content = content.clone(),
                Mutation::AppendSketch(data) => self.sketches.push(SketchSnapshot {
                    data: data.clone(),
                    created_at: now,
                }),
            }
        }
        self.updated_at = now;
    }

    /// What an invitee may see before they are allowed to read: the
    /// notebook's identity and their own entry, nothing else
    pub fn invitation_view(&self, email: &str) -> Notebook {
        Notebook {
            id: self.id,
            title: self.title.clone(),
            content: String::new(),
            owner: self.owner.clone(),
            collaborators: self.collaborator(email).cloned().into_iter().collect(),
            sketches: Vec::new(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Validated input for creating a notebook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotebook {
    pub title: String,
    pub content: String,
}

impl NewNotebook {
    pub fn new(title: &str, content: Option<String>) -> Result<Self, NotebookError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(NotebookError::invalid("title is required"));
        }
        Ok(Self {
            title: title.to_string(),
            content: content.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Notebook {
        let owner = UserRef {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@x.com".into(),
        };
        let draft = NewNotebook::new("Ideas", None).unwrap();
        Notebook::create(Uuid::new_v4(), owner, draft, Utc::now())
    }

    #[test]
    fn test_new_notebook_requires_title() {
        assert!(matches!(NewNotebook::new("   ", None), Err(NotebookError::InvalidInput(_))));
        let draft = NewNotebook::new("  Ideas ", Some("text".into())).unwrap();
        assert_eq!(draft.title, "Ideas");
        assert_eq!(draft.content, "text");
    }

    #[test]
    fn test_permission_round_trip_strings() {
        assert_eq!("write".parse::<Permission>().unwrap(), Permission::Write);
        assert_eq!(" READ ".parse::<Permission>().unwrap(), Permission::Read);
        assert!("admin".parse::<Permission>().is_err());
        assert_eq!(InviteStatus::Accepted.to_string(), "accepted");
        assert_eq!("pending".parse::<InviteStatus>().unwrap(), InviteStatus::Pending);
    }

    #[test]
    fn test_replace_content_last_writer_wins() {
        let mut nb = sample();
        nb.apply(&[Mutation::ReplaceContent("w1".into())], Utc::now());
        nb.apply(&[Mutation::ReplaceContent("w2".into())], Utc::now());
        assert_eq!(nb.content, "w2");
    }

    #[test]
    fn test_sketch_append_is_monotonic_and_ordered() {
        let mut nb = sample();
        for i in 0..3 {
            let before = nb.sketches.len();
            nb.apply(&[Mutation::AppendSketch(format!("s{}", i))], Utc::now());
            assert_eq!(nb.sketches.len(), before + 1);
        }
        let data: Vec<_> = nb.sketches.iter().map(|s| s.data.as_str()).collect();
        assert_eq!(data, vec!["s0", "s1", "s2"]);
    }

    #[test]
    fn test_empty_update_only_stamps_time() {
        let mut nb = sample();
        let later = nb.updated_at + chrono::Duration::seconds(5);
        nb.apply(&[], later);
        assert_eq!(nb.updated_at, later);
        assert_eq!(nb.content, "");
        assert!(nb.sketches.is_empty());
    }

    #[test]
    fn test_invitation_view_hides_content() {
        let mut nb = sample();
        nb.apply(
            &[
                Mutation::ReplaceContent("secret plans".into()),
                Mutation::AppendSketch("png".into()),
            ],
            Utc::now(),
        );
        for email in ["bob@x.com", "carol@x.com"] {
            nb.collaborators.push(Collaborator {
                email: email.into(),
                user_id: None,
                permission: Permission::Write,
                status: InviteStatus::Pending,
                invited_at: Utc::now(),
            });
        }

        let view = nb.invitation_view("bob@x.com");
        assert_eq!(view.id, nb.id);
        assert_eq!(view.title, "Ideas");
        assert_eq!(view.content, "");
        assert!(view.sketches.is_empty());
        assert_eq!(view.collaborators.len(), 1);
        assert_eq!(view.collaborators[0].email, "bob@x.com");
    }

    #[test]
    fn test_serializes_camel_case() {
        let nb = sample();
        let json = serde_json::to_value(&nb).unwrap();
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["owner"]["username"], "alice");
    }
}
