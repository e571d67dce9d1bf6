use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NotebookError;

/// The authenticated requester of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    /// Normalized (lowercase) email
    pub email: String,
    pub username: String,
}

impl Identity {
    pub fn new(user_id: Uuid, email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            username: username.into(),
        }
    }

    pub fn as_user_ref(&self) -> UserRef {
        UserRef {
            id: self.user_id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// Public projection of a user, embedded wherever a user is referenced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// Trim and lowercase an email address, rejecting anything not shaped like one.
///
/// Every email that reaches storage or a collaborator lookup goes through here,
/// so matching is effectively case-insensitive.
pub fn normalize_email(raw: &str) -> Result<String, NotebookError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(NotebookError::invalid("email is required"));
    }
    if !email_pattern().is_match(&email) {
        return Err(NotebookError::invalid(format!("'{}' is not a valid email", raw.trim())));
    }
    Ok(email)
}
