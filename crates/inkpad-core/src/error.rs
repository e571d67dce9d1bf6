use thiserror::Error;

/// Failures raised by notebook rules before anything touches storage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotebookError {
    /// No notebook with the requested id
    #[error("Notebook not found")]
    NotFound,

    /// Requester is authenticated but lacks the needed access
    #[error("Access denied")]
    Forbidden,

    /// An entry for this email already exists on the notebook
    #[error("{0} is already a collaborator")]
    AlreadyCollaborator(String),

    /// No invitation for this email on the notebook
    #[error("No invitation for {0}")]
    InvitationNotFound(String),

    /// Missing or malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl NotebookError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        NotebookError::InvalidInput(msg.into())
    }
}
