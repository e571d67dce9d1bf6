pub mod access;
pub mod error;
pub mod identity;
pub mod invitation;
pub mod mutation;
pub mod notebook;

pub use access::{can_read, can_write, AccessLevel, AccessPolicy};
pub use error::NotebookError;
pub use identity::{normalize_email, Identity, UserRef};
pub use invitation::{AcceptOutcome, InvitationPolicy};
pub use mutation::Mutation;
pub use notebook::{
    Collaborator, InviteStatus, NewNotebook, Notebook, Permission, SketchSnapshot,
};
