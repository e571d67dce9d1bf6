use serde::{Deserialize, Serialize};

use crate::error::NotebookError;

/// A single change to a notebook's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Mutation {
    /// Replace the whole text; last writer wins
    ReplaceContent(String),
    /// Append a snapshot to the sketch history
    AppendSketch(String),
}

impl Mutation {
    /// Mutations for a full-content replace; content is mandatory
    pub fn replace(content: Option<String>) -> Result<Vec<Mutation>, NotebookError> {
        let content = content.ok_or_else(|| NotebookError::invalid("content is required"))?;
        Ok(vec![Mutation::ReplaceContent(content)])
    }

    /// Mutations for a partial update.
    ///
    /// Either part may be absent; with neither, the update only bumps the
    /// timestamp.
    pub fn partial(
        content: Option<String>,
        sketch: Option<String>,
    ) -> Result<Vec<Mutation>, NotebookError> {
        let mut out = Vec::with_capacity(2);
        if let Some(content) = content {
            out.push(Mutation::ReplaceContent(content));
        }
        if let Some(sketch) = sketch {
            if sketch.is_empty() {
                return Err(NotebookError::invalid("sketch data must not be empty"));
            }
            out.push(Mutation::AppendSketch(sketch));
        }
        Ok(out)
    }
}
