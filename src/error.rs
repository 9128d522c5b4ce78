//! Domain error taxonomy.
//!
//! [`HarnessError`] is what the task registry, orchestrator, query facade
//! and store collaborators return. The HTTP layer maps each variant to a
//! status code; application plumbing (config, CLI) stays on `anyhow`.

use thiserror::Error;

use crate::models::TaskStatus;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Malformed URL or parameters, rejected before any state is touched.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("crawl task with ID {0} not found")]
    TaskNotFound(String),

    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),

    /// A status change that would move a task backwards or out of a
    /// terminal state.
    #[error("task {task_id}: cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// The crawl engine or vector store failed.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl HarnessError {
    pub fn invalid(message: impl Into<String>) -> Self {
        HarnessError::InvalidRequest(message.into())
    }
}

impl From<sqlx::Error> for HarnessError {
    fn from(err: sqlx::Error) -> Self {
        HarnessError::Collaborator(err.into())
    }
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
