use thiserror::Error;

use crate::models::BackendKind;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("project not found: '{name}' ({matches} matches)")]
    ProjectNotFound { name: String, matches: usize },

    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("no history backend registered for {0}")]
    NotImplemented(BackendKind),

    #[error("remote resource not found: {0}")]
    NotFound(String),

    #[error("remote server returned {status} for {url}")]
    Remote {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),
}

impl ExportError {
    pub(crate) fn empty_project() -> Self {
        ExportError::InvalidArgument {
            name: "project",
            reason: "must not be empty or whitespace".to_string(),
        }
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;
