use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which flavour of version-control history a backend serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(alias = "Tfs", alias = "tfs", alias = "changeset")]
    ChangesetStyle,
    #[serde(alias = "Git", alias = "git")]
    GitStyle,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::ChangesetStyle => f.write_str("Tfs"),
            BackendKind::GitStyle => f.write_str("Git"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tfs" | "tfvc" | "changeset" | "changesetstyle" => Ok(BackendKind::ChangesetStyle),
            "git" | "gitstyle" => Ok(BackendKind::GitStyle),
            other => Err(format!("unknown version control type '{}'", other)),
        }
    }
}

/// Remote identifier of a commit, as needed to fetch its change list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitId {
    Changeset(i64),
    Git { repository_id: String, sha: String },
}

/// A commit or changeset before its file changes have been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub id: CommitId,
    pub committer: String,
    pub created: DateTime<Utc>,
    pub comment: String,
}

impl CommitSummary {
    pub fn with_changes(self, changes: Vec<FileChange>) -> CommitResult {
        CommitResult {
            committer: self.committer,
            created: self.created,
            comment: self.comment,
            changes,
        }
    }
}

/// Change type as reported by the server (`add`, `edit`, `delete, source rename`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeKind(pub String);

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    pub is_folder: bool,
}

/// Backend-independent shape of one commit and its file-level changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    pub committer: String,
    pub created: DateTime<Utc>,
    pub comment: String,
    pub changes: Vec<FileChange>,
}
