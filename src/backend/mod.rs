//! Version-control history backends.
//!
//! Both variants resolve a project on the server, fetch one bounded page of
//! commit summaries, and hand back a [`CommitStream`] that fetches each
//! commit's file changes only when the consumer asks for it.

use async_trait::async_trait;

use crate::error::{ExportError, Result};
use crate::models::{BackendKind, CommitId, CommitResult, CommitSummary, FileChange};

pub mod changeset;
pub mod git;

pub use changeset::{ChangesetBackend, ChangesetSearch};
pub use git::{GitBackend, GitSearch};

/// Fetches the file-level change list of a single commit.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    async fn changes(&self, id: &CommitId) -> Result<Vec<FileChange>>;
}

#[async_trait]
pub trait HistoryBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Project (or repository) name used by [`HistoryBackend::commits`].
    fn project(&self) -> &str;

    /// Commits for the stored project and search criteria.
    async fn commits(&self) -> Result<CommitStream<'_>>;
}

/// Lazy, finite sequence of [`CommitResult`]s.
///
/// Summaries are already in memory; change lists are requested one at a time
/// from `next`. Once exhausted it cannot be restarted.
pub struct CommitStream<'a> {
    source: &'a dyn ChangeSource,
    pending: std::vec::IntoIter<CommitSummary>,
}

impl<'a> CommitStream<'a> {
    pub fn new(source: &'a dyn ChangeSource, summaries: Vec<CommitSummary>) -> Self {
        Self {
            source,
            pending: summaries.into_iter(),
        }
    }

    pub async fn next(&mut self) -> Option<Result<CommitResult>> {
        let summary = self.pending.next()?;
        let changes = match self.source.changes(&summary.id).await {
            Ok(changes) => changes,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok(summary.with_changes(changes)))
    }

    /// Commits not yet yielded.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub async fn collect(mut self) -> Result<Vec<CommitResult>> {
        let mut out = Vec::with_capacity(self.remaining());
        while let Some(commit) = self.next().await {
            out.push(commit?);
        }
        Ok(out)
    }
}

/// Pick the single item whose name equals `name` exactly.
pub fn resolve_unique<'a, T, F>(items: &'a [T], name: &str, name_of: F) -> Result<&'a T>
where
    F: Fn(&T) -> &str,
{
    let mut matches = items.iter().filter(|item| name_of(item) == name);
    match (matches.next(), matches.count()) {
        (Some(item), 0) => Ok(item),
        (first, rest) => Err(ExportError::ProjectNotFound {
            name: name.to_string(),
            matches: usize::from(first.is_some()) + rest,
        }),
    }
}

pub(crate) fn require_project(project: &str) -> Result<&str> {
    let project = project.trim();
    if project.is_empty() {
        return Err(ExportError::empty_project());
    }
    Ok(project)
}

/// Wire shapes shared by both REST families.
pub(crate) mod wire {
    use serde::Deserialize;

    /// `{ "count": n, "value": [...] }` envelope used by list endpoints.
    #[derive(Debug, Deserialize)]
    pub struct ListResponse<T> {
        #[serde(default = "Vec::new")]
        pub value: Vec<T>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ItemModel {
        #[serde(default)]
        pub path: String,
        #[serde(default)]
        pub is_folder: Option<bool>,
        #[serde(default)]
        pub git_object_type: Option<String>,
    }

    impl ItemModel {
        pub fn is_folder(&self) -> bool {
            self.is_folder
                .unwrap_or_else(|| self.git_object_type.as_deref() == Some("tree"))
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawChange {
        pub item: ItemModel,
        #[serde(default)]
        pub change_type: String,
    }
}

pub(crate) fn normalize_changes(raw: &[wire::RawChange]) -> Vec<FileChange> {
    raw.iter()
        .map(|c| FileChange {
            path: c.item.path.clone(),
            kind: crate::models::ChangeKind(c.change_type.clone()),
            is_folder: c.item.is_folder(),
        })
        .collect()
}
