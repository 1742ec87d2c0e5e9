use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::wire::{ListResponse, RawChange};
use super::{
    normalize_changes, require_project, resolve_unique, ChangeSource, CommitStream, HistoryBackend,
};
use crate::config::AppConfig;
use crate::connection::{Connection, Credential};
use crate::error::{ExportError, Result};
use crate::models::{BackendKind, CommitId, CommitSummary, FileChange};

pub const DEFAULT_BRANCH: &str = "master";

/// Commit query for one branch. `top` is forwarded to the server as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSearch {
    pub branch: String,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub top: Option<i64>,
}

impl Default for GitSearch {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            from_date: None,
            to_date: None,
            top: None,
        }
    }
}

impl GitSearch {
    pub fn new(branch: Option<&str>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        let branch = branch
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BRANCH);

        Self {
            branch: branch.to_string(),
            from_date: from.map(|d| d.format("%Y-%m-%d").to_string()),
            to_date: to.map(|d| d.format("%Y-%m-%d").to_string()),
            top: None,
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("searchCriteria.itemVersion.version", self.branch.clone()),
            ("searchCriteria.itemVersion.versionType", "branch".to_string()),
        ];
        if let Some(from) = &self.from_date {
            query.push(("searchCriteria.fromDate", from.clone()));
        }
        if let Some(to) = &self.to_date {
            query.push(("searchCriteria.toDate", to.clone()));
        }
        if let Some(top) = self.top {
            query.push(("searchCriteria.$top", top.to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GitRepository {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GitUserDate {
    #[serde(default)]
    name: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitCommitRef {
    commit_id: String,
    committer: GitUserDate,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitCommitChanges {
    #[serde(default)]
    changes: Vec<RawChange>,
}

fn summarize(repository_id: &str, raw: &GitCommitRef) -> CommitSummary {
    CommitSummary {
        id: CommitId::Git {
            repository_id: repository_id.to_string(),
            sha: raw.commit_id.clone(),
        },
        committer: raw.committer.name.clone(),
        created: raw.committer.date,
        comment: raw.comment.clone().unwrap_or_default(),
    }
}

/// History backend for Git repositories hosted on the server.
pub struct GitBackend {
    connection: Connection,
    project: String,
    search: GitSearch,
}

impl GitBackend {
    pub fn new(connection: Connection, project: impl Into<String>, search: GitSearch) -> Self {
        Self {
            connection,
            project: project.into(),
            search,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let credential = Credential::resolve(&config.credential);
        let connection = Connection::open(&config.server_url, credential)?;
        let search = GitSearch::new(
            config.git_branch.as_deref(),
            config.search.from_date,
            config.search.to_date,
        );

        let mut backend = Self::new(connection, config.project.clone(), search);
        backend.set_top(config.search.top);
        Ok(backend)
    }

    pub fn top(&self) -> Option<i64> {
        self.search.top
    }

    pub fn set_top(&mut self, top: Option<i64>) {
        self.search.top = top;
    }

    pub fn search(&self) -> &GitSearch {
        &self.search
    }

    pub async fn commits_for(&self, project: &str, search: &GitSearch) -> Result<CommitStream<'_>> {
        let project = require_project(project)?;

        // Repositories are addressed by id, so look the name up first.
        let repositories: ListResponse<GitRepository> = self
            .connection
            .get_json(&["_apis", "git", "repositories"], &[])
            .await?;
        let repository = resolve_unique(&repositories.value, project, |r| r.name.as_str())?;

        let page: ListResponse<GitCommitRef> = self
            .connection
            .get_json(
                &["_apis", "git", "repositories", repository.id.as_str(), "commits"],
                &search.query(),
            )
            .await?;

        tracing::info!(
            "Found {} commits on {}/{}",
            page.value.len(),
            repository.name,
            search.branch
        );

        let summaries = page
            .value
            .iter()
            .map(|c| summarize(&repository.id, c))
            .collect();
        Ok(CommitStream::new(self, summaries))
    }
}

#[async_trait]
impl ChangeSource for GitBackend {
    async fn changes(&self, id: &CommitId) -> Result<Vec<FileChange>> {
        let CommitId::Git { repository_id, sha } = id else {
            return Err(ExportError::InvalidArgument {
                name: "id",
                reason: format!("not a git commit id: {:?}", id),
            });
        };

        let changes: GitCommitChanges = self
            .connection
            .get_json(
                &[
                    "_apis",
                    "git",
                    "repositories",
                    repository_id.as_str(),
                    "commits",
                    sha.as_str(),
                    "changes",
                ],
                &[],
            )
            .await?;

        Ok(normalize_changes(&changes.changes))
    }
}

#[async_trait]
impl HistoryBackend for GitBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::GitStyle
    }

    fn project(&self) -> &str {
        &self.project
    }

    async fn commits(&self) -> Result<CommitStream<'_>> {
        self.commits_for(&self.project, &self.search).await
    }
}
