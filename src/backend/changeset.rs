use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::wire::{ListResponse, RawChange};
use super::{normalize_changes, require_project, ChangeSource, CommitStream, HistoryBackend};
use crate::config::AppConfig;
use crate::connection::{Connection, Credential};
use crate::error::{ExportError, Result};
use crate::models::{BackendKind, CommitId, CommitSummary, FileChange};

pub const DEFAULT_TOP: u32 = 100;
pub const MAX_TOP: u32 = 256;

/// Out-of-range caps fall back to the default rather than being rejected.
pub fn clamp_top(top: Option<i64>) -> u32 {
    match top {
        Some(n) if n >= 1 && n <= i64::from(MAX_TOP) => n as u32,
        _ => DEFAULT_TOP,
    }
}

/// Date-range filter for changeset queries; dates are sent as `yyyy-MM-dd`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesetSearch {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl ChangesetSearch {
    pub fn from_dates(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            from_date: from.map(|d| d.format("%Y-%m-%d").to_string()),
            to_date: to.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }

    fn query(&self, project: &str, top: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![("searchCriteria.itemPath", format!("$/{}", project))];
        if let Some(from) = &self.from_date {
            query.push(("searchCriteria.fromDate", from.clone()));
        }
        if let Some(to) = &self.to_date {
            query.push(("searchCriteria.toDate", to.clone()));
        }
        query.push(("$top", top.to_string()));
        query
    }
}

#[derive(Debug, Deserialize)]
struct TeamProject {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityRef {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangesetRef {
    changeset_id: i64,
    author: IdentityRef,
    created_date: DateTime<Utc>,
    #[serde(default)]
    comment: Option<String>,
}

fn summarize(raw: &ChangesetRef) -> CommitSummary {
    CommitSummary {
        id: CommitId::Changeset(raw.changeset_id),
        committer: raw.author.display_name.clone(),
        created: raw.created_date,
        comment: raw.comment.clone().unwrap_or_default(),
    }
}

/// History backend for centralized changeset servers (TFVC).
pub struct ChangesetBackend {
    connection: Connection,
    project: String,
    search: ChangesetSearch,
    top: u32,
}

impl ChangesetBackend {
    pub fn new(
        connection: Connection,
        project: impl Into<String>,
        search: ChangesetSearch,
    ) -> Self {
        Self {
            connection,
            project: project.into(),
            search,
            top: DEFAULT_TOP,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let credential = Credential::resolve(&config.credential);
        let connection = Connection::open(&config.server_url, credential)?;
        let search = ChangesetSearch::from_dates(config.search.from_date, config.search.to_date);

        let mut backend = Self::new(connection, config.project.clone(), search);
        backend.set_top(config.search.top);
        Ok(backend)
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    pub fn set_top(&mut self, top: Option<i64>) {
        self.top = clamp_top(top);
    }

    pub fn search(&self) -> &ChangesetSearch {
        &self.search
    }

    pub async fn commits_for(
        &self,
        project: &str,
        search: &ChangesetSearch,
        top: u32,
    ) -> Result<CommitStream<'_>> {
        let project = require_project(project)?;
        let project = self.resolve_project(project).await?;

        let page: ListResponse<ChangesetRef> = self
            .connection
            .get_json(&["_apis", "tfvc", "changesets"], &search.query(&project, top))
            .await?;

        tracing::info!("Found {} changesets in {}", page.value.len(), project);

        let summaries = page.value.iter().map(summarize).collect();
        Ok(CommitStream::new(self, summaries))
    }

    async fn resolve_project(&self, name: &str) -> Result<String> {
        let lookup = self
            .connection
            .get_json::<TeamProject>(&["_apis", "projects", name], &[])
            .await;

        let found = match lookup {
            Ok(project) => project,
            Err(ExportError::NotFound(_)) => {
                return Err(ExportError::ProjectNotFound {
                    name: name.to_string(),
                    matches: 0,
                })
            }
            Err(e) => return Err(e),
        };

        if found.name != name {
            return Err(ExportError::ProjectNotFound {
                name: name.to_string(),
                matches: 0,
            });
        }
        Ok(found.name)
    }
}

#[async_trait]
impl ChangeSource for ChangesetBackend {
    async fn changes(&self, id: &CommitId) -> Result<Vec<FileChange>> {
        let CommitId::Changeset(number) = id else {
            return Err(ExportError::InvalidArgument {
                name: "id",
                reason: format!("not a changeset id: {:?}", id),
            });
        };

        let number = number.to_string();
        let page: ListResponse<RawChange> = self
            .connection
            .get_json(&["_apis", "tfvc", "changesets", number.as_str(), "changes"], &[])
            .await?;

        Ok(normalize_changes(&page.value))
    }
}

#[async_trait]
impl HistoryBackend for ChangesetBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ChangesetStyle
    }

    fn project(&self) -> &str {
        &self.project
    }

    async fn commits(&self) -> Result<CommitStream<'_>> {
        self.commits_for(&self.project, &self.search, self.top).await
    }
}
