use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Local, Utc};
use thiserror::Error;

use crate::backend::CommitStream;
use crate::config::AppConfig;
use crate::error::{ExportError, Result};
use crate::models::CommitResult;
use crate::xlsx::{self, Align, Column, Table};

pub const COLUMN_TITLES: [&str; 5] = ["Date", "Author", "Comment", "Path", "ChangeType"];
pub const DATE_FORMAT: &str = "%Y-%m-%d\n%H:%M";
/// Longest text a spreadsheet cell accepts.
pub const MAX_CELL_CHARS: usize = 32_767;

pub type ReportRow = [String; 5];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("{column} has {length} characters, more than a cell can hold")]
    CellTooLong { column: &'static str, length: usize },
}

/// A commit whose rows were left out of the report.
#[derive(Debug, Clone)]
pub struct SkippedRow {
    pub committer: String,
    pub created: DateTime<Utc>,
    pub error: RowError,
}

/// Where to write the report; unset fields fall back to the writer defaults.
#[derive(Debug, Clone, Default)]
pub struct ExportTarget {
    pub folder: Option<PathBuf>,
    pub file_name: Option<String>,
}

#[derive(Debug)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub commits: usize,
    pub rows_written: usize,
    pub skipped: Vec<SkippedRow>,
}

/// Rows of the report, built one commit at a time.
#[derive(Debug)]
pub struct ReportSheet {
    offset: FixedOffset,
    rows: Vec<ReportRow>,
    skipped: Vec<SkippedRow>,
    commits: usize,
}

impl ReportSheet {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            rows: Vec::new(),
            skipped: Vec::new(),
            commits: 0,
        }
    }

    /// Append the rows for one commit. A commit either lands completely or
    /// is recorded in `skipped`; returns the number of rows added.
    pub fn push_commit(&mut self, commit: &CommitResult) -> usize {
        self.commits += 1;
        match self.render(commit) {
            Ok(rows) => {
                let added = rows.len();
                self.rows.extend(rows);
                added
            }
            Err(error) => {
                tracing::warn!(
                    "Skipping commit by {} at {}: {}",
                    commit.committer,
                    commit.created,
                    error
                );
                self.skipped.push(SkippedRow {
                    committer: commit.committer.clone(),
                    created: commit.created,
                    error,
                });
                0
            }
        }
    }

    fn render(&self, commit: &CommitResult) -> Result<Vec<ReportRow>, RowError> {
        let date = format_date(commit.created, self.offset);
        check_cell("Author", &commit.committer)?;
        check_cell("Comment", &commit.comment)?;

        let base = |path: String, kind: String| -> ReportRow {
            [
                date.clone(),
                commit.committer.clone(),
                commit.comment.clone(),
                path,
                kind,
            ]
        };

        if commit.changes.is_empty() {
            return Ok(vec![base(String::new(), String::new())]);
        }

        commit
            .changes
            .iter()
            .map(|change| -> Result<ReportRow, RowError> {
                check_cell("Path", &change.path)?;
                Ok(base(change.path.clone(), change.kind.to_string()))
            })
            .collect()
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn skipped(&self) -> &[SkippedRow] {
        &self.skipped
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn to_table(&self, title: &str) -> Table {
        let columns = COLUMN_TITLES
            .iter()
            .map(|&header| Column {
                header,
                width: if header == "Path" { 100.0 } else { 30.0 },
                align: match header {
                    "Comment" | "Path" | "ChangeType" => Align::Left,
                    _ => Align::Center,
                },
            })
            .collect();

        Table {
            sheet_name: title.to_string(),
            title: title.to_string(),
            columns,
            rows: self.rows.iter().map(|r| r.to_vec()).collect(),
        }
    }
}

pub fn format_date(created: DateTime<Utc>, offset: FixedOffset) -> String {
    created.with_timezone(&offset).format(DATE_FORMAT).to_string()
}

fn check_cell(column: &'static str, value: &str) -> Result<(), RowError> {
    let length = value.chars().count();
    if length > MAX_CELL_CHARS {
        return Err(RowError::CellTooLong { column, length });
    }
    Ok(())
}

/// Writes commit history to `{folder}/{file_name}_{yyyyMMddHHmmss}.xlsx`.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    default_folder: PathBuf,
    default_file_name: String,
    offset: FixedOffset,
}

impl ReportWriter {
    pub fn new(
        default_folder: impl Into<PathBuf>,
        default_file_name: impl Into<String>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            default_folder: default_folder.into(),
            default_file_name: default_file_name.into(),
            offset,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let offset = config
            .display_utc_offset
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ExportError::Configuration(format!(
                    "DisplayUtcOffset out of range: {}",
                    config.display_utc_offset
                ))
            })?;
        Ok(Self::new(&config.export_path, &config.project, offset))
    }

    /// Folder and file name the report will be written to. Empty values fall
    /// back to the writer defaults; a file name must not contain a path
    /// separator.
    pub fn resolve_target(&self, target: &ExportTarget) -> Result<(PathBuf, String)> {
        let folder = target
            .folder
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| self.default_folder.clone());
        let file_name = target
            .file_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.default_file_name.clone());

        if file_name.contains(['/', '\\']) {
            return Err(ExportError::InvalidArgument {
                name: "file_name",
                reason: format!("'{}' must not contain a path separator", file_name),
            });
        }
        Ok((folder, file_name))
    }

    pub async fn export(
        &self,
        mut commits: CommitStream<'_>,
        target: ExportTarget,
    ) -> Result<ExportOutcome> {
        let (folder, file_name) = self.resolve_target(&target)?;

        let mut sheet = ReportSheet::new(self.offset);
        while let Some(commit) = commits.next().await {
            let commit = commit?;
            let added = sheet.push_commit(&commit);
            tracing::debug!("Added {} rows for commit by {}", added, commit.committer);
        }

        let bytes = xlsx::write_workbook(&sheet.to_table(&file_name))?;

        tokio::fs::create_dir_all(&folder).await?;
        let path = folder.join(format!(
            "{}_{}.xlsx",
            file_name,
            Local::now().format("%Y%m%d%H%M%S")
        ));
        tokio::fs::write(&path, bytes).await?;

        tracing::info!(
            "Wrote {} rows for {} commits to {:?} ({} skipped)",
            sheet.rows().len(),
            sheet.commits(),
            path,
            sheet.skipped().len()
        );

        Ok(ExportOutcome {
            path,
            commits: sheet.commits(),
            rows_written: sheet.rows().len(),
            skipped: sheet.skipped().to_vec(),
        })
    }
}
