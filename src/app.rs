use crate::backend::{ChangesetBackend, GitBackend, HistoryBackend};
use crate::config::AppConfig;
use crate::error::{ExportError, Result};
use crate::models::BackendKind;
use crate::report::{ExportOutcome, ExportTarget, ReportWriter};

pub type BackendFactory = fn(&AppConfig) -> Result<Box<dyn HistoryBackend>>;

/// Backend constructors keyed on the kind they produce.
#[derive(Default)]
pub struct BackendRegistry {
    entries: Vec<(BackendKind, BackendFactory)>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the changeset and Git backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register(BackendKind::ChangesetStyle, changeset_backend)
            .register(BackendKind::GitStyle, git_backend);
        registry
    }

    /// Later registrations for the same kind take precedence.
    pub fn register(&mut self, kind: BackendKind, factory: BackendFactory) -> &mut Self {
        self.entries.push((kind, factory));
        self
    }

    pub fn build(&self, config: &AppConfig) -> Result<Box<dyn HistoryBackend>> {
        let (_, factory) = self
            .entries
            .iter()
            .rev()
            .find(|(kind, _)| *kind == config.kind)
            .ok_or(ExportError::NotImplemented(config.kind))?;

        let backend = factory(config)?;
        if backend.kind() != config.kind {
            return Err(ExportError::NotImplemented(config.kind));
        }
        Ok(backend)
    }
}

fn changeset_backend(config: &AppConfig) -> Result<Box<dyn HistoryBackend>> {
    Ok(Box::new(ChangesetBackend::from_config(config)?))
}

fn git_backend(config: &AppConfig) -> Result<Box<dyn HistoryBackend>> {
    Ok(Box::new(GitBackend::from_config(config)?))
}

/// Fetch history once and write the report. The backend, and with it the
/// server connection, is dropped before this returns.
pub async fn run(
    config: &AppConfig,
    registry: &BackendRegistry,
    target: ExportTarget,
) -> Result<ExportOutcome> {
    let writer = ReportWriter::from_config(config)?;
    let backend = registry.build(config)?;

    let (folder, file_name) = writer.resolve_target(&target)?;

    println!("Project: {}", backend.project());
    println!("Version control: {}", backend.kind());
    println!("Exporting to \"{}\"...", folder.display());

    let commits = backend.commits().await?;
    let target = ExportTarget {
        folder: Some(folder),
        file_name: Some(file_name),
    };
    let outcome = writer.export(commits, target).await?;

    println!("Export complete: {}", outcome.path.display());
    if !outcome.skipped.is_empty() {
        println!("{} commit(s) could not be written:", outcome.skipped.len());
        for skipped in &outcome.skipped {
            println!("  {} {}: {}", skipped.created, skipped.committer, skipped.error);
        }
    }

    Ok(outcome)
}
