//! Export commit history from a TFVC or Git server to an `.xlsx` report.

pub mod app;
pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod models;
pub mod report;
pub mod xlsx;

pub use app::{run, BackendRegistry};
pub use backend::{CommitStream, HistoryBackend};
pub use config::AppConfig;
pub use error::ExportError;
pub use models::{BackendKind, ChangeKind, CommitResult, FileChange};
pub use report::{ExportOutcome, ExportTarget, ReportWriter};
