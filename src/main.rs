use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vcs_history_export::config::{self, ConfigOverrides};
use vcs_history_export::{run, BackendKind, BackendRegistry, ExportOutcome, ExportTarget};

#[derive(Debug, Parser)]
#[command(
    name = "vcs-history-export",
    about = "Export TFVC or Git commit history to a spreadsheet"
)]
struct Cli {
    /// Settings file (defaults to appsettings.json next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Version control type: Tfs or Git
    #[arg(long = "type")]
    kind: Option<BackendKind>,

    #[arg(long)]
    project: Option<String>,

    /// Git branch to read
    #[arg(long)]
    branch: Option<String>,

    /// Maximum number of commits
    #[arg(long, allow_hyphen_values = true)]
    top: Option<i64>,

    /// Earliest commit date (yyyy-mm-dd)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Latest commit date (yyyy-mm-dd)
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(long)]
    export_path: Option<String>,

    /// Report name; defaults to the project name
    #[arg(long)]
    file_name: Option<String>,

    /// Exit without waiting for a key press
    #[arg(long)]
    no_pause: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let no_pause = cli.no_pause;

    match export(cli).await {
        Ok(outcome) => {
            tracing::info!(
                "Exported {} commits ({} rows) to {:?}",
                outcome.commits,
                outcome.rows_written,
                outcome.path
            );
            if !no_pause {
                println!("press any key to exit...");
                let _ = std::io::stdin().read_line(&mut String::new());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Export failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn export(cli: Cli) -> Result<ExportOutcome> {
    let path = cli.config.unwrap_or_else(config::default_settings_path);
    let overrides = ConfigOverrides {
        kind: cli.kind,
        project: cli.project,
        git_branch: cli.branch,
        export_path: cli.export_path,
        top: cli.top,
        from_date: cli.from,
        to_date: cli.to,
    };

    let config = config::load_config(&path, overrides)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    let target = ExportTarget {
        folder: None,
        file_name: cli.file_name,
    };

    let outcome = run(&config, &BackendRegistry::with_defaults(), target)
        .await
        .context("Failed to export history")?;

    Ok(outcome)
}
