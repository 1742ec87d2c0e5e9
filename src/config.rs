use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{ExportError, Result};
use crate::models::BackendKind;

pub const DEFAULT_EXPORT_PATH: &str = "export";
/// Reports are rendered in UTC+8 unless configured otherwise.
pub const DEFAULT_DISPLAY_UTC_OFFSET: i32 = 8;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    #[serde(rename = "Type")]
    pub kind: BackendKind,
    #[serde(default = "default_export_path")]
    pub export_path: String,
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default = "default_display_utc_offset")]
    pub display_utc_offset: i32,
    #[serde(default)]
    pub credential: CredentialConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CredentialConfig {
    pub use_login_user: bool,
    pub user_name: String,
    pub password: String,
    pub domain: String,
}

// Keep passwords out of logs.
impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("use_login_user", &self.use_login_user)
            .field("user_name", &self.user_name)
            .field("password", &"***")
            .field("domain", &self.domain)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SearchConfig {
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub top: Option<i64>,
}

fn default_export_path() -> String {
    DEFAULT_EXPORT_PATH.to_string()
}

fn default_display_utc_offset() -> i32 {
    DEFAULT_DISPLAY_UTC_OFFSET
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    #[serde(rename = "AppConfig")]
    app_config: Option<AppConfig>,
}

/// Command-line values that take precedence over file and environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub kind: Option<BackendKind>,
    pub project: Option<String>,
    pub git_branch: Option<String>,
    pub export_path: Option<String>,
    pub top: Option<i64>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Load `AppConfig` from: settings file <- environment <- CLI.
pub fn load_config(path: &Path, overrides: ConfigOverrides) -> Result<AppConfig> {
    let raw = fs::read_to_string(path).map_err(|e| {
        ExportError::Configuration(format!("cannot read {}: {}", path.display(), e))
    })?;
    let mut config = parse_settings(&raw)?;

    apply_env(&mut config, |key| std::env::var(key).ok())?;
    apply_overrides(&mut config, overrides);

    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

pub fn parse_settings(raw: &str) -> Result<AppConfig> {
    let settings: SettingsFile = serde_json::from_str(raw)
        .map_err(|e| ExportError::Configuration(format!("invalid settings file: {}", e)))?;

    settings
        .app_config
        .ok_or_else(|| ExportError::Configuration("missing 'AppConfig' section".to_string()))
}

pub fn apply_env<F>(config: &mut AppConfig, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(kind) = var("VCS_EXPORT_TYPE") {
        config.kind = kind.parse().map_err(ExportError::Configuration)?;
    }
    if let Some(url) = var("VCS_EXPORT_SERVER_URL") {
        config.server_url = url;
    }
    if let Some(project) = var("VCS_EXPORT_PROJECT") {
        config.project = project;
    }
    if let Some(branch) = var("VCS_EXPORT_GIT_BRANCH") {
        config.git_branch = Some(branch);
    }
    if let Some(path) = var("VCS_EXPORT_PATH") {
        config.export_path = path;
    }
    if let Some(user) = var("VCS_EXPORT_USERNAME") {
        config.credential.user_name = user;
    }
    if let Some(password) = var("VCS_EXPORT_PASSWORD") {
        config.credential.password = password;
    }
    if let Some(domain) = var("VCS_EXPORT_DOMAIN") {
        config.credential.domain = domain;
    }
    Ok(())
}

pub fn apply_overrides(config: &mut AppConfig, overrides: ConfigOverrides) {
    if let Some(kind) = overrides.kind {
        config.kind = kind;
    }
    if let Some(project) = overrides.project {
        config.project = project;
    }
    if let Some(branch) = overrides.git_branch {
        config.git_branch = Some(branch);
    }
    if let Some(path) = overrides.export_path {
        config.export_path = path;
    }
    if overrides.top.is_some() {
        config.search.top = overrides.top;
    }
    if overrides.from_date.is_some() {
        config.search.from_date = overrides.from_date;
    }
    if overrides.to_date.is_some() {
        config.search.to_date = overrides.to_date;
    }
}

/// Default settings file next to the executable, falling back to the working directory.
pub fn default_settings_path() -> PathBuf {
    const FILE: &str = "appsettings.json";

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(FILE)))
        .filter(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from(FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"{
        "AppConfig": {
            "Type": "Git",
            "ExportPath": "out",
            "ServerUrl": "http://tfs.local:8080/tfs/DefaultCollection",
            "Project": "demo",
            "GitBranch": "main",
            "Credential": { "UseLoginUser": false, "UserName": "alice", "Password": "pw", "Domain": "CORP" },
            "Search": { "FromDate": "2024-01-01", "Top": 50 }
        }
    }"#;

    #[test]
    fn test_parse_settings() {
        let config = parse_settings(SAMPLE).unwrap();
        assert_eq!(config.kind, BackendKind::GitStyle);
        assert_eq!(config.export_path, "out");
        assert_eq!(config.git_branch.as_deref(), Some("main"));
        assert_eq!(config.credential.domain, "CORP");
        assert_eq!(config.search.from_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(config.search.to_date, None);
        assert_eq!(config.search.top, Some(50));
        assert_eq!(config.display_utc_offset, DEFAULT_DISPLAY_UTC_OFFSET);
    }

    #[test]
    fn test_missing_section_is_configuration_error() {
        let err = parse_settings(r#"{"Logging": {}}"#).unwrap_err();
        assert!(matches!(err, ExportError::Configuration(_)));
    }

    #[test]
    fn test_env_then_cli_precedence() {
        let mut config = parse_settings(SAMPLE).unwrap();
        let env: HashMap<&str, &str> = [
            ("VCS_EXPORT_PROJECT", "from-env"),
            ("VCS_EXPORT_TYPE", "tfs"),
            ("VCS_EXPORT_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();

        apply_env(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.project, "from-env");
        assert_eq!(config.kind, BackendKind::ChangesetStyle);
        assert_eq!(config.credential.password, "secret");

        apply_overrides(
            &mut config,
            ConfigOverrides {
                project: Some("from-cli".to_string()),
                top: Some(7),
                ..Default::default()
            },
        );
        assert_eq!(config.project, "from-cli");
        assert_eq!(config.search.top, Some(7));
        assert_eq!(config.search.from_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn test_bad_env_type_rejected() {
        let mut config = parse_settings(SAMPLE).unwrap();
        let err = apply_env(&mut config, |k| (k == "VCS_EXPORT_TYPE").then(|| "svn".to_string()))
            .unwrap_err();
        assert!(matches!(err, ExportError::Configuration(_)));
    }

    #[test]
    fn test_credential_debug_hides_password() {
        let config = parse_settings(SAMPLE).unwrap();
        let printed = format!("{:?}", config.credential);
        assert!(!printed.contains("pw\""));
        assert!(printed.contains("***"));
    }
}
