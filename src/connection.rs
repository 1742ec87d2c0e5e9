use std::fmt;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::config::CredentialConfig;
use crate::error::{ExportError, Result};

/// REST API version sent with every request.
pub const API_VERSION: &str = "5.0";

/// Token exposed by build agents to processes running under their login session.
const AMBIENT_TOKEN_VAR: &str = "SYSTEM_ACCESSTOKEN";

#[derive(Clone)]
pub enum Credential {
    /// The caller's own session; carries an ambient token when one is available.
    Ambient { token: Option<String> },
    Basic {
        username: String,
        password: String,
        domain: String,
    },
}

impl Credential {
    pub fn resolve(config: &CredentialConfig) -> Self {
        if config.use_login_user {
            Credential::Ambient {
                token: std::env::var(AMBIENT_TOKEN_VAR).ok().filter(|t| !t.is_empty()),
            }
        } else {
            Credential::Basic {
                username: config.user_name.clone(),
                password: config.password.clone(),
                domain: config.domain.clone(),
            }
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credential::Ambient { token: Some(token) } => request.bearer_auth(token),
            Credential::Ambient { token: None } => request,
            Credential::Basic {
                username,
                password,
                domain,
            } => {
                let user = if domain.trim().is_empty() {
                    username.clone()
                } else {
                    format!("{}\\{}", domain, username)
                };
                request.basic_auth(user, Some(password))
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Ambient { token } => f
                .debug_struct("Ambient")
                .field("token", &token.as_ref().map(|_| "***"))
                .finish(),
            Credential::Basic {
                username, domain, ..
            } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("domain", domain)
                .finish_non_exhaustive(),
        }
    }
}

/// Authenticated handle to one version-control server.
///
/// Owned by exactly one backend; dropping it releases the HTTP client.
pub struct Connection {
    base: Url,
    credential: Credential,
    client: Client,
}

impl Connection {
    pub fn open(server_url: &str, credential: Credential) -> Result<Self> {
        if server_url.trim().is_empty() {
            return Err(ExportError::Configuration("ServerUrl is not set".to_string()));
        }

        let base = Url::parse(server_url.trim()).map_err(|e| {
            ExportError::Configuration(format!("invalid ServerUrl '{}': {}", server_url, e))
        })?;

        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(ExportError::Configuration(format!(
                "ServerUrl must be an http(s) address: {}",
                server_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        tracing::debug!(url = %base, ?credential, "connection opened");

        Ok(Self {
            base,
            credential,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build `{base}/{segments...}`; each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET a JSON resource. `404` maps to [`ExportError::NotFound`].
    pub async fn get_json<T>(&self, segments: &[&str], query: &[(&str, String)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments);
        tracing::debug!("GET {}", url);

        let request = self
            .client
            .get(url.clone())
            .query(&[("api-version", API_VERSION)])
            .query(query);

        let response = self.credential.apply(request).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ExportError::NotFound(url.to_string())),
            status if !status.is_success() => Err(ExportError::Remote {
                status,
                url: url.to_string(),
            }),
            _ => Ok(response.json::<T>().await?),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        tracing::debug!(url = %self.base, "connection released");
    }
}
