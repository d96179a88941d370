//! Server profile: where and how payloads are published.

use serde::{Deserialize, Serialize};

use crate::error::{ProbeDockError, ProbeDockResult};
use crate::payload::ProtocolVersion;

/// Credentials presented to the collector.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Authorization: Bearer <token>`.
    Token(String),
    /// API key id/secret pair.
    ApiKey { id: String, secret: String },
}

impl Credentials {
    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> String {
        match self {
            Self::Token(token) => format!("Bearer {}", token),
            Self::ApiKey { id, secret } => {
                format!("ProbeDockApiKey id=\"{}\" secret=\"{}\"", id, secret)
            }
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(***)"),
            Self::ApiKey { id, .. } => write!(f, "ApiKey {{ id: {:?}, secret: *** }}", id),
        }
    }
}

/// A collector server, as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProfile {
    #[serde(default)]
    pub name: Option<String>,

    /// Base URL of the collector API.
    #[serde(default)]
    pub api_url: Option<String>,

    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default)]
    pub api_key_id: Option<String>,

    #[serde(default)]
    pub api_key_secret: Option<String>,

    /// Selects the payload shape and upload strategy.
    #[serde(default)]
    pub api_version: ProtocolVersion,

    /// Overrides the project's API identifier for this server.
    #[serde(default)]
    pub project_api_id: Option<String>,
}

/// A server profile that passed validation.
#[derive(Debug, Clone)]
pub struct ResolvedServer {
    pub name: String,
    /// Base URL without trailing slash.
    pub api_url: String,
    pub credentials: Credentials,
    pub api_version: ProtocolVersion,
    pub project_api_id: String,
}

impl ServerProfile {
    pub fn new(name: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into().trim().to_string()),
            api_url: Some(api_url.into()),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_api_key(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.api_key_id = Some(id.into());
        self.api_key_secret = Some(secret.into());
        self
    }

    pub fn with_api_version(mut self, version: ProtocolVersion) -> Self {
        self.api_version = version;
        self
    }

    pub fn with_project_api_id(mut self, project_api_id: impl Into<String>) -> Self {
        self.project_api_id = Some(project_api_id.into());
        self
    }

    /// Name used in messages and file paths.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(unnamed)")
    }

    /// Configured credentials; a token takes precedence over an API key.
    pub fn credentials(&self) -> Option<Credentials> {
        if let Some(token) = non_blank(&self.api_token) {
            return Some(Credentials::Token(token.to_string()));
        }
        match (non_blank(&self.api_key_id), non_blank(&self.api_key_secret)) {
            (Some(id), Some(secret)) => Some(Credentials::ApiKey {
                id: id.to_string(),
                secret: secret.to_string(),
            }),
            _ => None,
        }
    }

    /// Check that every option needed to upload is present.
    pub fn resolve(&self) -> ProbeDockResult<ResolvedServer> {
        let name = non_blank(&self.name);
        let api_url = non_blank(&self.api_url);
        let credentials = self.credentials();
        let project_api_id = non_blank(&self.project_api_id);

        match (name, api_url, credentials, project_api_id) {
            (Some(name), Some(api_url), Some(credentials), Some(project_api_id)) => {
                Ok(ResolvedServer {
                    name: name.to_string(),
                    api_url: api_url.trim_end_matches('/').to_string(),
                    credentials,
                    api_version: self.api_version,
                    project_api_id: project_api_id.to_string(),
                })
            }
            (name, api_url, credentials, project_api_id) => {
                let mut missing = Vec::new();
                if name.is_none() {
                    missing.push("name");
                }
                if api_url.is_none() {
                    missing.push("apiUrl");
                }
                if credentials.is_none() {
                    missing.push(match self.api_version {
                        ProtocolVersion::V1 => "apiToken",
                        ProtocolVersion::V0 => "apiKeyId/apiKeySecret",
                    });
                }
                if project_api_id.is_none() {
                    missing.push("projectApiId");
                }
                Err(ProbeDockError::upload(
                    format!(
                        "Server {} is missing the following options: {}",
                        self.display_name(),
                        missing.join(", ")
                    ),
                    None,
                ))
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
