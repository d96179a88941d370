//! Configuration: project, servers and publishing switches.
//!
//! ```yaml
//! project:
//!   version: 1.2.3
//!   apiId: abc
//!   category: RSpec
//!   tags: [unit]
//! servers:
//!   local:
//!     apiUrl: http://localhost:3000/api
//!     apiToken: secret
//!     projectApiId: abc
//! server: local
//! workspace: /tmp/probedock
//! publish: true
//! localMode: false
//! payload:
//!   cache: true
//!   print: false
//!   save: false
//! ```
//!
//! Environment overrides (see [`Config::apply_env_overrides`]):
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `PROBEDOCK_SERVER` | `server` |
//! | `PROBEDOCK_WORKSPACE` | `workspace` |
//! | `PROBEDOCK_PUBLISH` | `publish` |
//! | `PROBEDOCK_LOCAL` | `localMode` |
//! | `PROBEDOCK_CACHE_PAYLOAD` | `payload.cache` |
//! | `PROBEDOCK_PRINT_PAYLOAD` | `payload.print` |
//! | `PROBEDOCK_SAVE_PAYLOAD` | `payload.save` |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProbeDockError, ProbeDockResult};
use crate::project::ProjectProfile;
use crate::publisher::PublishOptions;
use crate::server::ServerProfile;

/// Payload switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSwitches {
    /// Use the staleness cache to send only changed descriptions.
    #[serde(default)]
    pub cache: bool,

    /// Print the payload to the console.
    #[serde(default)]
    pub print: bool,

    /// Save the payload in the workspace.
    #[serde(default)]
    pub save: bool,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub project: ProjectProfile,

    /// Server profiles by name.
    #[serde(default)]
    pub servers: BTreeMap<String, ServerProfile>,

    /// Name of the server to publish to.
    #[serde(default)]
    pub server: Option<String>,

    /// Directory for the cache, saved payloads and the uid file.
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    #[serde(default = "default_publish")]
    pub publish: bool,

    /// Go through the motions without sending anything.
    #[serde(default)]
    pub local_mode: bool,

    #[serde(default)]
    pub payload: PayloadSwitches,
}

fn default_publish() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectProfile::default(),
            servers: BTreeMap::new(),
            server: None,
            workspace: None,
            publish: default_publish(),
            local_mode: false,
            payload: PayloadSwitches::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> ProbeDockResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ProbeDockError::Config {
            message: format!("invalid configuration: {}", e),
        })
    }

    pub async fn load(path: impl AsRef<Path>) -> ProbeDockResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ProbeDockError::Config {
                message: format!("failed to read {}: {}", path.display(), e),
            })?;

        debug!(path = %path.display(), "loading configuration");
        Self::from_yaml_str(&content)
    }

    pub fn with_project(mut self, project: ProjectProfile) -> Self {
        self.project = project;
        self
    }

    /// Add a server profile, keyed by its name.
    pub fn with_server_profile(mut self, profile: ServerProfile) -> Self {
        let name = profile.display_name().to_string();
        self.servers.insert(name, profile);
        self
    }

    /// Select the server to publish to.
    pub fn with_server(mut self, name: impl Into<String>) -> Self {
        self.server = Some(name.into());
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_publish(mut self, publish: bool) -> Self {
        self.publish = publish;
        self
    }

    pub fn with_local_mode(mut self, local_mode: bool) -> Self {
        self.local_mode = local_mode;
        self
    }

    pub fn with_payload(mut self, payload: PayloadSwitches) -> Self {
        self.payload = payload;
        self
    }

    /// Apply `PROBEDOCK_*` environment variables on top of the file settings.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(server) = env_string("PROBEDOCK_SERVER") {
            self.server = Some(server);
        }
        if let Some(workspace) = env_string("PROBEDOCK_WORKSPACE") {
            self.workspace = Some(PathBuf::from(workspace));
        }
        if let Some(publish) = env_bool("PROBEDOCK_PUBLISH") {
            self.publish = publish;
        }
        if let Some(local_mode) = env_bool("PROBEDOCK_LOCAL") {
            self.local_mode = local_mode;
        }
        if let Some(cache) = env_bool("PROBEDOCK_CACHE_PAYLOAD") {
            self.payload.cache = cache;
        }
        if let Some(print) = env_bool("PROBEDOCK_PRINT_PAYLOAD") {
            self.payload.print = print;
        }
        if let Some(save) = env_bool("PROBEDOCK_SAVE_PAYLOAD") {
            self.payload.save = save;
        }
        self
    }

    /// The selected server profile, named after its map key.
    pub fn selected_server(&self) -> Option<ServerProfile> {
        let name = self.server.as_deref()?;
        let mut profile = self.servers.get(name)?.clone();
        if profile.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            profile.name = Some(name.to_string());
        }
        Some(profile)
    }

    /// The project profile, with the selected server's API identifier override applied.
    pub fn resolved_project(&self) -> ProjectProfile {
        let mut project = self.project.clone();
        if let Some(api_id) = self
            .selected_server()
            .and_then(|s| s.project_api_id)
            .filter(|id| !id.trim().is_empty())
        {
            project.api_id = Some(api_id);
        }
        project
    }

    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            publish: self.publish,
            local_mode: self.local_mode,
            cache_payload: self.payload.cache,
            print_payload: self.payload.print,
            save_payload: self.payload.save,
            workspace: self.workspace.clone(),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}
