//! Staleness cache: remembers what the collector already knows about each test.
//!
//! # Cache Structure
//!
//! ```text
//! {workspace}/servers/{server}/cache.json
//!   { "<projectApiId>": { "<testKey>": "<sha256 hex>", ... } }
//! ```
//!
//! Only descriptive fields (name, category, tags, tickets) are hashed. Status,
//! duration and message change every run and never make a result stale.

use std::collections::BTreeMap;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{ProbeDockError, ProbeDockResult};
use crate::io::{server_dir, write_atomic};
use crate::result::TestResult;
use crate::run::TestRun;

const CACHE_FILE: &str = "cache.json";

type ProjectHashes = BTreeMap<String, BTreeMap<String, String>>;

/// What the cache says about one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No cache is in use.
    Uncached,
    /// The cache has never seen this key.
    Unknown,
    /// Known and unchanged since the last publish.
    Fresh,
    /// Known, but its descriptive fields changed.
    Stale,
}

impl Freshness {
    pub fn of(cache: Option<&PayloadCache>, result: &TestResult) -> Self {
        match cache {
            None => Self::Uncached,
            Some(cache) if !cache.known(result) => Self::Unknown,
            Some(cache) if cache.stale(result) => Self::Stale,
            Some(_) => Self::Fresh,
        }
    }

    /// Whether descriptive fields must be sent.
    pub fn needs_description(self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

/// What [`PayloadCache::load`] found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLoad {
    /// No cache file yet.
    Missing,
    Loaded,
    /// The file exists but could not be used; the cache starts empty.
    Discarded { reason: String },
}

/// Persistent key → content hash map for one project on one server.
#[derive(Debug, Clone, Default)]
pub struct PayloadCache {
    workspace: Option<PathBuf>,
    server_name: Option<String>,
    project_api_id: Option<String>,
    tests: ProjectHashes,
}

impl PayloadCache {
    pub fn new(
        workspace: Option<PathBuf>,
        server_name: Option<String>,
        project_api_id: Option<String>,
    ) -> Self {
        Self {
            workspace,
            server_name,
            project_api_id,
            tests: ProjectHashes::new(),
        }
    }

    /// Path of the cache file, if enough options are set to know it.
    pub fn cache_file(&self) -> Option<PathBuf> {
        match (&self.workspace, &self.server_name) {
            (Some(workspace), Some(server)) => Some(server_dir(workspace, server).join(CACHE_FILE)),
            _ => None,
        }
    }

    /// Load the cache file.
    ///
    /// A missing file yields an empty cache; so does an unreadable or corrupt
    /// one, reported as [`CacheLoad::Discarded`].
    pub async fn load(&mut self) -> ProbeDockResult<CacheLoad> {
        let (path, _) = self.validate()?;

        let (tests, status) = match fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(tests) => (tests, CacheLoad::Loaded),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt payload cache");
                    let reason = format!("{} is corrupt: {}", path.display(), e);
                    (ProjectHashes::new(), CacheLoad::Discarded { reason })
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (ProjectHashes::new(), CacheLoad::Missing)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read payload cache");
                let reason = format!("could not read {}: {}", path.display(), e);
                (ProjectHashes::new(), CacheLoad::Discarded { reason })
            }
        };
        self.tests = tests;

        debug!(path = %path.display(), status = ?status, "payload cache loaded");
        Ok(status)
    }

    /// Record the hashes of every keyed result of `run` and write the file.
    ///
    /// Entries of any other project are dropped.
    pub async fn save(&mut self, run: &TestRun) -> ProbeDockResult<()> {
        let (path, project_api_id) = self.validate()?;

        let mut hashes = self.tests.remove(&project_api_id).unwrap_or_default();
        for result in run.results() {
            if let Some(key) = result.usable_key() {
                hashes.insert(key.to_string(), content_hash(result));
            }
        }
        self.tests = ProjectHashes::from([(project_api_id, hashes)]);

        let content = serde_json::to_string(&self.tests).map_err(|e| ProbeDockError::Cache {
            message: format!("failed to serialize payload cache: {}", e),
        })?;
        write_atomic(&path, &content)
            .await
            .map_err(|e| ProbeDockError::Cache {
                message: e.to_string(),
            })?;

        debug!(path = %path.display(), "payload cache saved");
        Ok(())
    }

    /// Whether a hash is stored for the result's key in the current project.
    pub fn known(&self, result: &TestResult) -> bool {
        self.stored_hash(result).is_some()
    }

    /// Whether the result is known and its descriptive fields changed.
    pub fn stale(&self, result: &TestResult) -> bool {
        self.stored_hash(result)
            .is_some_and(|stored| stored != content_hash(result))
    }

    fn stored_hash(&self, result: &TestResult) -> Option<&str> {
        let project = self.tests.get(self.project_api_id.as_deref()?)?;
        project.get(result.key()?).map(String::as_str)
    }

    fn validate(&self) -> ProbeDockResult<(PathBuf, String)> {
        let mut missing = Vec::new();
        if self.workspace.is_none() {
            missing.push("workspace");
        }
        if self.server_name.is_none() {
            missing.push("server name");
        }
        if self.project_api_id.is_none() {
            missing.push("project API identifier");
        }

        match (self.cache_file(), &self.project_api_id) {
            (Some(path), Some(project_api_id)) if missing.is_empty() => {
                Ok((path, project_api_id.clone()))
            }
            _ => Err(ProbeDockError::Cache {
                message: format!("Missing cache options: {}", missing.join(", ")),
            }),
        }
    }
}

/// SHA-256 over the descriptive fields; tags and tickets are order-independent.
pub fn content_hash(result: &TestResult) -> String {
    let mut tags: Vec<&str> = result.tags().iter().map(String::as_str).collect();
    tags.sort_unstable();
    let mut tickets: Vec<&str> = result.tickets().iter().map(String::as_str).collect();
    tickets.sort_unstable();

    let content = format!(
        "{} || {} || {} || {}",
        result.name(),
        result.category().unwrap_or_default(),
        tags.join(" "),
        tickets.join(" ")
    );
    hex::encode(Sha256::digest(content.as_bytes()))
}
