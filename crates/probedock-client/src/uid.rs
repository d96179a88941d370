//! Correlation uid: groups several payloads as one logical run.
//!
//! Lookup order:
//! 1. `PROBE_DOCK_TEST_REPORT_UID` environment variable
//!    (`PROBEDOCK_TEST_REPORT_UID` is accepted as an alias)
//! 2. `{workspace}/uid` file

use std::path::PathBuf;

use tokio::fs;
use tracing::debug;

use crate::error::{ProbeDockError, ProbeDockResult};
use crate::io::write_atomic;

/// Environment variable holding the current uid.
pub const UID_ENV_VAR: &str = "PROBE_DOCK_TEST_REPORT_UID";

/// Alias read when [`UID_ENV_VAR`] is unset. Never written.
pub const UID_ENV_ALIAS: &str = "PROBEDOCK_TEST_REPORT_UID";

const UID_FILE: &str = "uid";

/// Loads, generates and cleans the correlation uid.
#[derive(Debug, Clone, Default)]
pub struct UidManager {
    workspace: Option<PathBuf>,
}

impl UidManager {
    pub fn new(workspace: Option<PathBuf>) -> Self {
        Self { workspace }
    }

    fn uid_file(&self) -> Option<PathBuf> {
        self.workspace.as_ref().map(|w| w.join(UID_FILE))
    }

    /// Current uid, if any.
    pub async fn load_uid(&self) -> Option<String> {
        if let Some(uid) = env_uid() {
            return Some(uid);
        }

        let path = self.uid_file()?;
        match fs::read_to_string(&path).await {
            Ok(content) => {
                let uid = content.trim();
                (!uid.is_empty()).then(|| uid.to_string())
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no uid file");
                None
            }
        }
    }

    /// Generate a uid and write it to the workspace uid file.
    pub async fn generate_uid_to_file(&self) -> ProbeDockResult<String> {
        let path = self.uid_file().ok_or_else(|| ProbeDockError::Uid {
            message: "No workspace specified; cannot save test run UID".to_string(),
        })?;

        let uid = generate_uid();
        write_atomic(&path, &uid).await?;
        debug!(path = %path.display(), uid = %uid, "uid saved");
        Ok(uid)
    }

    /// Generate a uid and export it through the environment variable.
    pub fn generate_uid_to_env(&self) -> ProbeDockResult<String> {
        if env_uid().is_some() {
            return Err(ProbeDockError::Uid {
                message: format!("${} is already defined", UID_ENV_VAR),
            });
        }

        let uid = generate_uid();
        std::env::set_var(UID_ENV_VAR, &uid);
        Ok(uid)
    }

    /// Remove the environment variables and the uid file.
    pub async fn clean_uid(&self) -> ProbeDockResult<()> {
        std::env::remove_var(UID_ENV_VAR);
        std::env::remove_var(UID_ENV_ALIAS);

        let Some(path) = self.uid_file() else {
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProbeDockError::Uid {
                message: format!("failed to remove {}: {}", path.display(), e),
            }),
        }
    }
}

fn env_uid() -> Option<String> {
    [UID_ENV_VAR, UID_ENV_ALIAS]
        .into_iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

/// `YYYYMMDDHHMMSS-<uuid v4>`, UTC.
pub fn generate_uid() -> String {
    format!(
        "{}-{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S"),
        uuid::Uuid::new_v4()
    )
}
