//! Workspace layout and file writes shared by the cache and payload persistence.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{ProbeDockError, ProbeDockResult};

/// Per-server directory: `{workspace}/servers/{server}`.
pub(crate) fn server_dir(workspace: &Path, server_name: &str) -> PathBuf {
    workspace.join("servers").join(server_name)
}

/// Write `content` to `path` via a temp file and rename, creating parent directories.
pub(crate) async fn write_atomic(path: &Path, content: &str) -> ProbeDockResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ProbeDockError::Io {
                message: format!("failed to create {}: {}", parent.display(), e),
            })?;
    }

    let temp_path = path.with_extension("tmp");

    fs::write(&temp_path, content)
        .await
        .map_err(|e| ProbeDockError::Io {
            message: format!("failed to write temp file: {}", e),
        })?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| ProbeDockError::Io {
            message: format!("failed to rename temp file: {}", e),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn server_dir_layout() {
        assert_eq!(
            server_dir(Path::new("/tmp/ws"), "local"),
            PathBuf::from("/tmp/ws/servers/local")
        );
    }

    #[tokio::test]
    async fn write_atomic_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a").join("b").join("file.json");

        write_atomic(&path, "{}").await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "{}");
        assert!(!path.with_extension("tmp").exists());
    }
}
