use crate::domain::entities::durable_status::DurableStatus;
use crate::infrastructure::storage::StorageError;
use std::path::{Path, PathBuf};
use tracing::warn;

/// JSON file holding [`DurableStatus`] across restarts.
#[derive(Debug, Clone)]
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable state starts fresh; the worst case is one
    /// redundant install.
    pub async fn load(&self) -> DurableStatus {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return DurableStatus::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "status_read_failed");
                return DurableStatus::default();
            }
        };
        serde_json::from_slice(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "status_parse_failed");
            DurableStatus::default()
        })
    }

    pub async fn save(&self, status: &DurableStatus) -> Result<(), StorageError> {
        let json = serde_json::to_vec(status)?;
        let mut tmp = self.path.as_os_str().to_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
