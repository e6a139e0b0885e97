use crate::domain::entities::test_job::JobDescriptor;
use crate::infrastructure::storage::workspace::ScratchWorkspace;
use crate::infrastructure::storage::StorageError;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DESCRIPTOR_FILE: &str = "testinfo.json";
pub const IN_FLIGHT_MARKER: &str = ".running";
pub const DONE_MARKER: &str = ".done";
pub const ERROR_MARKER: &str = ".error";
pub const BUILDING_MARKER: &str = ".building";

/// Durable per-test directory: descriptor, status markers and artifacts.
#[derive(Debug, Clone)]
pub struct ResultDir {
    path: PathBuf,
}

impl ResultDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load_descriptor(&self) -> Result<JobDescriptor, StorageError> {
        let raw = tokio::fs::read(self.path.join(DESCRIPTOR_FILE)).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub async fn write_progress(&self, text: &str) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.path).await?;
        tokio::fs::write(self.path.join(IN_FLIGHT_MARKER), text).await?;
        Ok(())
    }

    pub async fn remove_marker(&self, marker: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path.join(marker)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Leave only `.done` behind.
    pub async fn mark_done(&self) -> Result<(), StorageError> {
        tokio::fs::write(self.path.join(DONE_MARKER), b"").await?;
        self.remove_marker(ERROR_MARKER).await?;
        self.remove_marker(IN_FLIGHT_MARKER).await
    }

    /// Leave only `.error` behind, carrying `message`.
    pub async fn mark_error(&self, message: &str) -> Result<(), StorageError> {
        tokio::fs::write(self.path.join(ERROR_MARKER), message).await?;
        self.remove_marker(IN_FLIGHT_MARKER).await?;
        self.remove_marker(DONE_MARKER).await
    }

    /// Move every file out of the workspace into this directory.
    pub async fn upload_from(&self, workspace: &ScratchWorkspace) -> Result<Vec<PathBuf>, StorageError> {
        tokio::fs::create_dir_all(&self.path).await?;

        let mut uploaded = Vec::new();
        for file in workspace.files().await? {
            let Some(name) = file.file_name() else {
                continue;
            };
            let dest = self.path.join(name);
            debug!(file = %file.display(), "uploading");
            if tokio::fs::rename(&file, &dest).await.is_err() {
                // Results usually live on another filesystem.
                tokio::fs::copy(&file, &dest).await?;
                tokio::fs::remove_file(&file).await?;
            }
            uploaded.push(dest);
        }
        Ok(uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn given_running_test_when_marked_done_should_leave_only_done() {
        let dir = tempfile::tempdir().unwrap();
        let results = ResultDir::new(dir.path());
        results.write_progress("Run 1 of 2 - Collecting trace data").await.unwrap();
        std::fs::write(dir.path().join(ERROR_MARKER), "stale").unwrap();

        results.mark_done().await.unwrap();

        assert!(dir.path().join(DONE_MARKER).exists());
        assert!(!dir.path().join(ERROR_MARKER).exists());
        assert!(!dir.path().join(IN_FLIGHT_MARKER).exists());
    }

    #[tokio::test]
    async fn given_running_test_when_marked_error_should_write_message() {
        let dir = tempfile::tempdir().unwrap();
        let results = ResultDir::new(dir.path());
        results.write_progress("Test started").await.unwrap();

        results.mark_error("Browser apk not available").await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join(ERROR_MARKER)).unwrap(),
            "Browser apk not available"
        );
        assert!(!dir.path().join(DONE_MARKER).exists());
        assert!(!dir.path().join(IN_FLIGHT_MARKER).exists());
    }

    #[tokio::test]
    async fn given_missing_directory_when_writing_progress_should_create_it() {
        let dir = tempfile::tempdir().unwrap();
        let results = ResultDir::new(dir.path().join("20240101/abc"));

        results.write_progress("Test started").await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("20240101/abc").join(IN_FLIGHT_MARKER)).unwrap(),
            "Test started"
        );
    }

    #[tokio::test]
    async fn given_workspace_files_when_uploaded_should_move_all() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = ScratchWorkspace::new(dir.path().join("tmp"));
        workspace.reset().await.unwrap();
        std::fs::write(workspace.path("001-screenshot.png"), b"png").unwrap();
        std::fs::write(workspace.path("test.log.gz"), b"gz").unwrap();
        let results = ResultDir::new(dir.path().join("results"));

        let uploaded = results.upload_from(&workspace).await.unwrap();

        assert_eq!(uploaded.len(), 2);
        assert!(dir.path().join("results/001-screenshot.png").exists());
        assert!(workspace.files().await.unwrap().is_empty());
    }
}
