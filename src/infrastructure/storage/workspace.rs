use std::path::PathBuf;

/// Local scratch directory that collects a job's files before upload.
#[derive(Debug, Clone)]
pub struct ScratchWorkspace {
    root: PathBuf,
}

impl ScratchWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Wipe whatever a previous job left and start empty.
    pub async fn reset(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tokio::fs::create_dir_all(&self.root).await
    }

    pub async fn files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}
