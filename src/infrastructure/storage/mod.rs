pub mod compress;
pub mod result_dir;
pub mod status_store;
pub mod workspace;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}
