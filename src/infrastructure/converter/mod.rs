use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("converter is not configured")]
    NotConfigured,

    #[error("converter timed out after {0:?}")]
    Timeout(Duration),

    #[error("converter exited with status {status}: {stderr}")]
    ExitStatus { status: i32, stderr: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a binary trace into the readable JSON format.
#[async_trait]
pub trait TraceConverter: Send + Sync {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

/// Runs `<command...> json <input> <output>`.
pub struct CommandTraceConverter {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandTraceConverter {
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    fn args(&self, input: &Path, output: &Path) -> Vec<PathBuf> {
        self.command
            .iter()
            .skip(1)
            .map(PathBuf::from)
            .chain([PathBuf::from("json"), input.to_path_buf(), output.to_path_buf()])
            .collect()
    }
}

#[async_trait]
impl TraceConverter for CommandTraceConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let program = self.command.first().ok_or(ConvertError::NotConfigured)?;
        debug!(program = %program, input = %input.display(), "trace_convert");

        let result = tokio::time::timeout(
            self.timeout,
            Command::new(program)
                .args(self.args(input, output))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ConvertError::Timeout(self.timeout))??;

        if !result.status.success() {
            return Err(ConvertError::ExitStatus {
                status: result.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
