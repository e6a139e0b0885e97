use crate::domain::entities::device_health::DeviceHealthSnapshot;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("device unavailable: {0}")]
    Unavailable(String),

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with status {status}: {stderr}")]
    ExitStatus {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A process started on the device that keeps running in the background.
#[async_trait]
pub trait BackgroundProcess: Send + Sync {
    /// Wait for the process to exit, killing it once `timeout` elapses.
    async fn wait(&mut self, timeout: Duration) -> Result<(), DeviceError>;
}

/// Control channel to one attached device.
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    /// Run a shell command on the device and return its stdout.
    async fn shell(&self, args: &[&str], timeout: Duration) -> Result<String, DeviceError>;
    /// Copy a local file to the device.
    async fn push(&self, local: &Path, remote: &str) -> Result<(), DeviceError>;
    /// Copy a device file to the local filesystem.
    async fn pull(&self, remote: &str, local: &Path) -> Result<(), DeviceError>;
    /// Start a long-running shell command without waiting for it.
    async fn start_background(&self, args: &[&str])
        -> Result<Box<dyn BackgroundProcess>, DeviceError>;
    /// Send `signal` to every device process whose name matches.
    async fn kill_process(&self, name: &str, signal: &str) -> Result<(), DeviceError>;
    /// Sample battery and platform telemetry.
    async fn health(&self) -> Result<DeviceHealthSnapshot, DeviceError>;
}
