use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

const SSH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ShaperError {
    #[error("`{0}` timed out")]
    Timeout(String),

    #[error("`{command}` exited with status {status}")]
    ExitStatus { command: String, status: i32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Applies `tc netem` latency on the router the device is attached to.
#[derive(Debug, Clone)]
pub struct TrafficShaper {
    host: String,
    interface: String,
}

impl TrafficShaper {
    pub fn new(host: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            interface: interface.into(),
        }
    }

    /// Remove any shaping. The qdisc may already be absent, so the exit status is ignored.
    pub async fn reset(&self) -> Result<(), ShaperError> {
        let command = self.reset_command();
        self.ssh(&command).await.map(|_| ())
    }

    pub async fn configure(&self, latency_ms: u32) -> Result<(), ShaperError> {
        self.reset().await?;
        if latency_ms == 0 {
            return Ok(());
        }
        info!(latency_ms, interface = %self.interface, "traffic_shaping");
        let command = self.delay_command(latency_ms);
        let status = self.ssh(&command).await?;
        if status != 0 {
            return Err(ShaperError::ExitStatus { command, status });
        }
        Ok(())
    }

    fn reset_command(&self) -> String {
        format!("tc qdisc del dev {} root", self.interface)
    }

    fn delay_command(&self, latency_ms: u32) -> String {
        format!(
            "tc qdisc add dev {} root netem delay {}ms",
            self.interface, latency_ms
        )
    }

    async fn ssh(&self, command: &str) -> Result<i32, ShaperError> {
        debug!(host = %self.host, command, "shaper_ssh");
        let status = tokio::time::timeout(
            SSH_TIMEOUT,
            Command::new("ssh")
                .arg(&self.host)
                .arg(command)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await
        .map_err(|_| ShaperError::Timeout(command.to_string()))??;
        Ok(status.code().unwrap_or(-1))
    }
}
