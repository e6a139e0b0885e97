use crate::domain::entities::device_health::DeviceHealthSnapshot;
use crate::infrastructure::device::channel::{BackgroundProcess, DeviceChannel, DeviceError};
use crate::infrastructure::device::parse::{parse_battery, parse_pids, parse_platform_version};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Device channel backed by the `adb` command-line tool.
pub struct AdbDevice {
    adb: String,
    serial: Option<String>,
    transfer_timeout: Duration,
}

impl AdbDevice {
    pub fn new(adb: impl Into<String>, serial: Option<String>, transfer_timeout: Duration) -> Self {
        Self {
            adb: adb.into(),
            serial,
            transfer_timeout,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb);
        if let Some(serial) = &self.serial {
            cmd.args(["-s", serial]);
        }
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<String, DeviceError> {
        let label = args.join(" ");
        debug!(command = %label, "adb");

        let mut cmd = self.command(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        // kill_on_drop reaps the child when the timeout drops the future.
        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| DeviceError::Timeout {
                command: label.clone(),
                timeout,
            })??;

        if !output.status.success() {
            return Err(DeviceError::ExitStatus {
                command: label,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl DeviceChannel for AdbDevice {
    async fn shell(&self, args: &[&str], timeout: Duration) -> Result<String, DeviceError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.run(&full, timeout).await
    }

    async fn push(&self, local: &Path, remote: &str) -> Result<(), DeviceError> {
        let local = local.to_string_lossy();
        self.run(&["push", &*local, remote], self.transfer_timeout)
            .await
            .map(|_| ())
    }

    async fn pull(&self, remote: &str, local: &Path) -> Result<(), DeviceError> {
        let local = local.to_string_lossy();
        self.run(&["pull", remote, &*local], self.transfer_timeout)
            .await
            .map(|_| ())
    }

    async fn start_background(
        &self,
        args: &[&str],
    ) -> Result<Box<dyn BackgroundProcess>, DeviceError> {
        let label = args.join(" ");
        debug!(command = %label, "adb_background");

        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        let mut cmd = self.command(&full);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        let child = cmd.spawn()?;

        Ok(Box::new(AdbProcess { child, label }))
    }

    async fn kill_process(&self, name: &str, signal: &str) -> Result<(), DeviceError> {
        let listing = self.shell(&["ps", "-A"], self.transfer_timeout).await?;
        for pid in parse_pids(&listing, name) {
            let pid = pid.to_string();
            self.shell(&["kill", signal, pid.as_str()], self.transfer_timeout)
                .await?;
        }
        Ok(())
    }

    async fn health(&self) -> Result<DeviceHealthSnapshot, DeviceError> {
        let timeout = Duration::from_secs(10);
        let release = self
            .shell(&["getprop", "ro.build.version.release"], timeout)
            .await
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;
        let platform_version = parse_platform_version(&release)
            .ok_or_else(|| DeviceError::Unavailable("no platform version".to_string()))?;

        let battery = self.shell(&["dumpsys", "battery"], timeout).await?;
        let (battery_level, battery_temp_c) = parse_battery(&battery);

        Ok(DeviceHealthSnapshot {
            battery_level,
            battery_temp_c,
            platform_version,
        })
    }
}

struct AdbProcess {
    child: Child,
    label: String,
}

#[async_trait]
impl BackgroundProcess for AdbProcess {
    async fn wait(&mut self, timeout: Duration) -> Result<(), DeviceError> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(command = %self.label, status = ?status.code(), "adb_background_exit");
                Ok(())
            }
            Err(_) => {
                warn!(command = %self.label, "adb_background_kill");
                self.child.kill().await?;
                Err(DeviceError::Timeout {
                    command: self.label.clone(),
                    timeout,
                })
            }
        }
    }
}
