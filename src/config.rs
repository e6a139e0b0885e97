use crate::domain::workflows::completion::{CompletionPolicy, NetworkIdlePolicy};
use crate::domain::workflows::lease_policy::LeasePolicy;
use crate::domain::workflows::readiness::ReadinessGate;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub device: Device,
    pub queue: Queue,
    pub paths: Paths,
    pub browser: Browser,
    pub detector: Detector,
    pub network_idle: NetworkIdle,
    pub capture: Capture,
    pub converter: Converter,
    #[serde(default)]
    pub shaper: Shaper,
    pub logging: Logging,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Device {
    pub serial: Option<String>,
    pub adb_path: String,
    pub min_battery_level: u8,
    pub max_temperature_c: f32,
    pub readiness_poll_ms: u64,
    pub shell_timeout_seconds: u64,
    pub transfer_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Queue {
    pub addr: String,
    pub watch_tube: String,
    pub downstream_tube: Option<String>,
    pub reserve_timeout_seconds: u64,
    pub reservation_timeout_seconds: u64,
    pub keep_alive_interval_seconds: u64,
    pub error_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Paths {
    pub results_dir: PathBuf,
    pub apk_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub status_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Browser {
    pub package: String,
    pub activity: String,
    pub blank_url: String,
    pub command_line_path: String,
    pub policy_path: String,
    pub policy_file: Option<PathBuf>,
    pub remote_install_path: String,
    pub settle_delay_ms: u64,
    pub navigation_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Detector {
    pub startup_timeout_seconds: u64,
    pub total_timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub startup_threshold_bytes: i64,
    pub idle_threshold_bytes: i64,
    pub settle_idle_polls: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkIdle {
    pub timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub threshold_bytes: i64,
    pub idle_polls: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Capture {
    pub remote_video: String,
    pub video_bit_rate: u32,
    pub remote_trace_config: String,
    pub remote_trace: String,
    pub remote_screenshot: String,
    pub trace_template: Option<PathBuf>,
    pub trace_template_cpu: Option<PathBuf>,
    pub stop_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Converter {
    pub command: Vec<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Shaper {
    pub host: Option<String>,
    #[serde(default = "default_shaper_interface")]
    pub interface: String,
}

fn default_shaper_interface() -> String {
    "wlan0".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Logging {
    pub filter: String,
}

impl Settings {
    pub fn lease_policy(&self) -> LeasePolicy {
        LeasePolicy::new(
            Duration::from_secs(self.queue.reservation_timeout_seconds),
            Duration::from_secs(self.queue.keep_alive_interval_seconds),
        )
    }

    pub fn completion_policy(&self) -> CompletionPolicy {
        CompletionPolicy {
            startup_timeout: Duration::from_secs(self.detector.startup_timeout_seconds),
            total_timeout: Duration::from_secs(self.detector.total_timeout_seconds),
            poll_interval: Duration::from_millis(self.detector.poll_interval_ms),
            startup_threshold_bytes: self.detector.startup_threshold_bytes,
            idle_threshold_bytes: self.detector.idle_threshold_bytes,
            settle_idle_polls: self.detector.settle_idle_polls,
        }
    }

    pub fn network_idle_policy(&self) -> NetworkIdlePolicy {
        NetworkIdlePolicy {
            timeout: Duration::from_secs(self.network_idle.timeout_seconds),
            poll_interval: Duration::from_millis(self.network_idle.poll_interval_ms),
            threshold_bytes: self.network_idle.threshold_bytes,
            idle_polls: self.network_idle.idle_polls,
        }
    }

    pub fn readiness_gate(&self) -> ReadinessGate {
        ReadinessGate {
            min_battery_level: self.device.min_battery_level,
            max_temperature_c: self.device.max_temperature_c,
        }
    }

    /// One status file per device so several agents can share a checkout.
    pub fn status_file(&self) -> PathBuf {
        let name = match &self.device.serial {
            Some(serial) => format!("status{serial}.json"),
            None => "status.json".to_string(),
        };
        self.paths.status_dir.join(name)
    }

    /// Scratch space is per device for the same reason.
    pub fn scratch_dir(&self) -> PathBuf {
        match &self.device.serial {
            Some(serial) => {
                let mut name = self
                    .paths
                    .scratch_dir
                    .file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_else(|| "tmp".into());
                name.push(serial);
                self.paths.scratch_dir.with_file_name(name)
            }
            None => self.paths.scratch_dir.clone(),
        }
    }
}

/// Load settings from `config/default.toml`, `config/<env>.toml`, and env overrides.
pub fn load() -> Result<Settings, config::ConfigError> {
    let env_name = std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());
    config::Config::builder()
        .add_source(config::File::with_name("config/default"))
        .add_source(config::File::with_name(&format!("config/{env_name}")).required(false))
        .add_source(config::Environment::with_prefix("TRACEAGENT").separator("__"))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    pub fn settings(root: &std::path::Path) -> Settings {
        Settings {
            device: Device {
                serial: None,
                adb_path: "adb".to_string(),
                min_battery_level: 50,
                max_temperature_c: 36.0,
                readiness_poll_ms: 1_000,
                shell_timeout_seconds: 60,
                transfer_timeout_seconds: 120,
            },
            queue: Queue {
                addr: "127.0.0.1:11300".to_string(),
                watch_tube: "test".to_string(),
                downstream_tube: None,
                reserve_timeout_seconds: 30,
                reservation_timeout_seconds: 30,
                keep_alive_interval_seconds: 10,
                error_backoff_ms: 1_000,
            },
            paths: Paths {
                results_dir: root.join("results"),
                apk_dir: root.join("apks"),
                scratch_dir: root.join("tmp"),
                status_dir: root.to_path_buf(),
            },
            browser: Browser {
                package: "org.chromium.chrome".to_string(),
                activity: "com.google.android.apps.chrome.Main".to_string(),
                blank_url: "https://trace-o-matic.com/blank.html".to_string(),
                command_line_path: "/data/local/tmp/chrome-command-line".to_string(),
                policy_path: "/data/local/tmp/policies/recommended/policies.json".to_string(),
                policy_file: None,
                remote_install_path: "/data/local/tmp/trace-agent.apk".to_string(),
                settle_delay_ms: 10_000,
                navigation_delay_ms: 2_000,
            },
            detector: Detector {
                startup_timeout_seconds: 30,
                total_timeout_seconds: 120,
                poll_interval_ms: 5_000,
                startup_threshold_bytes: 50_000,
                idle_threshold_bytes: 10_000,
                settle_idle_polls: 4,
            },
            network_idle: NetworkIdle {
                timeout_seconds: 60,
                poll_interval_ms: 1_000,
                threshold_bytes: 10_000,
                idle_polls: 5,
            },
            capture: Capture {
                remote_video: "/data/local/tmp/tom_video.mp4".to_string(),
                video_bit_rate: 8_000_000,
                remote_trace_config: "/data/misc/perfetto-configs/tom.pbtx".to_string(),
                remote_trace: "/data/misc/perfetto-traces/trace".to_string(),
                remote_screenshot: "/data/local/tmp/tom_screenshot.png".to_string(),
                trace_template: None,
                trace_template_cpu: None,
                stop_timeout_seconds: 10,
            },
            converter: Converter {
                command: vec!["traceconv".to_string()],
                timeout_seconds: 300,
            },
            shaper: Shaper::default(),
            logging: Logging {
                filter: "trace_agent=debug".to_string(),
            },
        }
    }
}
