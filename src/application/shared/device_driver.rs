use crate::config::{Browser, Capture};
use crate::domain::entities::device_health::DeviceHealthSnapshot;
use crate::infrastructure::device::parse::{has_blocking_dialog, parse_ls_size, parse_rx_bytes};
use crate::infrastructure::device::{BackgroundProcess, DeviceChannel, DeviceError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Apps known to pop over the browser when they are installed.
const POP_OVER_APPS: &[&str] = &[
    "com.motorola.ccc.ota",
    "com.google.android.apps.docs",
    "com.samsung.android.MtpApplication",
];

/// System apps that collect cruft between tests.
const CRUFT_APPS: &[&str] = &[
    "com.android.providers.downloads",
    "com.google.android.googlequicksearchbox",
    "com.google.android.youtube",
    "com.motorola.motocare",
];

const EMERGENCY_ALERT_RECEIVERS: &[&str] = &[
    "com.android.cellbroadcastreceiver",
    "com.google.android.cellbroadcastreceiver",
];

/// Browser and capture operations on top of a [`DeviceChannel`].
pub struct DeviceDriver {
    channel: Arc<dyn DeviceChannel>,
    browser: Browser,
    capture: Capture,
    shell_timeout: Duration,
    last_rx_total: AtomicU64,
    initialized: AtomicBool,
    installed_pop_overs: Mutex<HashMap<&'static str, bool>>,
}

impl DeviceDriver {
    pub fn new(
        channel: Arc<dyn DeviceChannel>,
        browser: Browser,
        capture: Capture,
        shell_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            browser,
            capture,
            shell_timeout,
            last_rx_total: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
            installed_pop_overs: Mutex::new(HashMap::new()),
        }
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    pub async fn shell(&self, args: &[&str]) -> Result<String, DeviceError> {
        self.channel.shell(args, self.shell_timeout).await
    }

    pub async fn push(&self, local: &Path, remote: &str) -> Result<(), DeviceError> {
        self.channel.push(local, remote).await
    }

    pub async fn pull(&self, remote: &str, local: &Path) -> Result<(), DeviceError> {
        self.channel.pull(remote, local).await
    }

    pub async fn start_background(
        &self,
        args: &[&str],
    ) -> Result<Box<dyn BackgroundProcess>, DeviceError> {
        self.channel.start_background(args).await
    }

    pub async fn kill_process(&self, name: &str, signal: &str) -> Result<(), DeviceError> {
        self.channel.kill_process(name, signal).await
    }

    pub async fn health(&self) -> Result<DeviceHealthSnapshot, DeviceError> {
        self.channel.health().await
    }

    /// `rm -f`, so a missing file is not an error.
    pub async fn remove(&self, remote: &str) -> Result<(), DeviceError> {
        self.shell(&["rm", "-f", remote]).await.map(|_| ())
    }

    pub async fn navigate(&self, url: &str) -> Result<(), DeviceError> {
        let activity = format!("{}/{}", self.browser.package, self.browser.activity);
        self.shell(&[
            "am",
            "start",
            "-n",
            activity.as_str(),
            "-a",
            "android.intent.action.VIEW",
            "-d",
            url,
            "--es",
            "com.android.browser.application_id",
            "com.android.browser",
        ])
        .await
        .map(|_| ())
    }

    pub async fn navigate_blank(&self) -> Result<(), DeviceError> {
        let blank = self.browser.blank_url.clone();
        self.navigate(&blank).await
    }

    pub async fn force_stop(&self) -> Result<(), DeviceError> {
        self.shell(&["am", "force-stop", self.browser.package.as_str()])
            .await
            .map(|_| ())
    }

    pub async fn clear_profile(&self) -> Result<(), DeviceError> {
        self.shell(&["pm", "clear", self.browser.package.as_str()])
            .await
            .map(|_| ())
    }

    /// Stop the browser and wipe its profile.
    pub async fn reset_browser(&self) -> Result<(), DeviceError> {
        self.force_stop().await?;
        self.clear_profile().await
    }

    pub async fn install(&self, package: &Path) -> Result<(), DeviceError> {
        let remote = self.browser.remote_install_path.as_str();
        self.push(package, remote).await?;
        let installed = self.shell(&["pm", "install", "-r", remote]).await;
        if let Err(e) = self.remove(remote).await {
            debug!(error = %e, "install_cleanup_failed");
        }
        installed.map(|_| ())
    }

    /// Current size of the in-progress screen recording; 0 when absent.
    pub async fn video_size(&self) -> Result<u64, DeviceError> {
        let out = self.shell(&["ls", "-l", self.capture.remote_video.as_str()]).await?;
        Ok(parse_ls_size(&out).unwrap_or(0))
    }

    /// Bytes received on non-loopback interfaces since the previous call.
    pub async fn bytes_received_delta(&self) -> Result<i64, DeviceError> {
        let out = self.shell(&["cat", "/proc/net/dev"]).await?;
        let total = parse_rx_bytes(&out);
        let previous = self.last_rx_total.swap(total, Ordering::SeqCst);
        Ok(total as i64 - previous as i64)
    }

    pub async fn screenshot(&self, local: &Path) -> Result<(), DeviceError> {
        let remote = self.capture.remote_screenshot.as_str();
        self.remove(remote).await?;
        self.shell(&["screencap", "-p", remote]).await?;
        self.pull(remote, local).await
    }

    /// Dismiss UI, silence notifications and drop cruft left by earlier tests.
    /// Every step is best-effort.
    pub async fn cleanup(&self) {
        self.best_effort(&["input", "keyevent", "3"]).await;
        self.best_effort(&["settings", "put", "global", "heads_up_notifications_enabled", "0"])
            .await;

        for app in POP_OVER_APPS {
            if self.is_installed(app).await {
                self.best_effort(&["am", "force-stop", app]).await;
            }
        }

        self.best_effort(&[
            "rm",
            "-rf",
            "/sdcard/Download/*",
            "/sdcard/Backucup",
            "/sdcard/UCDownloads",
            self.capture.remote_video.as_str(),
        ])
        .await;
        for app in CRUFT_APPS {
            self.best_effort(&["pm", "clear", app]).await;
        }

        let windows = match self.shell(&["dumpsys", "window", "windows"]).await {
            Ok(out) => out,
            Err(e) => {
                debug!(error = %e, "window_dump_failed");
                return;
            }
        };
        if has_blocking_dialog(&windows) {
            warn!("dismissing_system_dialog");
            self.best_effort(&["input", "keyevent", "KEYCODE_DPAD_RIGHT"]).await;
            self.best_effort(&["input", "keyevent", "KEYCODE_DPAD_RIGHT"]).await;
            self.best_effort(&["input", "keyevent", "KEYCODE_ENTER"]).await;
        }
        if windows.contains("com.google.android.apps.gsa.staticplugins.opa.errorui.OpaErrorActivity") {
            self.best_effort(&["am", "force-stop", "com.google.android.googlequicksearchbox"])
                .await;
        }
        if windows.contains("com.motorola.ccc.ota/com.motorola.ccc.ota.ui.DownloadActivity") {
            self.best_effort(&["am", "force-stop", "com.motorola.ccc.ota"]).await;
        }
    }

    /// One-time setup the first time the device passes the readiness gate.
    pub async fn initialize_once(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        self.best_effort(&["input", "keyevent", "25"]).await;
        for receiver in EMERGENCY_ALERT_RECEIVERS {
            self.best_effort(&["pm", "uninstall", "-k", "--user", "0", receiver])
                .await;
        }
        self.cleanup().await;
    }

    async fn is_installed(&self, app: &'static str) -> bool {
        let known = self
            .installed_pop_overs
            .lock()
            .map(|cache| cache.get(app).copied())
            .unwrap_or(None);
        if let Some(installed) = known {
            return installed;
        }

        let installed = self
            .shell(&["dumpsys", "package", app])
            .await
            .map(|out| out.contains("versionName"))
            .unwrap_or(false);
        if let Ok(mut cache) = self.installed_pop_overs.lock() {
            cache.insert(app, installed);
        }
        installed
    }

    async fn best_effort(&self, args: &[&str]) {
        if let Err(e) = self.shell(args).await {
            debug!(command = %args.join(" "), error = %e, "device_command_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::application::context::test_support::test_context;
    use std::path::Path;

    #[tokio::test]
    async fn given_growing_counters_when_sampled_should_report_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _queue, device) = test_context(dir.path());
        device.script_rx([1_000, 4_000, 4_500]);

        ctx.device.bytes_received_delta().await.unwrap();
        assert_eq!(ctx.device.bytes_received_delta().await.unwrap(), 3_000);
        assert_eq!(ctx.device.bytes_received_delta().await.unwrap(), 500);
    }

    #[tokio::test]
    async fn given_package_when_installed_should_push_install_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _queue, device) = test_context(dir.path());

        ctx.device.install(Path::new("/apks/123.apk")).await.unwrap();

        assert_eq!(device.install_count(), 1);
        let calls = device.calls();
        let install = calls
            .iter()
            .position(|c| c.starts_with("pm install -r"))
            .unwrap();
        assert!(calls[install - 1].starts_with("push /apks/123.apk"));
        assert!(calls[install + 1].starts_with("rm -f"));
    }

    #[tokio::test]
    async fn given_ready_device_when_initialized_twice_should_run_setup_once() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _queue, device) = test_context(dir.path());

        ctx.device.initialize_once().await;
        ctx.device.initialize_once().await;

        let volume = device
            .calls()
            .iter()
            .filter(|c| c.as_str() == "input keyevent 25")
            .count();
        assert_eq!(volume, 1);
    }
}
