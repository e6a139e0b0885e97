// Use case: prepare_browser.

use crate::application::context::AppContext;
use crate::application::usecases::detect_completion::WaitForNetworkIdleUseCase;
use crate::application::usecases::keep_alive::{LeaseError, LeaseKeeper};
use crate::domain::workflows::completion::WaitOutcome;
use crate::domain::workflows::launch_payload::command_line;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const COMMAND_LINE_FILE: &str = "chrome-command-line";

/// Starts the browser from a clean profile on the neutral page.
pub struct PrepareBrowserUseCase;

#[derive(Debug)]
pub enum PrepareBrowserError {
    Device(String),
    Workspace(String),
    Lease(LeaseError),
}

impl PrepareBrowserUseCase {
    /// Clear the profile, push the launch payload, open the neutral page and
    /// wait for its traffic to die down.
    #[instrument(skip(ctx, keeper))]
    pub async fn execute(
        ctx: &AppContext,
        keeper: &LeaseKeeper,
    ) -> Result<WaitOutcome, PrepareBrowserError> {
        let browser = ctx.device.browser().clone();
        let device_err = |e: crate::infrastructure::device::DeviceError| {
            PrepareBrowserError::Device(e.to_string())
        };

        // Step 1: Stop the browser and wipe its profile.
        ctx.device.reset_browser().await.map_err(device_err)?;

        // Step 2: Install the enterprise policy, when one is configured.
        if let Some(policy) = &browser.policy_file {
            ctx.device.remove(&browser.policy_path).await.map_err(device_err)?;
            ctx.device
                .push(policy, &browser.policy_path)
                .await
                .map_err(device_err)?;
        }

        // Step 3: Replace the command-line file.
        ctx.device
            .remove(&browser.command_line_path)
            .await
            .map_err(device_err)?;
        let payload = command_line();
        debug!(command_line = %payload, "browser_command_line");
        let local = ctx.workspace.path(COMMAND_LINE_FILE);
        tokio::fs::write(&local, payload)
            .await
            .map_err(|e| PrepareBrowserError::Workspace(e.to_string()))?;
        let pushed = ctx.device.push(&local, &browser.command_line_path).await;
        if let Err(e) = tokio::fs::remove_file(&local).await {
            warn!(error = %e, "command_line_cleanup_failed");
        }
        pushed.map_err(device_err)?;

        // Step 4: Launch on the neutral page and let it settle.
        ctx.device.navigate_blank().await.map_err(device_err)?;
        tokio::time::sleep(Duration::from_millis(browser.settle_delay_ms)).await;

        // Step 5: Network-idle barrier before any measured run.
        WaitForNetworkIdleUseCase::execute(ctx, keeper)
            .await
            .map_err(PrepareBrowserError::Lease)
    }
}
