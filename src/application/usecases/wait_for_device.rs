// Use case: wait_for_device.

use crate::application::context::AppContext;
use crate::domain::entities::device_health::DeviceHealthSnapshot;
use crate::domain::workflows::readiness::NotReadyReason;
use crate::infrastructure::device::DeviceError;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Blocks until the device is attached and passes the readiness gate.
pub struct WaitForDeviceUseCase;

#[derive(Debug)]
pub enum DeviceNotReady {
    Unavailable(DeviceError),
    Gate(Vec<NotReadyReason>),
}

impl WaitForDeviceUseCase {
    /// Poll until ready; `None` when shutdown arrives first.
    pub async fn execute(
        ctx: &AppContext,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<DeviceHealthSnapshot> {
        let poll = Duration::from_millis(ctx.settings.device.readiness_poll_ms);
        loop {
            if *shutdown.borrow() {
                return None;
            }

            // Step 1: Check health against the gate.
            match Self::check(ctx).await {
                Ok(health) => {
                    // Step 2: First-ready setup, then hand the device over.
                    ctx.device.initialize_once().await;
                    info!(platform = %health.platform_version, battery = ?health.battery_level, "device_ready");
                    return Some(health);
                }
                Err(DeviceNotReady::Unavailable(e)) => {
                    debug!(error = %e, "device_not_detected");
                }
                Err(DeviceNotReady::Gate(reasons)) => {
                    for reason in reasons {
                        match reason {
                            NotReadyReason::LowBattery(level) => {
                                info!(level, "device_not_ready_low_battery")
                            }
                            NotReadyReason::HighTemperature(temp) => {
                                info!(temp, "device_not_ready_high_temperature")
                            }
                        }
                    }
                }
            }

            // Step 3: Sleep until the next poll or shutdown.
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }

    /// One readiness check.
    pub async fn check(ctx: &AppContext) -> Result<DeviceHealthSnapshot, DeviceNotReady> {
        let health = ctx
            .device
            .health()
            .await
            .map_err(DeviceNotReady::Unavailable)?;
        ctx.settings
            .readiness_gate()
            .evaluate(&health)
            .map_err(DeviceNotReady::Gate)?;
        Ok(health)
    }
}
