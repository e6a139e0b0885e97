/// Device telemetry sampled for a readiness check. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceHealthSnapshot {
    pub battery_level: Option<u8>,
    pub battery_temp_c: Option<f32>,
    pub platform_version: String,
}
