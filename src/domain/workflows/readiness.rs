use crate::domain::entities::device_health::DeviceHealthSnapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NotReadyReason {
    LowBattery(u8),
    HighTemperature(f32),
}

/// Health precondition checked before a job is accepted.
///
/// Readings the device did not report are not held against it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadinessGate {
    pub min_battery_level: u8,
    pub max_temperature_c: f32,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self {
            min_battery_level: 50,
            max_temperature_c: 36.0,
        }
    }
}

impl ReadinessGate {
    pub fn evaluate(&self, health: &DeviceHealthSnapshot) -> Result<(), Vec<NotReadyReason>> {
        let mut reasons = Vec::new();

        if let Some(level) = health.battery_level {
            if level < self.min_battery_level {
                reasons.push(NotReadyReason::LowBattery(level));
            }
        }
        if let Some(temp) = health.battery_temp_c {
            if temp > self.max_temperature_c {
                reasons.push(NotReadyReason::HighTemperature(temp));
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(reasons)
        }
    }
}
