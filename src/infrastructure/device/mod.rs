pub mod adb;
pub mod channel;
pub mod parse;

pub use adb::AdbDevice;
pub use channel::{BackgroundProcess, DeviceChannel, DeviceError};
