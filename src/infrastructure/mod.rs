pub mod converter;
pub mod device;
pub mod logging;
pub mod network;
pub mod queue;
pub mod storage;
