pub mod device_health;
pub mod durable_status;
pub mod lease;
pub mod run_artifact;
pub mod test_job;
