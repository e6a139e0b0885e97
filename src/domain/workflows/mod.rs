pub mod completion;
pub mod launch_payload;
pub mod lease_policy;
pub mod readiness;
pub mod state_machine;
pub mod trace_config;
