pub mod acquire_lease;
pub mod capture_session;
pub mod complete_lease;
pub mod detect_completion;
pub mod install_browser;
pub mod keep_alive;
pub mod orchestrator_loop;
pub mod prepare_browser;
pub mod wait_for_device;
