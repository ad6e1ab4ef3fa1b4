//! Integration tests module
//!
//! End-to-end flows across the alert, audio, config and request modules.

pub mod alert_flow_test;
pub mod config_test;
pub mod playback_test;
