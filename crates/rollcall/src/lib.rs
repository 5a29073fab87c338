pub mod attendance;
pub mod config;
pub mod error;
pub mod telemetry;
