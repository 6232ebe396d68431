//! heartbeat-log - calendar-day-bucketed, per-agent heartbeat logging

pub mod config;
pub mod error;
pub mod heartbeat;
pub mod storage;

pub use config::Config;
pub use error::{HeartbeatError, Result};
pub use heartbeat::{HeartbeatController, HeartbeatLogger, HeartbeatsPayload};
