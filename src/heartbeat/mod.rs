//! Heartbeat log - one usage ping per agent per UTC day, drained by flushes.

mod bundle;
pub mod clock;
mod controller;
mod day;
mod logger;
mod payload;

pub use bundle::{HeartbeatsBundle, BUNDLE_VERSION, DEFAULT_MAX_STORED_DAYS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{HeartbeatCode, HeartbeatController};
pub use day::HeartbeatDay;
pub use logger::HeartbeatLogger;
pub use payload::{AgentHeartbeats, HeartbeatsPayload, PAYLOAD_VERSION};
