//! Flushed heartbeat payloads and their header-value encoding.
//!
//! The header value is compact JSON, base64-encoded:
//!
//! ```json
//! {"version":2,"heartbeats":[{"agent":"sdk/1.0","dates":["2021-11-01"]}]}
//! ```
//!
//! An empty payload encodes to the empty string, not to a JSON object with an
//! empty `heartbeats` array.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::error;

use super::day::HeartbeatDay;
use crate::error::{HeartbeatError, Result};

/// Wire format version of [`HeartbeatsPayload`].
pub const PAYLOAD_VERSION: u32 = 2;

/// All flushed days for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHeartbeats {
    pub agent: String,
    /// Ascending, unique.
    pub dates: Vec<HeartbeatDay>,
}

/// A snapshot of heartbeats taken out of the log by a flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatsPayload {
    version: u32,
    heartbeats: Vec<AgentHeartbeats>,
}

impl Default for HeartbeatsPayload {
    fn default() -> Self {
        Self::empty()
    }
}

impl HeartbeatsPayload {
    pub fn new(heartbeats: Vec<AgentHeartbeats>) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            heartbeats,
        }
    }

    /// The "nothing to report" payload.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn heartbeats(&self) -> &[AgentHeartbeats] {
        &self.heartbeats
    }

    pub fn is_empty(&self) -> bool {
        self.heartbeats.iter().all(|h| h.dates.is_empty())
    }

    /// Flushed days for `agent`, or an empty slice if it is absent.
    pub fn dates_for(&self, agent: &str) -> &[HeartbeatDay] {
        self.heartbeats
            .iter()
            .find(|h| h.agent == agent)
            .map(|h| h.dates.as_slice())
            .unwrap_or_default()
    }

    /// Transport header value: base64 of the compact JSON, or `""` when empty.
    pub fn header_value(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        match serde_json::to_vec(self) {
            Ok(json) => STANDARD.encode(json),
            Err(e) => {
                error!("Failed to serialize heartbeats payload: {}", e);
                String::new()
            }
        }
    }

    /// Parse a header value produced by [`header_value`](Self::header_value).
    pub fn from_header_value(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Self::empty());
        }

        let json = STANDARD
            .decode(value)
            .map_err(|e| HeartbeatError::Decode(format!("Invalid base64 header value: {}", e)))?;

        let payload: Self = serde_json::from_slice(&json).map_err(|e| {
            HeartbeatError::Decode(format!("Invalid heartbeats payload JSON: {}", e))
        })?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<()> {
        if self.version != PAYLOAD_VERSION {
            return Err(HeartbeatError::Decode(format!(
                "Unsupported heartbeats payload version {} (expected {})",
                self.version, PAYLOAD_VERSION
            )));
        }
        for entry in &self.heartbeats {
            if entry.dates.windows(2).any(|pair| pair[0] >= pair[1]) {
                return Err(HeartbeatError::Decode(format!(
                    "Dates for agent {:?} are not strictly ascending",
                    entry.agent
                )));
            }
        }
        Ok(())
    }
}
