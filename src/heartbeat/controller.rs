//! Synchronous heartbeat log.
//!
//! [`HeartbeatController`] records at most one heartbeat per agent per UTC
//! day and drains them through [`flush`](HeartbeatController::flush) or
//! [`flush_today`](HeartbeatController::flush_today). Every operation is a
//! single [`HeartbeatStorage::get_and_set`] call, so callers on different
//! threads never observe a half-applied update.

use std::sync::Arc;

use tracing::{debug, info};

use super::bundle::{HeartbeatsBundle, DEFAULT_MAX_STORED_DAYS};
use super::clock::{Clock, SystemClock};
use super::day::HeartbeatDay;
use super::payload::HeartbeatsPayload;
use crate::config::Config;
use crate::error::Result;
use crate::storage::{FileStorage, HeartbeatStorage};

/// Heartbeat code for platform logging V1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeartbeatCode {
    None = 0,
    Sdk = 1,
    Global = 2,
    Combined = 3,
}

impl HeartbeatCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Per-agent, UTC-day-bucketed heartbeat log over a storage backend.
pub struct HeartbeatController {
    storage: Arc<dyn HeartbeatStorage>,
    clock: Arc<dyn Clock>,
    max_stored_days: usize,
}

impl std::fmt::Debug for HeartbeatController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatController")
            .field("max_stored_days", &self.max_stored_days)
            .finish_non_exhaustive()
    }
}

impl HeartbeatController {
    /// Controller over `storage`, reading the system clock.
    pub fn new(storage: Arc<dyn HeartbeatStorage>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            max_stored_days: DEFAULT_MAX_STORED_DAYS,
        }
    }

    /// File-backed controller for the configured app.
    pub fn from_config(config: &Config) -> Self {
        let storage = FileStorage::new(config.storage_path());
        Self::new(Arc::new(storage)).with_max_stored_days(config.max_stored_days)
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Per-agent cap on stored days. `0` means unbounded.
    pub fn with_max_stored_days(mut self, max_stored_days: usize) -> Self {
        self.max_stored_days = max_stored_days;
        self
    }

    fn today(&self) -> HeartbeatDay {
        HeartbeatDay::of(&self.clock.now())
    }

    /// Record a heartbeat for `agent` on today's UTC date, if not already present.
    pub fn log(&self, agent: &str) -> Result<()> {
        if agent.is_empty() {
            debug!("Ignoring heartbeat with empty agent");
            return Ok(());
        }

        let today = self.today();
        let max_stored_days = self.max_stored_days;
        let mut added = false;

        self.storage.get_and_set(&mut |current| {
            let mut bundle = current.unwrap_or_default();
            added = bundle.insert(agent, today, max_stored_days);
            Some(bundle)
        })?;

        if added {
            info!(agent, date = %today, "Logged heartbeat");
        } else {
            debug!(agent, date = %today, "Heartbeat not stored (already logged or past the day cap)");
        }
        Ok(())
    }

    /// Take every stored heartbeat, leaving the log empty.
    pub fn flush(&self) -> Result<HeartbeatsPayload> {
        let previous = self.storage.get_and_set(&mut |_| None)?;
        let payload = previous.map(HeartbeatsBundle::into_payload).unwrap_or_default();
        debug!(agents = payload.heartbeats().len(), "Flushed heartbeats");
        Ok(payload)
    }

    /// Take only today's heartbeats, across all agents.
    ///
    /// Other days stay in the log. When nothing is dated today the stored
    /// bundle is left as-is and the empty payload is returned.
    pub fn flush_today(&self) -> Result<HeartbeatsPayload> {
        let today = self.today();
        let mut taken = HeartbeatsBundle::new();

        self.storage.get_and_set(&mut |current| {
            let mut bundle = current?;
            let todays = bundle.take_day(today);
            if todays.is_empty() {
                return Some(bundle);
            }
            taken = todays;
            (!bundle.is_empty()).then_some(bundle)
        })?;

        debug!(agents = taken.agent_count(), date = %today, "Flushed today's heartbeats");
        Ok(taken.into_payload())
    }

    /// V1 heartbeat code: flushes today's heartbeats and reports whether any existed.
    pub fn heartbeat_code(&self) -> Result<HeartbeatCode> {
        let payload = self.flush_today()?;
        Ok(if payload.is_empty() {
            HeartbeatCode::None
        } else {
            HeartbeatCode::Global
        })
    }
}
