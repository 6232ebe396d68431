//! Stored heartbeat state.
//!
//! A [`HeartbeatsBundle`] maps each agent to the set of UTC days it has
//! logged on. Agents keep first-seen order; each agent's days are a
//! `BTreeSet`, so they are unique and ascending by construction.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::day::HeartbeatDay;
use super::payload::{AgentHeartbeats, HeartbeatsPayload};

/// Version tag written into the stored bundle.
pub const BUNDLE_VERSION: u32 = 1;

/// Default per-agent cap on stored days.
pub const DEFAULT_MAX_STORED_DAYS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AgentEntry {
    agent: String,
    dates: BTreeSet<HeartbeatDay>,
}

/// Aggregate heartbeat state as held by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatsBundle {
    version: u32,
    entries: Vec<AgentEntry>,
}

impl Default for HeartbeatsBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatsBundle {
    pub fn new() -> Self {
        Self {
            version: BUNDLE_VERSION,
            entries: Vec::new(),
        }
    }

    /// Whether no agent has any stored day.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|e| e.dates.is_empty())
    }

    /// Number of agents with at least one stored day.
    pub fn agent_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.dates.is_empty()).count()
    }

    /// Stored days for `agent`, ascending.
    pub fn dates_for(&self, agent: &str) -> Vec<HeartbeatDay> {
        self.entry(agent)
            .map(|e| e.dates.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Record `(agent, day)`. Returns `false` if nothing was stored.
    ///
    /// With a non-zero `max_stored_days`, the agent's oldest days are evicted
    /// until it holds at most that many. A day older than every stored day of
    /// an agent already at the cap would be evicted at once, so it is refused.
    pub fn insert(&mut self, agent: &str, day: HeartbeatDay, max_stored_days: usize) -> bool {
        let idx = match self.entries.iter().position(|e| e.agent == agent) {
            Some(idx) => idx,
            None => {
                self.entries.push(AgentEntry {
                    agent: agent.to_string(),
                    dates: BTreeSet::new(),
                });
                self.entries.len() - 1
            }
        };

        let dates = &mut self.entries[idx].dates;
        if max_stored_days > 0 && dates.len() >= max_stored_days {
            if let Some(oldest) = dates.first() {
                if day < *oldest {
                    return false;
                }
            }
        }
        if !dates.insert(day) {
            return false;
        }
        if max_stored_days > 0 {
            while dates.len() > max_stored_days {
                dates.pop_first();
            }
        }
        true
    }

    /// Remove every agent's `day` entry and return them as a bundle.
    ///
    /// Agents left without days are dropped from `self`. The returned bundle
    /// is empty when nothing matched, and `self` is then untouched.
    pub fn take_day(&mut self, day: HeartbeatDay) -> HeartbeatsBundle {
        let mut taken = HeartbeatsBundle::new();
        for entry in &mut self.entries {
            if entry.dates.remove(&day) {
                taken.entries.push(AgentEntry {
                    agent: entry.agent.clone(),
                    dates: BTreeSet::from([day]),
                });
            }
        }
        if !taken.is_empty() {
            self.entries.retain(|e| !e.dates.is_empty());
        }
        taken
    }

    /// Consume the bundle into a wire payload.
    pub fn into_payload(self) -> HeartbeatsPayload {
        let heartbeats = self
            .entries
            .into_iter()
            .filter(|e| !e.dates.is_empty())
            .map(|e| AgentHeartbeats {
                agent: e.agent,
                dates: e.dates.into_iter().collect(),
            })
            .collect();
        HeartbeatsPayload::new(heartbeats)
    }

    fn entry(&self, agent: &str) -> Option<&AgentEntry> {
        self.entries.iter().find(|e| e.agent == agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> HeartbeatDay {
        HeartbeatDay::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn test_new_bundle_is_empty() {
        let bundle = HeartbeatsBundle::new();
        assert!(bundle.is_empty());
        assert_eq!(bundle.agent_count(), 0);
        assert!(bundle.into_payload().is_empty());
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut bundle = HeartbeatsBundle::new();
        assert!(bundle.insert("sdk/1.0", day(2021, 11, 1), 0));
        assert!(!bundle.insert("sdk/1.0", day(2021, 11, 1), 0));
        assert_eq!(bundle.dates_for("sdk/1.0"), vec![day(2021, 11, 1)]);
    }

    #[test]
    fn test_dates_are_ascending_regardless_of_insert_order() {
        let mut bundle = HeartbeatsBundle::new();
        bundle.insert("a", day(2021, 11, 3), 0);
        bundle.insert("a", day(2021, 11, 1), 0);
        bundle.insert("a", day(2021, 11, 2), 0);
        assert_eq!(
            bundle.dates_for("a"),
            vec![day(2021, 11, 1), day(2021, 11, 2), day(2021, 11, 3)]
        );
    }

    #[test]
    fn test_agents_keep_first_seen_order() {
        let mut bundle = HeartbeatsBundle::new();
        bundle.insert("zeta", day(2021, 11, 1), 0);
        bundle.insert("alpha", day(2021, 11, 1), 0);
        bundle.insert("zeta", day(2021, 11, 2), 0);

        let payload = bundle.into_payload();
        let agents: Vec<&str> = payload.heartbeats().iter().map(|h| h.agent.as_str()).collect();
        assert_eq!(agents, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_insert_evicts_oldest_beyond_cap() {
        let mut bundle = HeartbeatsBundle::new();
        for d in 1..=5 {
            bundle.insert("a", day(2021, 11, d), 3);
        }
        assert_eq!(
            bundle.dates_for("a"),
            vec![day(2021, 11, 3), day(2021, 11, 4), day(2021, 11, 5)]
        );
    }

    #[test]
    fn test_insert_refuses_day_older_than_full_cap() {
        let mut bundle = HeartbeatsBundle::new();
        assert!(bundle.insert("a", day(2021, 11, 5), 1));
        let before = bundle.clone();

        assert!(!bundle.insert("a", day(2021, 11, 1), 1));
        assert_eq!(bundle, before);
        assert_eq!(bundle.dates_for("a"), vec![day(2021, 11, 5)]);
    }

    #[test]
    fn test_insert_keeps_older_day_while_under_cap() {
        let mut bundle = HeartbeatsBundle::new();
        bundle.insert("a", day(2021, 11, 5), 2);
        assert!(bundle.insert("a", day(2021, 11, 1), 2));
        assert_eq!(
            bundle.dates_for("a"),
            vec![day(2021, 11, 1), day(2021, 11, 5)]
        );
    }

    #[test]
    fn test_take_day_only_removes_that_day() {
        let mut bundle = HeartbeatsBundle::new();
        bundle.insert("a", day(2021, 11, 1), 0);
        bundle.insert("a", day(2021, 11, 2), 0);
        bundle.insert("b", day(2021, 11, 2), 0);
        bundle.insert("c", day(2021, 11, 1), 0);

        let taken = bundle.take_day(day(2021, 11, 2));
        assert_eq!(taken.dates_for("a"), vec![day(2021, 11, 2)]);
        assert_eq!(taken.dates_for("b"), vec![day(2021, 11, 2)]);
        assert!(taken.dates_for("c").is_empty());

        assert_eq!(bundle.dates_for("a"), vec![day(2021, 11, 1)]);
        assert!(bundle.dates_for("b").is_empty());
        assert_eq!(bundle.agent_count(), 2);
    }

    #[test]
    fn test_take_day_without_match_leaves_bundle_unchanged() {
        let mut bundle = HeartbeatsBundle::new();
        bundle.insert("a", day(2021, 11, 1), 0);
        let before = bundle.clone();

        let taken = bundle.take_day(day(2021, 11, 9));
        assert!(taken.is_empty());
        assert_eq!(bundle, before);
    }

    #[test]
    fn test_stored_json_shape() {
        let mut bundle = HeartbeatsBundle::new();
        bundle.insert("a", day(2021, 11, 1), 0);
        let json = serde_json::to_string(&bundle).unwrap();
        assert_eq!(
            json,
            r#"{"version":1,"entries":[{"agent":"a","dates":["2021-11-01"]}]}"#
        );
        let back: HeartbeatsBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bundle);
    }
}
