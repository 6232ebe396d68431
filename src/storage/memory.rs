//! In-memory heartbeat storage.

use std::sync::Mutex;

use super::{BundleTransform, HeartbeatStorage};
use crate::error::{HeartbeatError, Result};
use crate::heartbeat::HeartbeatsBundle;

/// Mutex-guarded bundle living only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bundle: Mutex<Option<HeartbeatsBundle>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing bundle.
    pub fn with_bundle(bundle: HeartbeatsBundle) -> Self {
        Self {
            bundle: Mutex::new(Some(bundle)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<HeartbeatsBundle>>> {
        self.bundle
            .lock()
            .map_err(|_| HeartbeatError::Storage("In-memory heartbeat store poisoned".to_string()))
    }
}

impl HeartbeatStorage for MemoryStorage {
    fn read(&self) -> Result<Option<HeartbeatsBundle>> {
        Ok(self.lock()?.clone())
    }

    fn get_and_set(&self, transform: BundleTransform<'_>) -> Result<Option<HeartbeatsBundle>> {
        let mut guard = self.lock()?;
        let previous = guard.clone();
        *guard = transform(previous.clone());
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heartbeat::HeartbeatDay;

    fn day(y: i32, m: u32, d: u32) -> HeartbeatDay {
        HeartbeatDay::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn test_starts_empty() {
        let storage = MemoryStorage::new();
        assert!(storage.read().unwrap().is_none());
    }

    #[test]
    fn test_get_and_set_returns_previous() {
        let storage = MemoryStorage::new();

        let previous = storage
            .get_and_set(&mut |current| {
                let mut bundle = current.unwrap_or_default();
                bundle.insert("a", day(2021, 11, 1), 0);
                Some(bundle)
            })
            .unwrap();
        assert!(previous.is_none());

        let previous = storage.get_and_set(&mut |_| None).unwrap().unwrap();
        assert_eq!(previous.dates_for("a"), vec![day(2021, 11, 1)]);
        assert!(storage.read().unwrap().is_none());
    }

    #[test]
    fn test_concurrent_transforms_do_not_lose_updates() {
        let storage = std::sync::Arc::new(MemoryStorage::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let storage = std::sync::Arc::clone(&storage);
                std::thread::spawn(move || {
                    let agent = format!("agent-{}", i);
                    storage
                        .get_and_set(&mut |current| {
                            let mut bundle = current.unwrap_or_default();
                            bundle.insert(&agent, day(2021, 11, 1), 0);
                            Some(bundle)
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let bundle = storage.read().unwrap().unwrap();
        assert_eq!(bundle.agent_count(), 8);
    }
}
