//! Storage backends for heartbeat bundles.
//!
//! The log only needs one primitive from its storage: apply a pure transform
//! to the current stored bundle and return the previous one, as a single
//! indivisible step. [`HeartbeatStorage::get_and_set`] is that primitive.
//!
//! - **memory**: process-local backend, used in tests and embedders that
//!   flush every run
//! - **file**: one JSON file per app, written through a same-directory temp
//!   file and an atomic rename, under a per-path lock and a sidecar file lock

mod file;
mod memory;

pub(crate) use file::file_name_for_app;
pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::Result;
use crate::heartbeat::HeartbeatsBundle;

/// Transform applied inside [`HeartbeatStorage::get_and_set`].
///
/// Receives the current bundle (`None` when nothing is stored) and returns
/// the bundle to store (`None` to clear).
pub type BundleTransform<'a> =
    &'a mut dyn FnMut(Option<HeartbeatsBundle>) -> Option<HeartbeatsBundle>;

/// Atomic get-and-set over an optional [`HeartbeatsBundle`].
pub trait HeartbeatStorage: Send + Sync {
    /// Current stored bundle, without modifying it.
    fn read(&self) -> Result<Option<HeartbeatsBundle>>;

    /// Apply `transform` to the stored bundle and return the previous value.
    ///
    /// Concurrent callers are serialized. On error nothing is written and
    /// the stored value is unchanged.
    fn get_and_set(&self, transform: BundleTransform<'_>) -> Result<Option<HeartbeatsBundle>>;
}
