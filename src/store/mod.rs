//! Job store: the declarative download list and its change notifications.
//!
//! The store is the only place job state is persisted. The manager reads the
//! list, subscribes to changes, and writes back updated `state` fields.
//!
//! Implementations:
//! - [`MemoryJobStore`] - in-process list, used by embedding hosts and tests
//! - [`JsonFileStore`] - list persisted as a JSON file

mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::JsonFileStore;
pub use memory::MemoryJobStore;

use tokio::sync::watch;

use crate::job::{JobEntry, JobState};

/// Storage for the ordered job list.
///
/// All methods are synchronous: they are called from the manager's control
/// task and must not wait on IO.
pub trait JobStore: Send + Sync {
    /// Returns a snapshot of the list.
    fn read(&self) -> Vec<JobEntry>;

    /// Replaces the whole list and notifies subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store rejects the write.
    fn write(&self, entries: Vec<JobEntry>) -> Result<(), StoreError>;

    /// Subscribes to list changes, including writes made through this store.
    fn subscribe(&self) -> watch::Receiver<Vec<JobEntry>>;
}

/// Returns the persisted state of the first entry for `url`.
pub fn read_state(store: &dyn JobStore, url: &str) -> JobState {
    store
        .read()
        .iter()
        .find(|entry| entry.url == url)
        .map(JobEntry::job_state)
        .unwrap_or_default()
}

/// Rewrites the `state` field of every entry for `url`, leaving the rest of
/// the list untouched.
///
/// # Errors
///
/// Returns [`StoreError`] if the store rejects the write.
pub fn write_state(store: &dyn JobStore, url: &str, state: &JobState) -> Result<(), StoreError> {
    let entries = store
        .read()
        .into_iter()
        .map(|entry| {
            if entry.url == url {
                entry.with_state(state)
            } else {
                entry
            }
        })
        .collect();
    store.write(entries)
}
