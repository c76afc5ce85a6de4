//! In-memory job store backed by a `tokio::sync::watch` channel.

use tokio::sync::watch;

use super::{JobStore, StoreError};
use crate::job::JobEntry;

/// Job store that keeps the list in memory and broadcasts every write.
///
/// Subscribers see the latest list; intermediate lists written in quick
/// succession may be coalesced, which is fine for level-triggered
/// reconciliation.
#[derive(Debug)]
pub struct MemoryJobStore {
    sender: watch::Sender<Vec<JobEntry>>,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MemoryJobStore {
    /// Creates a store holding `entries`.
    #[must_use]
    pub fn new(entries: Vec<JobEntry>) -> Self {
        let (sender, _) = watch::channel(entries);
        Self { sender }
    }

    /// Returns the current state string for `url`, if the entry exists.
    #[must_use]
    pub fn state_of(&self, url: &str) -> Option<String> {
        self.sender
            .borrow()
            .iter()
            .find(|entry| entry.url == url)
            .and_then(|entry| entry.state.clone())
    }
}

impl JobStore for MemoryJobStore {
    fn read(&self) -> Vec<JobEntry> {
        self.sender.borrow().clone()
    }

    fn write(&self, entries: Vec<JobEntry>) -> Result<(), StoreError> {
        // send_replace succeeds with or without live receivers.
        self.sender.send_replace(entries);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Vec<JobEntry>> {
        self.sender.subscribe()
    }
}
