//! Download Manager Library
//!
//! Keeps a set of HTTP/HTTPS downloads in line with a declarative job list.
//! Each job names a source URL and a destination directory; the manager
//! starts, restarts and stops download workers as the list changes and
//! writes each job's status back into the list.
//!
//! # Architecture
//!
//! - [`job`] - job entries and the typed job state
//! - [`store`] - the job list and its change notifications
//! - [`download`] - HTTP transport, filesystem, filename derivation and the
//!   per-job worker
//! - [`reconciler`] - diffing the desired list against live workers
//! - [`manager`] - the control task tying the above together
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use download_manager::{DownloadManager, HttpClient, JobEntry, LocalFileSystem, MemoryJobStore};
//!
//! # async fn example() {
//! let store = Arc::new(MemoryJobStore::new(vec![JobEntry::new(
//!     "https://example.com/paper.pdf",
//!     "./downloads",
//! )]));
//! let manager = DownloadManager::start(store, Arc::new(HttpClient::new()), Arc::new(LocalFileSystem));
//! manager.wait_until_idle().await;
//! manager.unload().await;
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod job;
pub mod manager;
pub mod reconciler;
pub mod store;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use download::{
    DownloadError, FileSystem, HttpClient, HttpClientOptions, HttpTransport, LocalFileSystem,
    WorkerEvent,
};
pub use job::{JobEntry, JobSpec, JobState};
pub use manager::DownloadManager;
pub use reconciler::{Reconciler, validate_url};
pub use store::{JobStore, JsonFileStore, MemoryJobStore, StoreError};
