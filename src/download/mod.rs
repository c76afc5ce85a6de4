//! HTTP downloads streamed to disk.
//!
//! This module holds everything a single download needs:
//!
//! - [`HttpTransport`] and its reqwest-backed [`HttpClient`]
//! - [`FileSystem`] and the tokio-backed [`LocalFileSystem`]
//! - filename derivation from `Content-Disposition` and the URL path
//! - throttled percentage tracking
//! - the per-job worker task that reports [`WorkerEvent`]s
//!
//! Redirects are not followed and no timeouts apply unless configured.

mod client;
mod constants;
mod error;
mod filename;
mod fs;
mod progress;
mod worker;

pub use client::{BodyStream, HttpClient, HttpClientOptions, HttpResponse, HttpTransport};
pub use constants::{FALLBACK_FILENAME, MAX_TIMEOUT_SECS, default_user_agent};
pub use error::DownloadError;
pub use filename::derive_filename;
pub use fs::{FileSink, FileSystem, LocalFileSystem};
pub use progress::ProgressTracker;
pub use worker::WorkerEvent;
pub(crate) use worker::{Worker, WorkerDeps};
