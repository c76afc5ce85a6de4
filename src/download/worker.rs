//! Per-job download worker.
//!
//! A worker owns one spawned task that runs the fetch state machine:
//!
//! ```text
//! Started -> Progress(0..=100)* -> Done
//!         \-> Error(message)
//! ```
//!
//! The task never writes to the job store. It sends [`WorkerEvent`]s to the
//! manager's control task, which applies them only while this exact worker
//! (same URL, same generation) is still registered.
//!
//! Cancellation is cooperative and forced at once: [`Worker::kill`] sets the
//! `stopping` flag, which every continuation checks before reporting, and
//! aborts the task, which drops the in-flight request, response stream and
//! file sink at the next await point.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, HeaderMap};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, debug, error, info, info_span};
use url::Url;

use super::client::{HttpResponse, HttpTransport};
use super::error::DownloadError;
use super::filename::derive_filename;
use super::fs::FileSystem;
use super::progress::ProgressTracker;
use crate::job::{JobSpec, JobState};

/// A state transition reported by a worker task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEvent {
    /// URL of the job the worker belongs to.
    pub url: String,
    /// Generation of the reporting worker.
    pub generation: u64,
    /// New job state.
    pub state: JobState,
}

/// Collaborators shared by every worker.
#[derive(Clone)]
pub(crate) struct WorkerDeps {
    pub(crate) transport: Arc<dyn HttpTransport>,
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) events: mpsc::UnboundedSender<WorkerEvent>,
}

/// Registry record for one live download.
#[derive(Debug)]
pub(crate) struct Worker {
    spec: JobSpec,
    generation: u64,
    stopping: Arc<AtomicBool>,
    destination: Arc<OnceLock<PathBuf>>,
    task: JoinHandle<()>,
}

impl Worker {
    /// Spawns the fetch task for `spec`.
    ///
    /// The caller records `Started` before calling this.
    pub(crate) fn spawn(spec: JobSpec, url: Url, generation: u64, deps: &WorkerDeps) -> Self {
        let stopping = Arc::new(AtomicBool::new(false));
        let destination = Arc::new(OnceLock::new());
        let reporter = Reporter {
            url: spec.url.clone(),
            generation,
            stopping: Arc::clone(&stopping),
            events: deps.events.clone(),
        };
        let span = info_span!("worker", url = %spec.url, generation);
        let task = tokio::spawn(
            run(
                spec.clone(),
                url,
                Arc::clone(&deps.transport),
                Arc::clone(&deps.fs),
                Arc::clone(&destination),
                reporter,
            )
            .instrument(span),
        );

        Self {
            spec,
            generation,
            stopping,
            destination,
            task,
        }
    }

    pub(crate) fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Output path, once response headers have been processed.
    #[cfg(test)]
    pub(crate) fn destination(&self) -> Option<&Path> {
        self.destination.get().map(PathBuf::as_path)
    }

    /// Returns true once the task has finished.
    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the worker without waiting.
    ///
    /// With `remove_partial`, the output file (if one was opened) is deleted
    /// by a task spawned on `cleanups` once the aborted task has released it.
    /// Removal failures are ignored.
    pub(crate) fn kill(
        self,
        remove_partial: bool,
        fs: Arc<dyn FileSystem>,
        cleanups: &mut JoinSet<()>,
    ) {
        self.stopping.store(true, Ordering::SeqCst);
        self.task.abort();
        debug!(url = %self.spec.url, generation = self.generation, remove_partial, "worker killed");

        if !remove_partial {
            return;
        }
        let Self {
            task, destination, ..
        } = self;
        cleanups.spawn(async move {
            // Join so the sink is dropped before the unlink.
            let _ = task.await;
            if let Some(path) = destination.get()
                && let Err(e) = fs.remove(path).await
            {
                debug!(path = %path.display(), error = %e, "ignoring partial file removal failure");
            }
        });
    }
}

/// Sends events for one worker generation, unless it is stopping.
struct Reporter {
    url: String,
    generation: u64,
    stopping: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<WorkerEvent>,
}

impl Reporter {
    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn report(&self, state: JobState) {
        if self.is_stopping() {
            return;
        }
        // A closed channel means the manager is gone; nothing left to inform.
        let _ = self.events.send(WorkerEvent {
            url: self.url.clone(),
            generation: self.generation,
            state,
        });
    }
}

async fn run(
    spec: JobSpec,
    url: Url,
    transport: Arc<dyn HttpTransport>,
    fs: Arc<dyn FileSystem>,
    destination: Arc<OnceLock<PathBuf>>,
    reporter: Reporter,
) {
    let result = fetch(
        &spec,
        &url,
        transport.as_ref(),
        fs.as_ref(),
        &destination,
        &reporter,
    )
    .await;

    if let Err(e) = result {
        if reporter.is_stopping() {
            return;
        }
        error!(error = %e, "download failed");
        reporter.report(JobState::Error(e.to_string()));
    }
}

async fn fetch(
    spec: &JobSpec,
    url: &Url,
    transport: &dyn HttpTransport,
    fs: &dyn FileSystem,
    destination: &OnceLock<PathBuf>,
    reporter: &Reporter,
) -> Result<(), DownloadError> {
    let response = transport.get(url).await?;
    if reporter.is_stopping() {
        return Ok(());
    }

    if !response.is_success() {
        // Dropping the response aborts the body.
        return Err(DownloadError::http_status(response.status, response.reason));
    }
    let HttpResponse {
        headers, mut body, ..
    } = response;

    let mut progress = content_length(&headers).and_then(ProgressTracker::new);
    if progress.is_some() {
        reporter.report(JobState::Progress(0));
    }

    let path = destination.get_or_init(|| spec.dest.join(derive_filename(&headers, url)));
    info!(path = %path.display(), "download started");

    let mut sink = fs
        .create_sink(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        sink.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        if reporter.is_stopping() {
            continue;
        }
        if let Some(tracker) = progress.as_mut()
            && let Some(percent) = tracker.advance(chunk.len() as u64)
        {
            reporter.report(JobState::Progress(percent));
        }
    }

    sink.shutdown()
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    drop(sink);

    if reporter.is_stopping() {
        return Ok(());
    }
    info!(path = %path.display(), "download finished");
    reporter.report(JobState::Done);
    Ok(())
}

/// Reads `Content-Length`; when repeated, the first value wins.
fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}
