//! Reconciliation of the desired job list against live workers.
//!
//! [`Reconciler::reconcile`] runs synchronously for one snapshot of the list
//! and never waits on IO. It owns the worker registry, keyed by URL, and is
//! the only writer of job state: worker tasks report through
//! [`Reconciler::apply`], which drops anything from a worker that is no
//! longer the registered one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::download::{DownloadError, FileSystem, HttpTransport, Worker, WorkerDeps, WorkerEvent};
use crate::job::{JobEntry, JobSpec, JobState};
use crate::store::{JobStore, read_state, write_state};

/// Validates a job URL: it must be absolute and use `http` or `https`.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] describing why the URL was rejected.
pub fn validate_url(raw: &str) -> Result<Url, DownloadError> {
    let url = Url::parse(raw).map_err(|e| DownloadError::invalid_url(raw, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(DownloadError::invalid_url(
            raw,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

/// Maps store entries to the desired jobs, preserving list order.
#[must_use]
pub fn desired_jobs(entries: &[JobEntry]) -> Vec<JobSpec> {
    entries.iter().map(JobEntry::spec).collect()
}

#[derive(Debug)]
struct Registered {
    worker: Worker,
    /// The worker has reported `Done` or an error.
    settled: bool,
}

/// Owner of the worker registry.
pub struct Reconciler {
    store: Arc<dyn JobStore>,
    deps: WorkerDeps,
    workers: HashMap<String, Registered>,
    /// Partial-file removals still running.
    cleanups: JoinSet<()>,
    next_generation: u64,
}

impl Reconciler {
    /// Creates a reconciler and the channel its workers report on.
    ///
    /// Every event received on the returned channel must be passed to
    /// [`apply`](Self::apply) on the same task that calls
    /// [`reconcile`](Self::reconcile).
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        transport: Arc<dyn HttpTransport>,
        fs: Arc<dyn FileSystem>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let reconciler = Self {
            store,
            deps: WorkerDeps {
                transport,
                fs,
                events,
            },
            workers: HashMap::new(),
            cleanups: JoinSet::new(),
            next_generation: 0,
        };
        (reconciler, rx)
    }

    /// Brings the registry in line with `desired`.
    ///
    /// Must be called from within a tokio runtime: starting a worker spawns
    /// its task.
    #[instrument(level = "debug", skip_all, fields(jobs = desired.len()))]
    pub fn reconcile(&mut self, desired: &[JobSpec]) {
        let mut seen: HashSet<&str> = HashSet::with_capacity(desired.len());

        for spec in desired {
            if !seen.insert(spec.url.as_str()) {
                debug!(url = %spec.url, "ignoring duplicate job entry");
                continue;
            }
            match self.workers.get(&spec.url) {
                None => self.start(spec),
                Some(entry) if entry.worker.spec().dest != spec.dest => self.move_dest(spec),
                Some(_) => {}
            }
        }

        let removed: Vec<String> = self
            .workers
            .keys()
            .filter(|url| !seen.contains(url.as_str()))
            .cloned()
            .collect();
        for url in removed {
            info!(url = %url, "job removed; stopping worker");
            self.kill(&url, false);
        }
    }

    /// Applies a worker's state transition if that worker is still current.
    pub fn apply(&mut self, event: WorkerEvent) {
        let Some(entry) = self.workers.get_mut(&event.url) else {
            debug!(url = %event.url, generation = event.generation, "dropping event for unregistered job");
            return;
        };
        if entry.worker.generation() != event.generation || entry.worker.is_stopping() {
            debug!(url = %event.url, generation = event.generation, "dropping event from stale worker");
            return;
        }
        if event.state.is_settled() {
            entry.settled = true;
        }
        self.update_state(&event.url, &event.state);
    }

    /// Stops every worker, leaving partial files in place.
    pub fn shutdown(&mut self) {
        let urls: Vec<String> = self.workers.keys().cloned().collect();
        if !urls.is_empty() {
            info!(workers = urls.len(), "stopping all workers");
        }
        for url in urls {
            self.kill(&url, false);
        }
    }

    /// Waits for every pending partial-file removal to finish.
    pub async fn finish_cleanups(&mut self) {
        while let Some(result) = self.cleanups.join_next().await {
            if let Err(e) = result {
                debug!(error = %e, "partial file removal task failed");
            }
        }
    }

    /// Returns true if a worker is registered for `url`.
    #[must_use]
    pub fn is_registered(&self, url: &str) -> bool {
        self.workers.contains_key(url)
    }

    /// Number of registered workers, including settled ones.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of registered workers that have not reported done or error.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.workers.values().filter(|entry| !entry.settled).count()
    }

    fn start(&mut self, spec: &JobSpec) {
        if self.persisted_state(&spec.url).is_done() {
            return;
        }
        let url = match validate_url(&spec.url) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %spec.url, error = %e, "skipping job with invalid URL");
                return;
            }
        };

        // Recorded before the request goes out so the job is never started twice.
        self.update_state(&spec.url, &JobState::Started);

        self.next_generation += 1;
        let worker = Worker::spawn(spec.clone(), url, self.next_generation, &self.deps);
        info!(
            url = %spec.url,
            dest = %spec.dest.display(),
            generation = self.next_generation,
            "worker started"
        );
        self.workers.insert(
            spec.url.clone(),
            Registered {
                worker,
                settled: false,
            },
        );
    }

    fn move_dest(&mut self, spec: &JobSpec) {
        if self.persisted_state(&spec.url).is_done() {
            return;
        }
        if let Some(entry) = self.workers.get(&spec.url) {
            info!(
                url = %spec.url,
                from = %entry.worker.spec().dest.display(),
                to = %spec.dest.display(),
                "destination changed; restarting download"
            );
        }
        self.kill(&spec.url, true);
        self.start(spec);
    }

    fn kill(&mut self, url: &str, remove_partial: bool) {
        // Reap removals that already finished.
        while self.cleanups.try_join_next().is_some() {}
        if let Some(entry) = self.workers.remove(url) {
            entry
                .worker
                .kill(remove_partial, Arc::clone(&self.deps.fs), &mut self.cleanups);
        }
    }

    fn persisted_state(&self, url: &str) -> JobState {
        read_state(self.store.as_ref(), url)
    }

    fn update_state(&self, url: &str, state: &JobState) {
        debug!(url = %url, state = %state, "updating job state");
        if let Err(e) = write_state(self.store.as_ref(), url, state) {
            warn!(url = %url, error = %e, "failed to write job state");
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("workers", &self.workers)
            .field("pending_cleanups", &self.cleanups.len())
            .field("next_generation", &self.next_generation)
            .finish_non_exhaustive()
    }
}
