//! Download manager runtime.
//!
//! [`DownloadManager::start`] spawns the single control task. That task owns
//! the [`Reconciler`], subscribes to the job store and applies worker events,
//! so the registry and every state write stay on one task.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::download::{FileSystem, HttpTransport};
use crate::reconciler::{Reconciler, desired_jobs};
use crate::store::JobStore;

/// Handle to a running control task.
///
/// Dropping the handle stops the control task as [`unload`](Self::unload)
/// does, without waiting for it.
#[derive(Debug)]
pub struct DownloadManager {
    shutdown: Option<oneshot::Sender<()>>,
    /// Workers still downloading; `None` until the first pass has run.
    in_flight: watch::Receiver<Option<usize>>,
    task: JoinHandle<()>,
}

impl DownloadManager {
    /// Starts reconciling `store` against live workers.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(
        store: Arc<dyn JobStore>,
        transport: Arc<dyn HttpTransport>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (status_tx, in_flight) = watch::channel(None);
        let task = tokio::spawn(control_loop(store, transport, fs, shutdown_rx, status_tx));
        Self {
            shutdown: Some(shutdown_tx),
            in_flight,
            task,
        }
    }

    /// Number of workers that have not yet reported done or an error.
    #[must_use]
    pub fn in_flight(&self) -> Option<usize> {
        *self.in_flight.borrow()
    }

    /// Waits until no worker is downloading.
    ///
    /// Returns immediately once the control task has stopped.
    pub async fn wait_until_idle(&self) {
        let mut status = self.in_flight.clone();
        // Err means the control task is gone, which is idle too.
        let _ = status.wait_for(|count| *count == Some(0)).await;
    }

    /// Stops every worker, leaving partial files in place, and waits for
    /// the control task to exit.
    ///
    /// Partial files already scheduled for removal by a destination change
    /// are gone when this returns.
    pub async fn unload(self) {
        let Self { shutdown, task, .. } = self;
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        if let Err(e) = task.await {
            debug!(error = %e, "control task ended abnormally");
        }
    }
}

async fn control_loop(
    store: Arc<dyn JobStore>,
    transport: Arc<dyn HttpTransport>,
    fs: Arc<dyn FileSystem>,
    mut shutdown: oneshot::Receiver<()>,
    status: watch::Sender<Option<usize>>,
) {
    let mut changes = store.subscribe();
    let (mut reconciler, mut events) = Reconciler::new(store, transport, fs);
    info!("download manager started");

    // The snapshot is cloned out so the watch lock is released before the
    // pass writes state back to the store.
    let desired = desired_jobs(&changes.borrow_and_update());
    reconciler.reconcile(&desired);
    status.send_replace(Some(reconciler.in_flight()));

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    debug!("job store closed");
                    break;
                }
                let desired = desired_jobs(&changes.borrow_and_update());
                reconciler.reconcile(&desired);
            }
            Some(event) = events.recv() => reconciler.apply(event),
        }
        status.send_replace(Some(reconciler.in_flight()));
    }

    reconciler.shutdown();
    reconciler.finish_cleanups().await;
    status.send_replace(Some(0));
    info!("download manager stopped");
}
