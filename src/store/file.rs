//! JSON-file-backed job store.
//!
//! The list lives in memory (see [`MemoryJobStore`]) and every change is
//! written back to disk by a background task, so writes from the control
//! task never block on file IO. Edits made to the file by other programs
//! are merged into the list before each save and by
//! [`JsonFileStore::reload`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::{JobStore, MemoryJobStore, StoreError};
use crate::job::JobEntry;

/// Job store persisted as a JSON array of entries.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    memory: Arc<MemoryJobStore>,
    /// The list as last loaded from or saved to disk.
    on_disk: Arc<Mutex<Vec<JobEntry>>>,
    persister: JoinHandle<()>,
}

impl JsonFileStore {
    /// Loads `path` (a missing file is an empty list) and starts persisting
    /// subsequent writes to it.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read and
    /// [`StoreError::Parse`] if it is not a valid job list.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = load_entries(&path).await?;
        debug!(entries = entries.len(), "loaded job list");

        let memory = Arc::new(MemoryJobStore::new(entries.clone()));
        let on_disk = Arc::new(Mutex::new(entries));
        let persister = tokio::spawn(persist_changes(
            path.clone(),
            Arc::clone(&memory),
            Arc::clone(&on_disk),
        ));

        Ok(Self {
            path,
            memory,
            on_disk,
            persister,
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current list to disk and waits for it to land.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be written.
    pub async fn save(&self) -> Result<(), StoreError> {
        let mut on_disk = self.on_disk.lock().await;
        let entries = self.memory.read();
        save_entries(&self.path, &entries).await?;
        *on_disk = entries;
        Ok(())
    }

    /// Re-reads the file and, if another program changed it since it was
    /// last loaded or saved, merges that edit into the in-memory list.
    ///
    /// Returns true if the list was changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or parsed; the
    /// in-memory list is left untouched.
    pub async fn reload(&self) -> Result<bool, StoreError> {
        let mut on_disk = self.on_disk.lock().await;
        let external = load_entries(&self.path).await?;
        if external == *on_disk {
            return Ok(false);
        }
        debug!(entries = external.len(), "job list changed on disk");
        let merged = merge_external(&on_disk, external.clone(), &self.memory.read());
        *on_disk = external;
        self.memory.write(merged)?;
        Ok(true)
    }
}

impl Drop for JsonFileStore {
    fn drop(&mut self) {
        self.persister.abort();
    }
}

impl JobStore for JsonFileStore {
    fn read(&self) -> Vec<JobEntry> {
        self.memory.read()
    }

    fn write(&self, entries: Vec<JobEntry>) -> Result<(), StoreError> {
        self.memory.write(entries)
    }

    fn subscribe(&self) -> watch::Receiver<Vec<JobEntry>> {
        self.memory.subscribe()
    }
}

async fn persist_changes(
    path: PathBuf,
    memory: Arc<MemoryJobStore>,
    on_disk: Arc<Mutex<Vec<JobEntry>>>,
) {
    let mut changes = memory.subscribe();
    while changes.changed().await.is_ok() {
        // Snapshot under the lock so the last writer always saves the latest list.
        let mut on_disk = on_disk.lock().await;
        let mut entries = changes.borrow_and_update().clone();

        match load_entries(&path).await {
            Ok(external) if external != *on_disk => {
                debug!(entries = external.len(), "job list edited on disk; merging before save");
                entries = merge_external(&on_disk, external, &entries);
                if let Err(e) = memory.write(entries.clone()) {
                    warn!(error = %e, "failed to apply job list edit");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not re-read job list before saving"),
        }

        if entries == *on_disk {
            continue;
        }
        match save_entries(&path, &entries).await {
            Ok(()) => *on_disk = entries,
            Err(e) => warn!(error = %e, "failed to persist job list"),
        }
    }
}

/// Folds an edit made by another program into the live list.
///
/// `base` is the list the store last loaded or saved. The edited list decides
/// which entries exist and in what order. An entry whose state the edit left
/// as it was in `base` takes its state from `current`; every other entry
/// keeps the edited state.
fn merge_external(
    base: &[JobEntry],
    external: Vec<JobEntry>,
    current: &[JobEntry],
) -> Vec<JobEntry> {
    external
        .into_iter()
        .map(|mut entry| {
            let untouched = base
                .iter()
                .find(|b| b.url == entry.url)
                .is_some_and(|b| b.state == entry.state);
            if untouched && let Some(live) = current.iter().find(|c| c.url == entry.url) {
                entry.state.clone_from(&live.state);
            }
            entry
        })
        .collect()
}

async fn load_entries(path: &Path) -> Result<Vec<JobEntry>, StoreError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&raw).map_err(|e| StoreError::parse(path, e))
}

/// Writes via a sibling temp file and rename so readers never see a torn list.
async fn save_entries(path: &Path, entries: &[JobEntry]) -> Result<(), StoreError> {
    let mut body =
        serde_json::to_vec_pretty(entries).map_err(|e| StoreError::parse(path, e))?;
    body.push(b'\n');

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, &body)
        .await
        .map_err(|e| StoreError::io(&tmp_path, e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}
