use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::StructureId;
use crate::error::SelectorError;
use crate::rcsb::StructureSource;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRecord {
    pub structure_id: StructureId,
    pub status: DownloadStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadStats {
    pub seeded: usize,
    pub downloaded: usize,
    pub failed: usize,
}

type Slot = Arc<Mutex<DownloadStatus>>;

/// Run-scoped registry guaranteeing at most one download attempt per
/// structure id.
///
/// The outer map lock is held only to find or create a slot; the slot lock
/// is held across the fetch, so a second caller for the same id waits and
/// then sees the first caller's result.
pub struct DownloadCoordinator<S: StructureSource> {
    source: S,
    store: Store,
    registry: Mutex<HashMap<StructureId, Slot>>,
    seeded: usize,
    downloaded: AtomicUsize,
    failed: AtomicUsize,
}

impl<S: StructureSource> DownloadCoordinator<S> {
    /// Creates the destination if needed and marks every file already in
    /// it as done.
    pub fn new(source: S, store: Store) -> Result<Self, SelectorError> {
        store.ensure_root()?;
        let existing = store.existing_structures()?;
        let seeded = existing.len();
        let registry: HashMap<StructureId, Slot> = existing
            .into_iter()
            .map(|id| (id, Arc::new(Mutex::new(DownloadStatus::Done))))
            .collect();
        info!(destination = %store.root(), seeded, "download registry seeded");
        Ok(Self {
            source,
            store,
            registry: Mutex::new(registry),
            seeded,
            downloaded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns `true` when the file is on disk after the call. A failed
    /// attempt is remembered and not repeated within this run.
    pub fn ensure_downloaded(&self, id: &StructureId) -> bool {
        let slot = {
            let mut registry = lock(&self.registry);
            Arc::clone(
                registry
                    .entry(id.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(DownloadStatus::Pending))),
            )
        };

        let mut status = lock(&slot);
        match *status {
            DownloadStatus::Done => return true,
            DownloadStatus::Failed => return false,
            DownloadStatus::Pending => {}
        }

        // Stays `Failed` if the fetch or write unwinds.
        *status = DownloadStatus::Failed;
        let result = self
            .source
            .fetch_structure(id, self.store.format())
            .and_then(|bytes| self.store.write_structure(id, &bytes));
        match result {
            Ok(path) => {
                info!(structure = %id, path = %path, "downloaded");
                self.downloaded.fetch_add(1, Ordering::Relaxed);
                *status = DownloadStatus::Done;
                true
            }
            Err(err) => {
                warn!(structure = %id, error = %err, "download failed");
                self.failed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Status without side effects; `None` if the id was never referenced.
    /// Waits for an in-flight download of the same id.
    pub fn status(&self, id: &StructureId) -> Option<DownloadStatus> {
        let slot = lock(&self.registry).get(id).map(Arc::clone)?;
        let status = *lock(&slot);
        Some(status)
    }

    pub fn records(&self) -> Vec<DownloadRecord> {
        let slots: Vec<(StructureId, Slot)> = lock(&self.registry)
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();
        let mut records: Vec<DownloadRecord> = slots
            .into_iter()
            .map(|(structure_id, slot)| DownloadRecord {
                structure_id,
                status: *lock(&slot),
            })
            .collect();
        records.sort_by(|a, b| a.structure_id.cmp(&b.structure_id));
        records
    }

    pub fn stats(&self) -> DownloadStats {
        DownloadStats {
            seeded: self.seeded,
            downloaded: self.downloaded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

// A panic while holding a slot leaves it `Failed`; the status itself is
// always valid, so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
