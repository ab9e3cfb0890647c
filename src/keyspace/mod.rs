//! The persisted keyspace: a fixed number of independently locked stores.

mod snapshot;
mod store;
mod value;

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use crate::hook::HookSlot;

pub use snapshot::{PersistError, SNAPSHOT_VERSION};
pub use store::{DataStore, Entry, WrongType};
pub use value::{DataValue, SortedSet};

use snapshot::{SnapshotFile, SnapshotStore};

pub const DEFAULT_STORE_COUNT: usize = 16;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyspaceError {
    #[error("DB index {0} is out of range")]
    IndexOutOfRange(usize),
    #[error("DB index {0} was given twice")]
    SameStore(usize),
}

/// `N` numbered stores, each behind its own lock.
///
/// Single-store commands take one lock. Commands spanning stores take the
/// locks they need in ascending index order through
/// [`DataStoreSet::lock_pair`] and [`DataStoreSet::lock_all`], which rules
/// out lock-order deadlocks between them.
#[derive(Debug)]
pub struct DataStoreSet {
    stores: Vec<Mutex<DataStore>>,
    snapshot_path: Option<PathBuf>,
    hook: HookSlot,
    /// Write commands since the last successful save.
    dirty: AtomicU64,
    save_lock: Mutex<()>,
}

impl DataStoreSet {
    /// Builds `store_count` stores, rehydrated from `<base_path>.snapshot`
    /// when that file exists. An empty `base_path` disables persistence.
    pub fn open(base_path: impl AsRef<Path>, store_count: usize) -> Result<Self, PersistError> {
        let base_path = base_path.as_ref();
        let snapshot_path = (!base_path.as_os_str().is_empty()).then(|| {
            let mut name = base_path.as_os_str().to_os_string();
            name.push(".snapshot");
            PathBuf::from(name)
        });

        let mut stores: Vec<DataStore> = (0..store_count).map(|_| DataStore::new()).collect();

        if let Some(path) = &snapshot_path {
            match snapshot::read(path)? {
                Some(file) => {
                    let saved = file.into_stores();
                    if saved.len() > store_count {
                        return Err(PersistError::TooManyStores {
                            path: path.clone(),
                            found: saved.len(),
                            configured: store_count,
                        });
                    }

                    for (slot, saved_store) in stores.iter_mut().zip(saved) {
                        *slot = saved_store.restore();
                    }

                    let keys: usize = stores.iter().map(DataStore::len).sum();
                    tracing::info!(path = %path.display(), keys, "keyspace loaded from snapshot");
                }
                None => {
                    tracing::info!(path = %path.display(), "no snapshot found, starting empty");
                }
            }
        }

        Ok(Self {
            stores: stores.into_iter().map(Mutex::new).collect(),
            snapshot_path,
            hook: HookSlot::default(),
            dirty: AtomicU64::new(0),
            save_lock: Mutex::new(()),
        })
    }

    /// An empty, non-persistent set.
    pub fn in_memory(store_count: usize) -> Self {
        Self {
            stores: (0..store_count).map(|_| Mutex::new(DataStore::new())).collect(),
            snapshot_path: None,
            hook: HookSlot::default(),
            dirty: AtomicU64::new(0),
            save_lock: Mutex::new(()),
        }
    }

    /// Shares an existing hook slot instead of the set's own.
    pub fn with_hook(mut self, hook: HookSlot) -> Self {
        self.hook = hook;
        self
    }

    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// `None` when persistence is disabled.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    pub fn hook(&self) -> &HookSlot {
        &self.hook
    }

    pub async fn lock(&self, index: usize) -> Result<MutexGuard<'_, DataStore>, KeyspaceError> {
        let store = self
            .stores
            .get(index)
            .ok_or(KeyspaceError::IndexOutOfRange(index))?;
        Ok(store.lock().await)
    }

    /// Locks two distinct stores, lower index first. The guards come back
    /// in argument order.
    pub async fn lock_pair(
        &self,
        first: usize,
        second: usize,
    ) -> Result<(MutexGuard<'_, DataStore>, MutexGuard<'_, DataStore>), KeyspaceError> {
        if first == second {
            return Err(KeyspaceError::SameStore(first));
        }
        for index in [first, second] {
            if index >= self.stores.len() {
                return Err(KeyspaceError::IndexOutOfRange(index));
            }
        }

        if first < second {
            let a = self.stores[first].lock().await;
            let b = self.stores[second].lock().await;
            Ok((a, b))
        } else {
            let b = self.stores[second].lock().await;
            let a = self.stores[first].lock().await;
            Ok((a, b))
        }
    }

    /// Locks every store in ascending order.
    pub async fn lock_all(&self) -> Vec<MutexGuard<'_, DataStore>> {
        let mut guards = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            guards.push(store.lock().await);
        }
        guards
    }

    /// Removes expired entries from every store, one lock at a time.
    pub async fn sweep_expired(&self) -> usize {
        let mut removed = 0;
        for store in &self.stores {
            removed += store.lock().await.sweep_expired();
        }
        removed
    }

    pub fn mark_dirty(&self) {
        self.dirty.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed) > 0
    }

    /// Writes a snapshot of every store. Returns `Ok(false)` without
    /// touching the disk when persistence is disabled.
    ///
    /// Each store is locked only while it is copied; the file is written
    /// on the blocking pool afterwards.
    pub async fn save(&self) -> Result<bool, PersistError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(false);
        };

        let _saving = self.save_lock.lock().await;
        let pending = self.dirty.swap(0, Ordering::Relaxed);

        let mut stores = Vec::with_capacity(self.stores.len());
        for store in &self.stores {
            stores.push(SnapshotStore::capture(&*store.lock().await));
        }

        let snapshot = SnapshotFile::new(stores);
        let target = path.clone();
        let written = tokio::task::spawn_blocking(move || snapshot::write(&snapshot, &target)).await;

        match written {
            Ok(Ok(())) => {
                tracing::debug!(path = %path.display(), "keyspace saved");
                Ok(true)
            }
            Ok(Err(error)) => {
                self.dirty.fetch_add(pending, Ordering::Relaxed);
                Err(error)
            }
            Err(error) => {
                self.dirty.fetch_add(pending, Ordering::Relaxed);
                Err(error.into())
            }
        }
    }

    /// Saves only when a write command ran since the last save.
    pub async fn save_if_dirty(&self) -> Result<bool, PersistError> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.save().await
    }
}
