//! On-disk snapshot of every store in a [`DataStoreSet`](super::DataStoreSet).
//!
//! Values are copied into serde mirror types and written with bincode.
//! Deadlines are stored as Unix milliseconds so a snapshot survives a
//! restart; entries already past their deadline are dropped on load.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::keyspace::{DataStore, DataValue, Entry, SortedSet};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("snapshot I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot {} could not be encoded or decoded: {source}", .path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("snapshot {} has unsupported format version {found}", .path.display())]
    Version { path: PathBuf, found: u32 },
    #[error("snapshot {} holds {found} databases but only {configured} are configured", .path.display())]
    TooManyStores {
        path: PathBuf,
        found: usize,
        configured: usize,
    },
    #[error("snapshot writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub(crate) struct SnapshotFile {
    version: u32,
    stores: Vec<SnapshotStore>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default)]
pub(crate) struct SnapshotStore {
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SnapshotEntry {
    key: Vec<u8>,
    value: SnapshotValue,
    /// Milliseconds since the Unix epoch; `None` means no expiry.
    expires_at_unix_ms: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
enum SnapshotValue {
    String(Vec<u8>),
    List(Vec<Vec<u8>>),
    Hash(Vec<(Vec<u8>, Vec<u8>)>),
    Set(Vec<Vec<u8>>),
    SortedSet(Vec<(Vec<u8>, f64)>),
}

impl SnapshotFile {
    pub(crate) fn new(stores: Vec<SnapshotStore>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            stores,
        }
    }
}

impl SnapshotStore {
    /// Copies the live entries of `store`.
    pub(crate) fn capture(store: &DataStore) -> Self {
        Self {
            entries: store
                .iter()
                .map(|(key, entry)| SnapshotEntry {
                    key: key.to_vec(),
                    value: SnapshotValue::from(&entry.value),
                    expires_at_unix_ms: entry.expires_at.and_then(instant_to_unix_ms),
                })
                .collect(),
        }
    }

    /// Rebuilds a store, skipping entries whose deadline has passed.
    pub(crate) fn restore(self) -> DataStore {
        let mut store = DataStore::new();
        for entry in self.entries {
            let expires_at = match entry.expires_at_unix_ms {
                Some(ms) => match unix_ms_to_instant(ms) {
                    Some(deadline) => Some(deadline),
                    None => continue,
                },
                None => None,
            };
            store.insert(
                Bytes::from(entry.key),
                Entry::with_expiry(entry.value.into(), expires_at),
            );
        }
        store
    }
}

impl From<&DataValue> for SnapshotValue {
    fn from(value: &DataValue) -> Self {
        match value {
            DataValue::String(data) => SnapshotValue::String(data.to_vec()),
            DataValue::List(list) => SnapshotValue::List(list.iter().map(|item| item.to_vec()).collect()),
            DataValue::Hash(hash) => SnapshotValue::Hash(
                hash.iter()
                    .map(|(field, value)| (field.to_vec(), value.to_vec()))
                    .collect(),
            ),
            DataValue::Set(set) => SnapshotValue::Set(set.iter().map(|member| member.to_vec()).collect()),
            DataValue::SortedSet(zset) => SnapshotValue::SortedSet(
                zset.iter()
                    .map(|(member, score)| (member.to_vec(), score))
                    .collect(),
            ),
        }
    }
}

impl From<SnapshotValue> for DataValue {
    fn from(value: SnapshotValue) -> Self {
        match value {
            SnapshotValue::String(data) => DataValue::String(Bytes::from(data)),
            SnapshotValue::List(list) => DataValue::List(list.into_iter().map(Bytes::from).collect()),
            SnapshotValue::Hash(hash) => DataValue::Hash(
                hash.into_iter()
                    .map(|(field, value)| (Bytes::from(field), Bytes::from(value)))
                    .collect(),
            ),
            SnapshotValue::Set(set) => DataValue::Set(set.into_iter().map(Bytes::from).collect()),
            SnapshotValue::SortedSet(members) => {
                let mut zset = SortedSet::default();
                for (member, score) in members {
                    zset.insert(Bytes::from(member), score);
                }
                DataValue::SortedSet(zset)
            }
        }
    }
}

fn instant_to_unix_ms(deadline: Instant) -> Option<u64> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    SystemTime::now()
        .checked_add(remaining)
        .and_then(|time| time.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|since_epoch| since_epoch.as_millis() as u64)
}

/// `None` when the deadline is already in the past.
fn unix_ms_to_instant(ms: u64) -> Option<Instant> {
    let target = SystemTime::UNIX_EPOCH.checked_add(Duration::from_millis(ms))?;
    let remaining = target.duration_since(SystemTime::now()).ok()?;
    if remaining.is_zero() {
        return None;
    }
    Instant::now().checked_add(remaining)
}

/// Writes `snapshot` to `path` via `<path>.tmp` and a rename, so a reader
/// never sees a half-written file.
pub(crate) fn write(snapshot: &SnapshotFile, path: &Path) -> Result<(), PersistError> {
    let io_error = |source: io::Error| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let tmp = temporary_path(path);
    let file = File::create(&tmp).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, snapshot).map_err(|source| PersistError::Encoding {
        path: tmp.clone(),
        source,
    })?;
    writer.flush().map_err(io_error)?;
    drop(writer);

    fs::rename(&tmp, path).map_err(io_error)
}

/// `Ok(None)` when no snapshot exists yet.
pub(crate) fn read(path: &Path) -> Result<Option<SnapshotFile>, PersistError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let snapshot: SnapshotFile = bincode::deserialize_from(BufReader::new(file)).map_err(|source| {
        PersistError::Encoding {
            path: path.to_path_buf(),
            source,
        }
    })?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistError::Version {
            path: path.to_path_buf(),
            found: snapshot.version,
        });
    }

    Ok(Some(snapshot))
}

impl SnapshotFile {
    pub(crate) fn into_stores(self) -> Vec<SnapshotStore> {
        self.stores
    }
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
