use std::{collections::HashMap, time::Duration};

use bytes::Bytes;
use thiserror::Error;
use tokio::time::Instant;

use crate::keyspace::DataValue;

/// The key holds a value of a different type than the command expects.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation against a key holding the wrong kind of value")]
pub struct WrongType;

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: DataValue,
    pub expires_at: Option<Instant>,
}

impl Entry {
    pub fn new(value: DataValue) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    pub fn with_expiry(value: DataValue, expires_at: Option<Instant>) -> Self {
        Self { value, expires_at }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// One numbered database: keys to typed entries.
///
/// Every read goes through [`DataStore::expire_if_due`] first, so an
/// entry past its deadline is indistinguishable from a missing key even
/// before the periodic sweep removes it.
#[derive(Debug, Default)]
pub struct DataStore {
    entries: HashMap<Bytes, Entry>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn expire_if_due(&mut self, key: &[u8]) {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            self.entries.remove(key);
        }
    }

    pub fn get(&mut self, key: &[u8]) -> Option<&Entry> {
        self.expire_if_due(key);
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Entry> {
        self.expire_if_due(key);
        self.entries.get_mut(key)
    }

    pub fn contains_key(&mut self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Replaces whatever is stored under `key`, expiry included.
    pub fn insert(&mut self, key: Bytes, entry: Entry) -> Option<Entry> {
        self.expire_if_due(&key);
        self.entries.insert(key, entry)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Entry> {
        self.expire_if_due(key);
        self.entries.remove(key)
    }

    /// Reads the value under `key` through a type projection such as
    /// [`DataValue::as_list`].
    pub fn typed<'a, T: ?Sized>(
        &'a mut self,
        key: &[u8],
        project: impl FnOnce(&'a DataValue) -> Option<&'a T>,
    ) -> Result<Option<&'a T>, WrongType> {
        match self.get(key) {
            Some(entry) => project(&entry.value).map(Some).ok_or(WrongType),
            None => Ok(None),
        }
    }

    pub fn typed_mut<'a, T: ?Sized>(
        &'a mut self,
        key: &[u8],
        project: impl FnOnce(&'a mut DataValue) -> Option<&'a mut T>,
    ) -> Result<Option<&'a mut T>, WrongType> {
        match self.get_mut(key) {
            Some(entry) => project(&mut entry.value).map(Some).ok_or(WrongType),
            None => Ok(None),
        }
    }

    /// Like [`DataStore::typed_mut`] but creates the value with `create`
    /// when the key is missing.
    pub fn typed_or_insert<'a, T: ?Sized>(
        &'a mut self,
        key: Bytes,
        create: impl FnOnce() -> DataValue,
        project: impl FnOnce(&'a mut DataValue) -> Option<&'a mut T>,
    ) -> Result<&'a mut T, WrongType> {
        self.expire_if_due(&key);
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Entry::new(create()));
        project(&mut entry.value).ok_or(WrongType)
    }

    /// Drops `key` if it holds a collection that has become empty.
    pub fn remove_if_empty(&mut self, key: &[u8]) {
        if self
            .entries
            .get(key)
            .is_some_and(|entry| entry.value.is_empty_collection())
        {
            self.entries.remove(key);
        }
    }

    /// Sets the deadline of an existing key. Returns `false` if it is missing.
    pub fn set_expiry(&mut self, key: &[u8], expires_at: Option<Instant>) -> bool {
        match self.get_mut(key) {
            Some(entry) => {
                entry.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// `None` for a missing key, `Some(None)` for a key without a deadline.
    pub fn time_to_live(&mut self, key: &[u8]) -> Option<Option<Duration>> {
        let now = Instant::now();
        self.get(key)
            .map(|entry| entry.expires_at.map(|deadline| deadline.saturating_duration_since(now)))
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Live keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &Bytes> + '_ {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(move |(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key)
    }

    /// Live entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Entry)> + '_ {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(move |(_, entry)| !entry.is_expired(now))
    }

    /// Physically removes every entry whose deadline has passed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}
