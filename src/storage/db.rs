//! The Keyspace
//!
//! A [`Db`] maps keys to [`Object`]s and keeps a second map of absolute
//! expiration times. Every key in `expires` is also in `dict`; the two
//! entries are always removed together.
//!
//! ## Expiry
//!
//! Expired keys are discovered two ways:
//!
//! - **Lazily**: every accessor first checks the key's deadline and evicts
//!   it if the deadline is strictly in the past, so callers never observe a
//!   dead key.
//! - **Actively**: [`Db::active_expire_cycle`] samples random keys from the
//!   expiration map and evicts the dead ones, so keys nobody touches again
//!   still get reclaimed.
//!
//! Both paths go through the same eviction routine, and the
//! `expired_keys` counter only moves when an entry is actually removed.

use crate::clock::now_ms;
use crate::storage::object::{Object, ObjectKind};
use bytes::Bytes;
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// A single keyspace. Not thread-safe; owned by the server.
#[derive(Debug, Default)]
pub struct Db {
    id: usize,
    dict: HashMap<Bytes, Object>,
    expires: HashMap<Bytes, i64>,
    expired_keys: u64,
}

impl Db {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of stored keys, including expired keys not yet evicted.
    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    /// Number of keys carrying a deadline.
    pub fn expires_len(&self) -> usize {
        self.expires.len()
    }

    /// Total keys evicted because their deadline passed.
    pub fn expired_keys(&self) -> u64 {
        self.expired_keys
    }

    /// Looks up a live key.
    pub fn get(&mut self, key: &[u8]) -> Option<&Object> {
        self.expire_if_needed(key);
        self.dict.get(key)
    }

    /// Looks up a live key for mutation.
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Object> {
        self.expire_if_needed(key);
        self.dict.get_mut(key)
    }

    /// Returns the object under `key`, creating an empty container of `kind`
    /// if the key is absent.
    ///
    /// An existing object is returned as-is even if its kind differs; the
    /// caller does the type check.
    pub fn get_or_create(&mut self, key: &Bytes, kind: ObjectKind) -> &mut Object {
        self.expire_if_needed(key);
        self.dict
            .entry(key.clone())
            .or_insert_with(|| Object::empty(kind))
    }

    pub fn contains(&mut self, key: &[u8]) -> bool {
        self.expire_if_needed(key);
        self.dict.contains_key(key)
    }

    /// Stores `object` under `key`, replacing any previous value and
    /// clearing its deadline.
    pub fn set(&mut self, key: Bytes, object: Object) {
        self.expires.remove(&key);
        self.dict.insert(key, object);
    }

    /// Deletes a live key. Returns false if it was absent or already dead.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        if self.expire_if_needed(key) {
            return false;
        }
        self.expires.remove(key);
        self.dict.remove(key).is_some()
    }

    /// Drops `key` if it holds a container with no elements left.
    pub fn remove_if_empty(&mut self, key: &[u8]) -> bool {
        let empty = self
            .dict
            .get(key)
            .map(Object::is_empty_container)
            .unwrap_or(false);

        if empty {
            self.expires.remove(key);
            self.dict.remove(key);
        }
        empty
    }

    /// Sets an absolute deadline (ms since epoch) on a live key.
    ///
    /// Returns false if the key does not exist.
    pub fn set_expire(&mut self, key: &Bytes, when_ms: i64) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.expires.insert(key.clone(), when_ms);
        true
    }

    /// Deadline of a live key, `None` if it has none or does not exist.
    pub fn expire_at(&mut self, key: &[u8]) -> Option<i64> {
        self.expire_if_needed(key);
        self.expires.get(key).copied()
    }

    /// Evicts `key` if its deadline has passed. Returns true if evicted.
    pub fn expire_if_needed(&mut self, key: &[u8]) -> bool {
        self.expire_if_needed_at(key, now_ms())
    }

    fn expire_if_needed_at(&mut self, key: &[u8], now: i64) -> bool {
        match self.expires.get(key) {
            Some(&when) if when < now => {
                self.expires.remove(key);
                self.dict.remove(key);
                self.expired_keys += 1;
                true
            }
            _ => false,
        }
    }

    /// Samples `samples` keys (with replacement) from the expiration map
    /// and evicts the ones whose deadline is before `now`.
    ///
    /// Returns the number of keys evicted.
    pub fn active_expire_cycle(&mut self, samples: usize, now: i64) -> usize {
        if self.expires.is_empty() {
            return 0;
        }

        let keys: Vec<Bytes> = self.expires.keys().cloned().collect();
        let mut rng = rand::thread_rng();
        let mut evicted = 0;

        for _ in 0..samples {
            let Some(key) = keys.choose(&mut rng) else {
                break;
            };
            if self.expire_if_needed_at(key, now) {
                evicted += 1;
            }
        }

        evicted
    }
}
