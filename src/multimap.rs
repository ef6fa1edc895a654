// Copyright 2026 The parbatch developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A minimal synchronized multimap, the output container of
//! [`group_by()`](crate::iterate::group_by).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// A map from keys to the list of values grouped under each key, safe to
/// populate from several threads at once.
///
/// Values under one key appear in insertion order. When batches insert
/// concurrently, the interleaving between batches is unspecified.
pub struct SyncMultimap<K, V> {
    map: Mutex<HashMap<K, Vec<V>>>,
}

impl<K: Eq + Hash, V> SyncMultimap<K, V> {
    /// Creates an empty multimap.
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Appends `value` to the group of `key`.
    pub fn put(&self, key: K, value: V) {
        self.map.lock().unwrap().entry(key).or_default().push(value);
    }

    /// Returns the number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.map.lock().unwrap().len()
    }

    /// Returns the total number of values across all keys.
    pub fn total_size(&self) -> usize {
        self.map.lock().unwrap().values().map(Vec::len).sum()
    }

    /// Returns whether no value was ever inserted.
    pub fn is_empty(&self) -> bool {
        self.map.lock().unwrap().is_empty()
    }

    /// Runs `f` on the values grouped under `key`, or returns [`None`] if
    /// the key is absent.
    pub fn with_values<R>(&self, key: &K, f: impl FnOnce(&[V]) -> R) -> Option<R> {
        self.map.lock().unwrap().get(key).map(|values| f(values))
    }

    /// Consumes the multimap and returns the underlying map.
    pub fn into_map(self) -> HashMap<K, Vec<V>> {
        self.map.into_inner().unwrap()
    }
}

impl<K: Eq + Hash, V> Default for SyncMultimap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
