//! Keyed workspace for in-flight item state.
//!
//! The workspace is the only state shared between walks.  Access is keyed
//! by [`ItemKey`]; a given key is only ever touched by the single walk
//! bound to it, so per-key atomicity from the backing [`DashMap`] is all
//! the coordination the engine needs — there is no global lock.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Stable identifier for one work item (here, one inbound message).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    /// Create a key from any string-like identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Concurrency-safe store of per-item state, keyed by [`ItemKey`].
///
/// Values never leak references across keys; readers and writers go
/// through closures so the underlying shard lock is released before any
/// await point in the caller.
pub struct Workspace<V> {
    items: DashMap<ItemKey, V>,
}

impl<V> Workspace<V> {
    /// Create an empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    /// Insert or replace the state for `key`.  Returns the previous value
    /// if one was present.
    pub fn insert(&self, key: ItemKey, value: V) -> Option<V> {
        self.items.insert(key, value)
    }

    /// Whether state exists for `key`.
    pub fn contains(&self, key: &ItemKey) -> bool {
        self.items.contains_key(key)
    }

    /// Read the state for `key` through a closure.  Returns `None` if the
    /// key is absent.
    pub fn with<R>(&self, key: &ItemKey, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.items.get(key).map(|entry| f(entry.value()))
    }

    /// Mutate the state for `key` through a closure.  Returns `None` if
    /// the key is absent.
    pub fn update<R>(&self, key: &ItemKey, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.items.get_mut(key).map(|mut entry| f(entry.value_mut()))
    }

    /// Remove and return the state for `key`.
    pub fn remove(&self, key: &ItemKey) -> Option<V> {
        self.items.remove(key).map(|(_, value)| value)
    }

    /// Snapshot of all keys currently held, in unspecified order.
    pub fn keys(&self) -> Vec<ItemKey> {
        self.items.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the workspace holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<V> Default for Workspace<V> {
    fn default() -> Self {
        Self::new()
    }
}
