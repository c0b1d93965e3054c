//! Module of MemStorage, the local store of a node.

pub mod memory;

pub use crate::storage::memory::MemStorage;

/// Key value storage interface
pub trait KvStorageInterface<K, V> {
    /// Get a cache entry by `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Put `entry` in the cache under `key`.
    fn put(&mut self, key: K, value: V);

    /// Get all entries, ordered by key.
    fn get_all(&self) -> Vec<(K, V)>;

    /// Remove an `entry` by `key`.
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Remove and return every entry whose key matches `predicate`.
    fn take_where(&mut self, predicate: &dyn Fn(&K) -> bool) -> Vec<(K, V)>;

    /// Delete all values.
    fn clear(&mut self);

    /// Get the current storage usage.
    fn count(&self) -> usize;
}
