use std::collections::BTreeMap;

use crate::storage::KvStorageInterface;

/// In-memory store. Iteration follows key order, so a run replays identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStorage<K, V>
where K: Ord
{
    table: BTreeMap<K, V>,
}

impl<K, V> MemStorage<K, V>
where K: Ord
{
    pub fn new() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.table.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.table.keys()
    }
}

impl<K, V> KvStorageInterface<K, V> for MemStorage<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    fn get(&self, key: &K) -> Option<V> {
        self.table.get(key).cloned()
    }

    fn put(&mut self, key: K, value: V) {
        self.table.insert(key, value);
    }

    fn get_all(&self) -> Vec<(K, V)> {
        self.table
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.table.remove(key)
    }

    fn take_where(&mut self, predicate: &dyn Fn(&K) -> bool) -> Vec<(K, V)> {
        let keys: Vec<K> = self.table.keys().filter(|k| predicate(k)).cloned().collect();
        keys.into_iter()
            .filter_map(|k| self.table.remove(&k).map(|v| (k, v)))
            .collect()
    }

    fn clear(&mut self) {
        self.table.clear();
    }

    fn count(&self) -> usize {
        self.table.len()
    }
}
