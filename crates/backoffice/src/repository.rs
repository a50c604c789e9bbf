//! Record persistence port and its in-memory implementation.

use std::collections::BTreeMap;

/// Keyed record storage for one kind of record.
pub trait Repository<K, V> {
    fn get(&self, key: &K) -> Option<&V>;
    fn get_mut(&mut self, key: &K) -> Option<&mut V>;
    fn upsert(&mut self, key: K, value: V);
    fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
    /// All records, in key order.
    fn list(&self) -> Vec<&V>;
    /// Records matching `filter`, in key order.
    fn find<'a>(&'a self, filter: &dyn Fn(&V) -> bool) -> Vec<&'a V> {
        self.list().into_iter().filter(|v| filter(v)).collect()
    }
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory store for tests/dev and single-process use.
///
/// Keys are v7 identifiers, so key order is creation order.
#[derive(Debug)]
pub struct InMemoryRepository<K, V> {
    inner: BTreeMap<K, V>,
}

impl<K, V> InMemoryRepository<K, V> {
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }
}

impl<K, V> Default for InMemoryRepository<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> Repository<K, V> for InMemoryRepository<K, V> {
    fn get(&self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    fn upsert(&mut self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    fn list(&self) -> Vec<&V> {
        self.inner.values().collect()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_filters_in_key_order() {
        let mut repo = InMemoryRepository::new();
        repo.upsert(3, "c");
        repo.upsert(1, "a");
        repo.upsert(2, "bb");
        assert_eq!(repo.list(), vec![&"a", &"bb", &"c"]);
        assert_eq!(repo.find(&|v: &&str| v.len() == 1), vec![&"a", &"c"]);
        assert!(repo.contains(&2));
        assert_eq!(repo.len(), 3);
    }
}
