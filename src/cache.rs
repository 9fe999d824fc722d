//! Typed key-value cache shared between tasks.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

/// In-memory cache with explicit get/set/remove.
///
/// Values are cloned out so no lock is held by callers.
#[derive(Debug)]
pub struct TypedCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for TypedCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloned value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    /// Insert or replace, returning the previous value.
    pub fn set(&self, key: K, value: V) -> Option<V> {
        self.entries.write().insert(key, value)
    }

    /// Remove and return the value for `key`.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key)
    }

    /// True if `key` is cached.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_get_set_remove() {
        let cache: TypedCache<String, u32> = TypedCache::new();
        assert!(cache.is_empty());

        assert_eq!(cache.set("a".into(), 1), None);
        assert_eq!(cache.set("a".into(), 2), Some(1));
        assert_eq!(cache.get(&"a".into()), Some(2));
        assert!(cache.contains(&"a".into()));
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.remove(&"a".into()), Some(2));
        assert_eq!(cache.get(&"a".into()), None);
        assert_eq!(cache.remove(&"a".into()), None);
    }

    #[test]
    fn test_clear() {
        let cache: TypedCache<u8, u8> = TypedCache::new();
        cache.set(1, 1);
        cache.set(2, 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_across_threads() {
        let cache: Arc<TypedCache<usize, usize>> = Arc::new(TypedCache::new());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.set(t * 100 + i, i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 400);
    }
}
