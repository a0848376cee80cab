//! Ordered, optionally keyed, read-only container
//!
//! Underlies table rows (keyed by row name) and table-set members (keyed by
//! grouping value). Items stay in insertion order; when keys are present a
//! hash index gives O(1) lookup by key.

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// A read-only sequence addressable by integer index or by an optional key.
///
/// Keys need not be unique; the index maps each key to its last occurrence,
/// while iteration always covers every item in order.
#[derive(Debug, Clone)]
pub struct KeyedSequence<K, V> {
    items: Vec<V>,
    keys: Option<Vec<K>>,
    index: FxHashMap<K, usize>,
}

impl<K: Hash + Eq + Clone, V> KeyedSequence<K, V> {
    /// Build an unkeyed sequence.
    pub fn new(items: Vec<V>) -> Self {
        Self {
            items,
            keys: None,
            index: FxHashMap::default(),
        }
    }

    /// Build a keyed sequence. `keys` must have the same length as `items`.
    pub fn with_keys(items: Vec<V>, keys: Vec<K>) -> Self {
        debug_assert_eq!(items.len(), keys.len());
        let mut index = FxHashMap::default();
        for (i, key) in keys.iter().enumerate() {
            index.insert(key.clone(), i);
        }
        Self {
            items,
            keys: Some(keys),
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get an item by position.
    pub fn get(&self, index: usize) -> Option<&V> {
        self.items.get(index)
    }

    /// Get an item by key, if this sequence is keyed.
    pub fn get_by_key(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    /// Whether keys were supplied at construction.
    pub fn has_keys(&self) -> bool {
        self.keys.is_some()
    }

    /// The keys, in item order.
    pub fn keys(&self) -> Option<&[K]> {
        self.keys.as_deref()
    }

    /// The key at a position.
    pub fn key_at(&self, index: usize) -> Option<&K> {
        self.keys.as_ref().and_then(|keys| keys.get(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.items.iter()
    }

    pub fn items(&self) -> &[V] {
        &self.items
    }

    /// Iterate (key, item) pairs; panics if the sequence is unkeyed.
    pub fn iter_keyed(&self) -> impl Iterator<Item = (&K, &V)> {
        self.keys
            .as_ref()
            .expect("iter_keyed on an unkeyed sequence")
            .iter()
            .zip(self.items.iter())
    }
}

impl<'a, K, V> IntoIterator for &'a KeyedSequence<K, V> {
    type Item = &'a V;
    type IntoIter = std::slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<K: Hash + Eq + Clone, V> std::ops::Index<usize> for KeyedSequence<K, V> {
    type Output = V;

    fn index(&self, index: usize) -> &V {
        &self.items[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unkeyed_access() {
        let seq: KeyedSequence<String, i32> = KeyedSequence::new(vec![10, 20, 30]);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.get(1), Some(&20));
        assert_eq!(seq.get(3), None);
        assert!(!seq.has_keys());
        assert_eq!(seq.get_by_key(&"a".to_string()), None);
    }

    #[test]
    fn test_keyed_access() {
        let seq = KeyedSequence::with_keys(
            vec![10, 20, 30],
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        );
        assert_eq!(seq.get_by_key(&"b".to_string()), Some(&20));
        assert_eq!(seq.key_at(2), Some(&"c".to_string()));
        let pairs: Vec<_> = seq.iter_keyed().collect();
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let seq = KeyedSequence::with_keys(vec![1, 2], vec!["k".to_string(), "k".to_string()]);
        assert_eq!(seq.get_by_key(&"k".to_string()), Some(&2));
        assert_eq!(seq.len(), 2);
    }
}
