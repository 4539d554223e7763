//! Live-backed views of a [`UnifiedMap`]: its key set, its entry set, and its
//! values collection.
//!
//! Each view is a short-lived facade borrowing the map mutably; reads forward
//! to the map's lookup paths and removals go through the same mutation engine
//! as the map's own operations, so the map is always left consistent. Views
//! cannot add entries.

use core::hash::{BuildHasher, Hash};

use crate::{Cursor, Equivalent, Iter, IterMut, Keys, UnifiedMap, Values};

/// A set view of the keys of a `UnifiedMap`.
///
/// Created by [`UnifiedMap::key_set`].
pub struct KeySet<'a, K, V, S> {
    pub(crate) map: &'a mut UnifiedMap<K, V, S>,
}

impl<K, V, S> KeySet<'_, K, V, S> {
    /// Returns the number of keys, which equals the map's length.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the backing map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// An iterator over the keys in arbitrary order.
    #[inline]
    pub fn iter(&self) -> Keys<'_, K, V> {
        self.map.keys()
    }

    /// Calls `f` for every key.
    #[inline]
    pub fn for_each<F: FnMut(&K)>(&self, f: F) {
        self.map.for_each_key(f);
    }

    /// Removes every entry from the backing map, keeping its capacity.
    #[inline]
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Copies the keys into a vector.
    pub fn to_vec(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.map.keys().cloned().collect()
    }
}

impl<K, V, S> KeySet<'_, K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Returns `true` if the map contains `key`.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.map.contains_key(key)
    }

    /// Returns `true` if the map contains every key in `keys`.
    pub fn contains_all<'b, Q, I>(&self, keys: I) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K> + 'b,
        I: IntoIterator<Item = &'b Q>,
    {
        keys.into_iter().all(|key| self.map.contains_key(key))
    }

    /// Removes `key` and its value from the backing map.
    ///
    /// Returns `true` if the key was present.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.map.remove_entry(key).is_some()
    }

    /// Removes every key in `keys`. Returns `true` if the map shrank.
    pub fn remove_all<'b, Q, I>(&mut self, keys: I) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K> + 'b,
        I: IntoIterator<Item = &'b Q>,
    {
        let before = self.map.len();
        for key in keys {
            self.map.remove_entry(key);
        }
        self.map.len() != before
    }

    /// Keeps only the entries whose key appears in `keys`, rebuilding the
    /// backing table around the survivors.
    ///
    /// Returns `true` if the map strictly shrank.
    pub fn retain_all<'b, Q, I>(&mut self, keys: I) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K> + 'b,
        I: IntoIterator<Item = &'b Q>,
    {
        let before = self.map.len();
        let mut kept = Vec::new();
        for key in keys {
            if let Some(entry) = self.map.remove_entry(key) {
                kept.push(entry);
            }
        }
        if kept.len() < before {
            self.map.adopt(kept);
            true
        } else {
            // Nothing would be dropped; reinstall into the existing table.
            for (k, v) in kept {
                self.map.put(k, v);
            }
            false
        }
    }
}

/// A set view of the entries of a `UnifiedMap`.
///
/// Created by [`UnifiedMap::entry_set`]. Membership is keyed on the whole
/// `(key, value)` pair; value mutation goes through
/// [`iter_mut`](EntrySet::iter_mut).
pub struct EntrySet<'a, K, V, S> {
    pub(crate) map: &'a mut UnifiedMap<K, V, S>,
}

impl<K, V, S> EntrySet<'_, K, V, S> {
    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the backing map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// An iterator over the entries in arbitrary order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V> {
        self.map.iter()
    }

    /// An iterator over the entries with mutable access to the values.
    ///
    /// This is the supported way to update a value reached through the entry
    /// view; the update lands directly in the backing map.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.map.iter_mut()
    }

    /// Removes every entry from the backing map, keeping its capacity.
    #[inline]
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Copies the entries into a vector of pairs.
    pub fn to_vec(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K, V, S> EntrySet<'_, K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    /// Returns `true` if the map holds exactly this `(key, value)` pair.
    #[inline]
    pub fn contains<Q>(&self, key: &Q, value: &V) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.map.get(key) == Some(value)
    }

    /// Removes the entry only if both the key and the value match.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove<Q>(&mut self, key: &Q, value: &V) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        if self.map.get(key) == Some(value) {
            self.map.remove_entry(key);
            true
        } else {
            false
        }
    }

    /// Removes every matching `(key, value)` pair. Returns `true` if the map
    /// shrank.
    pub fn remove_all<'b, Q, I>(&mut self, pairs: I) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K> + 'b,
        V: 'b,
        I: IntoIterator<Item = (&'b Q, &'b V)>,
    {
        let before = self.map.len();
        for (key, value) in pairs {
            self.remove(key, value);
        }
        self.map.len() != before
    }

    /// Keeps only the entries matching a `(key, value)` pair in `pairs`,
    /// rebuilding the backing table around the survivors.
    ///
    /// Returns `true` if the map strictly shrank.
    pub fn retain_all<'b, Q, I>(&mut self, pairs: I) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K> + 'b,
        V: 'b,
        I: IntoIterator<Item = (&'b Q, &'b V)>,
    {
        let before = self.map.len();
        let mut kept = Vec::new();
        for (key, value) in pairs {
            if self.map.get(key) == Some(value) {
                if let Some(entry) = self.map.remove_entry(key) {
                    kept.push(entry);
                }
            }
        }
        if kept.len() < before {
            self.map.adopt(kept);
            true
        } else {
            for (k, v) in kept {
                self.map.put(k, v);
            }
            false
        }
    }
}

/// A collection view of the values of a `UnifiedMap`.
///
/// Created by [`UnifiedMap::values_collection`]. Values are not unique, so
/// removal targets the first matching occurrence in table order.
pub struct ValuesCollection<'a, K, V, S> {
    pub(crate) map: &'a mut UnifiedMap<K, V, S>,
}

impl<K, V, S> ValuesCollection<'_, K, V, S> {
    /// Returns the number of values, which equals the map's length.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the backing map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// An iterator over the values in arbitrary order.
    #[inline]
    pub fn iter(&self) -> Values<'_, K, V> {
        self.map.values()
    }

    /// Removes every entry from the backing map, keeping its capacity.
    #[inline]
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Copies the values into a vector.
    pub fn to_vec(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.map.values().cloned().collect()
    }
}

impl<K, V, S> ValuesCollection<'_, K, V, S>
where
    V: PartialEq,
{
    /// Returns `true` if any entry holds `value`. Linear in the map size.
    #[inline]
    pub fn contains(&self, value: &V) -> bool {
        self.map.contains_value(value)
    }

    /// Returns `true` if every value in `values` occurs in the map.
    ///
    /// Quadratic: each candidate triggers a linear scan. Copy the values into
    /// a set first when `values` is large.
    pub fn contains_all(&self, values: &[V]) -> bool {
        values.iter().all(|value| self.map.contains_value(value))
    }

    /// Removes the first entry whose value equals `value`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&mut self, value: &V) -> bool {
        let mut cursor = Cursor::new(self.map);
        while let Some((_, v)) = cursor.advance() {
            if v == value {
                cursor.remove_current();
                return true;
            }
        }
        false
    }

    /// Removes one occurrence of each value in `values`. Returns `true` if the
    /// map shrank.
    pub fn remove_all(&mut self, values: &[V]) -> bool {
        let mut changed = false;
        for value in values {
            if self.remove(value) {
                changed = true;
            }
        }
        changed
    }

    /// Keeps only the entries whose value appears in `values`.
    ///
    /// Returns `true` if the map shrank. Quadratic, like
    /// [`contains_all`](ValuesCollection::contains_all).
    pub fn retain_all(&mut self, values: &[V]) -> bool {
        let mut changed = false;
        let mut cursor = Cursor::new(self.map);
        while let Some((_, v)) = cursor.advance() {
            if !values.contains(v) {
                cursor.remove_current();
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use crate::UnifiedMap;

    fn five() -> UnifiedMap<i32, &'static str> {
        let mut map = UnifiedMap::new();
        for (k, v) in [(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")] {
            map.put(k, v);
        }
        map
    }

    #[test]
    fn key_set_reads_forward_to_map() {
        let mut map = five();
        let keys = map.key_set();
        assert_eq!(keys.len(), 5);
        assert!(keys.contains(&3));
        assert!(!keys.contains(&9));
        assert!(keys.contains_all([&1, &2, &5]));
        assert!(!keys.contains_all([&1, &9]));
        let mut collected = keys.to_vec();
        collected.sort_unstable();
        assert_eq!(collected, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn key_set_remove_and_clear() {
        let mut map = five();
        let mut keys = map.key_set();
        assert!(keys.remove(&2));
        assert!(!keys.remove(&2));
        assert!(keys.remove_all([&1, &9]));
        assert!(!keys.remove_all([&7, &8]));
        assert_eq!(keys.len(), 3);
        keys.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn key_set_retain_all_keeps_exactly_the_named_keys() {
        let mut map = five();
        assert!(map.key_set().retain_all([&1, &3, &5]));
        assert_eq!(map.len(), 3);
        for k in [1, 3, 5] {
            assert!(map.contains_key(&k));
        }
        for k in [2, 4] {
            assert!(!map.contains_key(&k));
        }
        // Retaining everything present reports no shrink.
        assert!(!map.key_set().retain_all([&1, &3, &5]));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn entry_set_is_keyed_on_pairs() {
        let mut map = five();
        let mut entries = map.entry_set();
        assert!(entries.contains(&1, &"a"));
        assert!(!entries.contains(&1, &"z"));
        assert!(!entries.remove(&1, &"z"));
        assert!(entries.remove(&1, &"a"));
        assert_eq!(entries.len(), 4);
    }

    #[test]
    fn entry_set_iter_mut_updates_the_map() {
        let mut map = five();
        for (k, v) in map.entry_set().iter_mut() {
            if *k == 2 {
                *v = "B";
            }
        }
        assert_eq!(map.get(&2), Some(&"B"));
    }

    #[test]
    fn entry_set_retain_all_requires_value_match() {
        let mut map = five();
        let retained = [(&1, &"a"), (&2, &"x"), (&3, &"c")];
        assert!(map.entry_set().retain_all(retained));
        assert_eq!(map.len(), 2);
        assert!(map.contains_key(&1));
        assert!(map.contains_key(&3));
        assert!(!map.contains_key(&2));
    }

    #[test]
    fn values_collection_removes_first_occurrence_only() {
        let mut map = UnifiedMap::new();
        map.put(1, "dup");
        map.put(2, "dup");
        map.put(3, "solo");
        let mut values = map.values_collection();
        assert!(values.contains(&"dup"));
        assert!(values.remove(&"dup"));
        assert_eq!(values.len(), 2);
        assert!(values.contains(&"dup"));
        assert!(!values.remove(&"missing"));
    }

    #[test]
    fn values_collection_retain_all() {
        let mut map = five();
        assert!(map.values_collection().retain_all(&["a", "c", "e"]));
        assert_eq!(map.len(), 3);
        assert!(map.contains_value(&"a"));
        assert!(!map.contains_value(&"b"));
        assert!(map.values_collection().contains_all(&["a", "c", "e"]));
        assert!(!map.values_collection().contains_all(&["a", "b"]));
    }
}
