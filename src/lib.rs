//! A unified open-addressed hash map.
//!
//! [`UnifiedMap`] stores its entries in a single flat slot table, which is
//! nicer to CPU caches than node-based maps: consecutive memory addresses are
//! cheap to access and there is no per-entry allocation on the common path.
//! Colliding keys do not probe into neighboring slots; instead the slot is
//! promoted in place to a small overflow chain holding every pair that hashes
//! there, so lookups touch at most one slot and one short linear buffer.
//!
//! # Examples
//!
//! ```
//! use unified_map::UnifiedMap;
//!
//! let mut map: UnifiedMap<&str, i32> = UnifiedMap::new();
//! map.put("a", 1);
//! map.put("b", 2);
//!
//! assert_eq!(map.get(&"a"), Some(&1));
//! assert!(map.contains_key(&"b"));
//! assert_eq!(map.len(), 2);
//! ```

use core::{
    fmt::{self, Debug},
    hash::{BuildHasher, Hash},
    mem,
    ops::Index,
};
use std::collections::hash_map::RandomState;

use table::Slot;

mod iter;
mod table;
mod view;

pub use hashbrown::Equivalent;
pub use iter::{
    Cursor, IntoIter, IntoKeys, IntoValues, Iter, IterMut, Keys, Values, ValuesMut,
};
pub use view::{EntrySet, KeySet, ValuesCollection};

#[cfg(feature = "serde")]
mod serde;

#[cfg(feature = "rapidhash")]
pub type RapidUnifiedMap<K, V> = UnifiedMap<K, V, rapidhash::fast::RandomState>;
#[cfg(feature = "fxhash")]
pub type FxUnifiedMap<K, V> = UnifiedMap<K, V, rustc_hash::FxBuildHasher>;
#[cfg(feature = "ahash")]
pub type AUnifiedMap<K, V> =
    UnifiedMap<K, V, core::hash::BuildHasherDefault<ahash::AHasher>>;

/// Capacity hint used by [`UnifiedMap::new`].
pub const DEFAULT_INITIAL_CAPACITY: usize = 8;

/// Occupancy ratio that triggers growth when no other ratio is given.
pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Folds the high bits of a hash into its low bits.
///
/// Hash codes that differ only by constant multiples at each bit position end
/// up with a bounded number of collisions (about 8 at the default load
/// factor), even for weak user hashes.
#[inline]
fn spread(h: u64) -> u64 {
    let h = h ^ (h >> 20) ^ (h >> 12);
    h ^ (h >> 7) ^ (h >> 4)
}

#[inline]
fn fast_ceil(v: f32) -> usize {
    let truncated = v as usize;
    if v - truncated as f32 > 0.0 {
        truncated + 1
    } else {
        truncated
    }
}

/// Table size for a given element-count hint: the next power of two that
/// keeps `hint` entries under the load factor.
#[inline]
fn init_capacity(hint: usize, load_factor: f32) -> usize {
    fast_ceil(hint as f32 / load_factor).next_power_of_two()
}

/// Location of a live entry inside the slot table.
#[derive(Clone, Copy)]
enum EntryPos {
    Direct(usize),
    Chain(usize, usize),
}

/// A hash map that keeps keys and values in one flat slot table.
///
/// Collisions share their slot through an inline-promoted overflow chain
/// rather than probe sequences or linked entry nodes, so the table never
/// contains tombstones and deletion is O(chain length).
///
/// # Type Parameters
///
/// - `K`: Key type. Must implement `Eq + Hash` for most operations.
/// - `V`: Value type.
/// - `S`: Hasher. Default: [`RandomState`], which resists HashDoS but is not
///   the fastest option; the `rapidhash`, `fxhash`, and `ahash` features
///   provide aliases wired to quicker hashers for non-adversarial workloads.
///
/// # Examples
///
/// ```
/// use unified_map::UnifiedMap;
///
/// let mut map: UnifiedMap<i32, &str> = UnifiedMap::with_capacity(16);
/// map.put(1, "one");
/// assert_eq!(map.remove(&1), Some("one"));
/// assert!(map.is_empty());
/// ```
#[derive(Clone)]
pub struct UnifiedMap<K, V, S = RandomState> {
    pub(crate) table: Vec<Slot<K, V>>,
    /// Number of live entries.
    pub(crate) occupied: usize,
    /// Growth threshold; always strictly below the table length so the table
    /// keeps at least one empty slot.
    pub(crate) max_size: usize,
    pub(crate) load_factor: f32,
    pub(crate) hasher: S,
}

impl<K, V> UnifiedMap<K, V, RandomState> {
    /// Creates an empty `UnifiedMap` with the default capacity and load
    /// factor.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let map: UnifiedMap<i32, i32> = UnifiedMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity_and_load_factor_and_hasher(
            DEFAULT_INITIAL_CAPACITY,
            DEFAULT_LOAD_FACTOR,
            RandomState::new(),
        )
    }

    /// Creates an empty `UnifiedMap` sized to hold at least `capacity`
    /// entries without growing.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_load_factor_and_hasher(
            capacity,
            DEFAULT_LOAD_FACTOR,
            RandomState::new(),
        )
    }

    /// Creates an empty `UnifiedMap` with the given load factor.
    ///
    /// # Panics
    ///
    /// Panics if `load_factor` is outside `(0, 1]`.
    #[inline]
    pub fn with_load_factor(load_factor: f32) -> Self {
        Self::with_capacity_and_load_factor_and_hasher(
            DEFAULT_INITIAL_CAPACITY,
            load_factor,
            RandomState::new(),
        )
    }

    /// Creates an empty `UnifiedMap` with the given capacity hint and load
    /// factor.
    ///
    /// # Panics
    ///
    /// Panics if `load_factor` is outside `(0, 1]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let map: UnifiedMap<i32, i32> = UnifiedMap::with_capacity_and_load_factor(6, 0.75);
    /// assert_eq!(map.capacity(), 8);
    /// ```
    #[inline]
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f32) -> Self {
        Self::with_capacity_and_load_factor_and_hasher(capacity, load_factor, RandomState::new())
    }
}

impl<K, V, S> UnifiedMap<K, V, S> {
    /// Creates an empty `UnifiedMap` that hashes keys with `hasher`.
    #[inline]
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_load_factor_and_hasher(
            DEFAULT_INITIAL_CAPACITY,
            DEFAULT_LOAD_FACTOR,
            hasher,
        )
    }

    /// Creates an empty `UnifiedMap` sized for `capacity` entries, hashing
    /// keys with `hasher`.
    #[inline]
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::with_capacity_and_load_factor_and_hasher(capacity, DEFAULT_LOAD_FACTOR, hasher)
    }

    /// Creates an empty `UnifiedMap` from all three construction knobs.
    ///
    /// # Panics
    ///
    /// Panics if `load_factor` is outside `(0, 1]`.
    pub fn with_capacity_and_load_factor_and_hasher(
        capacity: usize,
        load_factor: f32,
        hasher: S,
    ) -> Self {
        assert!(
            load_factor > 0.0 && load_factor <= 1.0,
            "load factor must be in (0, 1], got {load_factor}"
        );
        let mut map = UnifiedMap {
            table: Vec::new(),
            occupied: 0,
            max_size: 0,
            load_factor,
            hasher,
        };
        map.allocate(init_capacity(capacity, load_factor));
        map
    }

    /// Returns the number of entries in the map.
    #[inline]
    pub fn len(&self) -> usize {
        self.occupied
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Returns the number of slots in the table; always a power of two.
    ///
    /// The map grows once its length would exceed `capacity × load_factor`.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// Returns the occupancy ratio that triggers growth.
    #[inline]
    pub fn load_factor(&self) -> f32 {
        self.load_factor
    }

    /// Returns a reference to the map's hasher.
    #[inline]
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Removes every entry. Capacity is not shrunk.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let mut map = UnifiedMap::new().with_key_value(1, "a");
    /// let capacity = map.capacity();
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), capacity);
    /// ```
    pub fn clear(&mut self) {
        if self.occupied == 0 {
            return;
        }
        self.occupied = 0;
        for slot in &mut self.table {
            *slot = Slot::Empty;
        }
    }

    /// An iterator over the entries in arbitrary order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.table, self.occupied)
    }

    /// An iterator over the entries with mutable access to the values.
    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.table, self.occupied)
    }

    /// An iterator over the keys in arbitrary order.
    #[inline]
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// An iterator over the values in arbitrary order.
    #[inline]
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// An iterator over the values with mutable access.
    #[inline]
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// A consuming iterator over the keys.
    #[inline]
    pub fn into_keys(self) -> IntoKeys<K, V> {
        IntoKeys {
            inner: self.into_iter(),
        }
    }

    /// A consuming iterator over the values.
    #[inline]
    pub fn into_values(self) -> IntoValues<K, V> {
        IntoValues {
            inner: self.into_iter(),
        }
    }

    /// A traversal handle that can remove the entries it yields; see
    /// [`Cursor`].
    #[inline]
    pub fn cursor(&mut self) -> Cursor<'_, K, V, S> {
        Cursor::new(self)
    }

    /// A live set view of the keys; see [`KeySet`].
    #[inline]
    pub fn key_set(&mut self) -> KeySet<'_, K, V, S> {
        KeySet { map: self }
    }

    /// A live set view of the entries; see [`EntrySet`].
    #[inline]
    pub fn entry_set(&mut self) -> EntrySet<'_, K, V, S> {
        EntrySet { map: self }
    }

    /// A live collection view of the values; see [`ValuesCollection`].
    #[inline]
    pub fn values_collection(&mut self) -> ValuesCollection<'_, K, V, S> {
        ValuesCollection { map: self }
    }

    /// Calls `f` for every entry in table order.
    pub fn for_each_key_value<F: FnMut(&K, &V)>(&self, mut f: F) {
        for slot in &self.table {
            match slot {
                Slot::Empty => {}
                Slot::Direct(k, v) => f(k, v),
                Slot::Chained(chain) => {
                    for (k, v) in chain {
                        f(k, v);
                    }
                }
            }
        }
    }

    /// Calls `f` for every key.
    #[inline]
    pub fn for_each_key<F: FnMut(&K)>(&self, mut f: F) {
        self.for_each_key_value(|k, _| f(k));
    }

    /// Calls `f` for every value.
    #[inline]
    pub fn for_each_value<F: FnMut(&V)>(&self, mut f: F) {
        self.for_each_key_value(|_, v| f(v));
    }

    /// Calls `f` for every value together with a running index in visit
    /// order.
    pub fn for_each_with_index<F: FnMut(&V, usize)>(&self, mut f: F) {
        let mut index = 0;
        self.for_each_key_value(|_, v| {
            f(v, index);
            index += 1;
        });
    }

    /// Returns `true` if any entry holds `value`. Linear in the map size.
    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Keeps only the entries for which `f` returns `true`.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let mut map: UnifiedMap<i32, i32> = (0..8).map(|i| (i, i * 10)).collect();
    /// map.retain(|&k, _| k % 2 == 0);
    /// assert_eq!(map.len(), 4);
    /// ```
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut removed = 0;
        for slot in &mut self.table {
            match slot {
                Slot::Empty => {}
                Slot::Direct(k, v) => {
                    if !f(k, v) {
                        *slot = Slot::Empty;
                        removed += 1;
                    }
                }
                Slot::Chained(chain) => {
                    let mut i = 0;
                    while i < chain.len() {
                        let (k, v) = &mut chain[i];
                        if f(k, v) {
                            i += 1;
                        } else {
                            chain.swap_remove(i);
                            removed += 1;
                        }
                    }
                    if chain.is_empty() {
                        *slot = Slot::Empty;
                    }
                }
            }
        }
        self.occupied -= removed;
    }

    /// Returns a map with the same slot layout, load factor, and keys, whose
    /// values are `f(key, value)`.
    ///
    /// The copy shares nothing with the original but mirrors its table shape
    /// exactly, including which slots carry chains.
    pub fn collect_values<R, F>(&self, mut f: F) -> UnifiedMap<K, R, S>
    where
        K: Clone,
        S: Clone,
        F: FnMut(&K, &V) -> R,
    {
        let table = self
            .table
            .iter()
            .map(|slot| match slot {
                Slot::Empty => Slot::Empty,
                Slot::Direct(k, v) => Slot::Direct(k.clone(), f(k, v)),
                Slot::Chained(chain) => {
                    let mut mapped = Vec::with_capacity(chain.capacity());
                    for (k, v) in chain {
                        mapped.push((k.clone(), f(k, v)));
                    }
                    Slot::Chained(mapped)
                }
            })
            .collect();
        UnifiedMap {
            table,
            occupied: self.occupied,
            max_size: self.max_size,
            load_factor: self.load_factor,
            hasher: self.hasher.clone(),
        }
    }

    /// Returns the number of slots currently acting as chain roots.
    pub fn colliding_buckets(&self) -> usize {
        self.table
            .iter()
            .filter(|slot| matches!(slot, Slot::Chained(_)))
            .count()
    }

    /// Estimates the memory footprint of the backing storage in machine
    /// words: two words per slot plus a two-word header for the table, and
    /// likewise for each chain buffer.
    pub fn memory_words(&self) -> usize {
        const HEADER: usize = 2;
        let mut words = self.table.len() * 2 + HEADER;
        for slot in &self.table {
            if let Slot::Chained(chain) = slot {
                words += chain.capacity() * 2 + HEADER;
            }
        }
        words
    }

    /// Replaces the table with `capacity` empty slots and recomputes the
    /// growth threshold. The threshold stays below `capacity` so open
    /// addressing always has a free slot to stop at.
    fn allocate(&mut self, capacity: usize) {
        debug_assert!(capacity.is_power_of_two());
        self.table = (0..capacity).map(|_| Slot::Empty).collect();
        self.max_size = (capacity - 1).min((capacity as f32 * self.load_factor) as usize);
    }
}

impl<K, V, S> UnifiedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Slot index for a key: the mixed hash masked by the table length.
    #[inline]
    fn index<Q: ?Sized + Hash>(&self, key: &Q) -> usize {
        (spread(self.hasher.hash_one(key)) as usize) & (self.table.len() - 1)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, `None` is returned. If it
    /// did, the value is replaced and the old value returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let mut map: UnifiedMap<i32, &str> = UnifiedMap::new();
    /// assert_eq!(map.put(1, "a"), None);
    /// assert_eq!(map.put(1, "b"), Some("a"));
    /// assert_eq!(map.get(&1), Some(&"b"));
    /// ```
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let index = self.index(&key);
        if matches!(self.table[index], Slot::Empty) {
            self.table[index] = Slot::Direct(key, value);
            self.record_insert();
            return None;
        }
        if let Slot::Direct(k, v) = &mut self.table[index] {
            if *k == key {
                return Some(mem::replace(v, value));
            }
        }
        self.chained_put(index, key, value)
    }

    /// Collision path of [`put`](UnifiedMap::put): the slot already holds a
    /// non-matching entry or a chain.
    fn chained_put(&mut self, index: usize, key: K, value: V) -> Option<V> {
        if let Slot::Chained(chain) = &mut self.table[index] {
            if let Some((_, v)) = chain.iter_mut().find(|(k, _)| *k == key) {
                return Some(mem::replace(v, value));
            }
            table::chain_push(chain, key, value);
            self.record_insert();
            return None;
        }
        // First collision on a direct slot: promote it to a two-pair chain.
        let (k0, v0) = match self.table[index].take() {
            Slot::Direct(k, v) => (k, v),
            _ => unreachable!("colliding slot is neither direct nor chained"),
        };
        self.table[index] = Slot::Chained(table::new_chain((k0, v0), (key, value)));
        self.record_insert();
        None
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let mut map: UnifiedMap<i32, &str> = UnifiedMap::new();
    /// map.put(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        match &self.table[self.index(key)] {
            Slot::Empty => None,
            Slot::Direct(k, v) => {
                if key.equivalent(k) {
                    Some(v)
                } else {
                    None
                }
            }
            Slot::Chained(chain) => chain
                .iter()
                .find(|(k, _)| key.equivalent(k))
                .map(|(_, v)| v),
        }
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let index = self.index(key);
        match &mut self.table[index] {
            Slot::Empty => None,
            Slot::Direct(k, v) => {
                if key.equivalent(k) {
                    Some(v)
                } else {
                    None
                }
            }
            Slot::Chained(chain) => chain
                .iter_mut()
                .find(|(k, _)| key.equivalent(k))
                .map(|(_, v)| v),
        }
    }

    /// Returns the key-value pair corresponding to the supplied key.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        match &self.table[self.index(key)] {
            Slot::Empty => None,
            Slot::Direct(k, v) => {
                if key.equivalent(k) {
                    Some((k, v))
                } else {
                    None
                }
            }
            Slot::Chained(chain) => chain
                .iter()
                .find(|(k, _)| key.equivalent(k))
                .map(|(k, v)| (k, v)),
        }
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let mut map: UnifiedMap<i32, Option<&str>> = UnifiedMap::new();
    /// map.put(1, None);
    /// assert!(map.contains_key(&1));
    /// assert!(!map.contains_key(&2));
    /// ```
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.get(key).is_some()
    }

    /// Removes a key from the map, returning the value at the key if the key
    /// was previously in the map.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let mut map: UnifiedMap<i32, &str> = UnifiedMap::new();
    /// map.put(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        match self.remove_entry(key) {
            Some((_, v)) => Some(v),
            None => None,
        }
    }

    /// Removes a key from the map, returning the stored key and value if the
    /// key was previously in the map.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let index = self.index(key);
        match &self.table[index] {
            Slot::Empty => None,
            Slot::Direct(k, _) => {
                if !key.equivalent(k) {
                    return None;
                }
                self.occupied -= 1;
                match self.table[index].take() {
                    Slot::Direct(k, v) => Some((k, v)),
                    _ => unreachable!(),
                }
            }
            Slot::Chained(_) => self.remove_from_chain(index, key),
        }
    }

    /// Chain removal compacts by swapping the trailing live pair into the
    /// hole; the buffer itself is only dropped once the chain empties, so an
    /// oversized chain keeps its allocation until the next rehash.
    fn remove_from_chain<Q>(&mut self, index: usize, key: &Q) -> Option<(K, V)>
    where
        Q: ?Sized + Equivalent<K>,
    {
        let Slot::Chained(chain) = &mut self.table[index] else {
            unreachable!("remove_from_chain on a non-chained slot")
        };
        let at = chain.iter().position(|(k, _)| key.equivalent(k))?;
        let entry = chain.swap_remove(at);
        let emptied = chain.is_empty();
        if emptied {
            self.table[index] = Slot::Empty;
        }
        self.occupied -= 1;
        Some(entry)
    }

    /// Returns the value for `key`, inserting `value` first if the key is
    /// absent.
    ///
    /// On a hit the stored value is returned untouched and `value` is
    /// dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let mut map: UnifiedMap<&str, i32> = UnifiedMap::new();
    /// assert_eq!(*map.get_or_insert("a", 1), 1);
    /// assert_eq!(*map.get_or_insert("a", 9), 1);
    /// assert_eq!(map.len(), 1);
    /// ```
    #[inline]
    pub fn get_or_insert(&mut self, key: K, value: V) -> &mut V {
        self.get_or_insert_with(key, move || value)
    }

    /// Returns the value for `key`, inserting `f()` first if the key is
    /// absent. `f` is only called on a miss.
    pub fn get_or_insert_with<F>(&mut self, key: K, f: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        match self.locate(&key) {
            Some(pos) => self.value_mut_at(pos),
            None => {
                self.reserve_one();
                let value = f();
                let pos = self.insert_unique(key, value);
                self.value_mut_at(pos)
            }
        }
    }

    /// Returns the value for `key`, inserting `f(parameter)` first if the
    /// key is absent.
    #[inline]
    pub fn get_or_insert_with_param<P, F>(&mut self, key: K, f: F, parameter: &P) -> &mut V
    where
        P: ?Sized,
        F: FnOnce(&P) -> V,
    {
        self.get_or_insert_with(key, move || f(parameter))
    }

    /// Updates the value for `key` with `f`, seeding a missing entry from
    /// `default` first, and returns the post-update value.
    ///
    /// On a miss the inserted value is `f(default())`; on a hit the stored
    /// value is replaced by `f(old)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let mut counts: UnifiedMap<&str, i32> = UnifiedMap::new();
    /// counts.update_value("a", || 0, |n| n + 1);
    /// counts.update_value("a", || 0, |n| n + 1);
    /// assert_eq!(counts.get(&"a"), Some(&2));
    /// ```
    pub fn update_value<D, F>(&mut self, key: K, default: D, f: F) -> &mut V
    where
        D: FnOnce() -> V,
        F: FnOnce(V) -> V,
    {
        match self.locate(&key) {
            Some(EntryPos::Direct(i)) => {
                let (k, v) = match self.table[i].take() {
                    Slot::Direct(k, v) => (k, v),
                    _ => unreachable!(),
                };
                self.table[i] = Slot::Direct(k, f(v));
                match &mut self.table[i] {
                    Slot::Direct(_, v) => v,
                    _ => unreachable!(),
                }
            }
            Some(EntryPos::Chain(i, j)) => {
                let Slot::Chained(chain) = &mut self.table[i] else {
                    unreachable!()
                };
                // Swap the pair out, transform, and re-append; the chain's
                // length is unchanged so no growth can happen.
                let (k, v) = chain.swap_remove(j);
                chain.push((k, f(v)));
                let at = chain.len() - 1;
                &mut chain[at].1
            }
            None => {
                self.reserve_one();
                let value = f(default());
                let pos = self.insert_unique(key, value);
                self.value_mut_at(pos)
            }
        }
    }

    /// [`update_value`](UnifiedMap::update_value) with an extra argument
    /// threaded through to `f`.
    #[inline]
    pub fn update_value_with<P, D, F>(
        &mut self,
        key: K,
        default: D,
        f: F,
        parameter: &P,
    ) -> &mut V
    where
        P: ?Sized,
        D: FnOnce() -> V,
        F: FnOnce(V, &P) -> V,
    {
        self.update_value(key, default, move |value| f(value, parameter))
    }

    /// Copies every entry of `other` into `self`, overwriting on key
    /// collisions.
    pub fn put_all<S2>(&mut self, other: &UnifiedMap<K, V, S2>)
    where
        K: Clone,
        V: Clone,
    {
        other.for_each_key_value(|k, v| {
            self.put(k.clone(), v.clone());
        });
    }

    /// Inserts a pair and returns the map, for chained construction.
    ///
    /// # Examples
    ///
    /// ```
    /// use unified_map::UnifiedMap;
    ///
    /// let map = UnifiedMap::new()
    ///     .with_key_value(1, "one")
    ///     .with_key_value(2, "two");
    /// assert_eq!(map.len(), 2);
    /// ```
    #[inline]
    pub fn with_key_value(mut self, key: K, value: V) -> Self {
        self.put(key, value);
        self
    }

    /// Creates a map from an iterator of pairs. Later pairs win on duplicate
    /// keys.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        S: Default,
    {
        let mut map = Self::with_hasher(S::default());
        map.extend(pairs);
        map
    }

    /// Creates a map holding clones of every entry of `other`.
    ///
    /// The copy is rebuilt through iteration rather than by mirroring the
    /// source table, so the two maps may hash with different states.
    pub fn from_map<S2>(other: &UnifiedMap<K, V, S2>) -> Self
    where
        K: Clone,
        V: Clone,
        S: Default,
    {
        let mut map = Self::with_capacity_and_hasher(
            other.len().max(DEFAULT_INITIAL_CAPACITY),
            S::default(),
        );
        map.put_all(other);
        map
    }

    /// Finds the table location of a key without touching it.
    fn locate<Q>(&self, key: &Q) -> Option<EntryPos>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let index = self.index(key);
        match &self.table[index] {
            Slot::Empty => None,
            Slot::Direct(k, _) => {
                if key.equivalent(k) {
                    Some(EntryPos::Direct(index))
                } else {
                    None
                }
            }
            Slot::Chained(chain) => chain
                .iter()
                .position(|(k, _)| key.equivalent(k))
                .map(|i| EntryPos::Chain(index, i)),
        }
    }

    fn value_mut_at(&mut self, pos: EntryPos) -> &mut V {
        match pos {
            EntryPos::Direct(i) => match &mut self.table[i] {
                Slot::Direct(_, v) => v,
                _ => unreachable!(),
            },
            EntryPos::Chain(i, j) => match &mut self.table[i] {
                Slot::Chained(chain) => &mut chain[j].1,
                _ => unreachable!(),
            },
        }
    }

    /// Places a key known to be absent and reports where it landed. The
    /// caller has already made room, so no growth happens and the returned
    /// position stays valid.
    fn insert_unique(&mut self, key: K, value: V) -> EntryPos {
        let index = self.index(&key);
        match self.table[index].take() {
            Slot::Empty => {
                self.table[index] = Slot::Direct(key, value);
                self.occupied += 1;
                EntryPos::Direct(index)
            }
            Slot::Direct(k0, v0) => {
                self.table[index] = Slot::Chained(table::new_chain((k0, v0), (key, value)));
                self.occupied += 1;
                EntryPos::Chain(index, 1)
            }
            Slot::Chained(mut chain) => {
                table::chain_push(&mut chain, key, value);
                let at = chain.len() - 1;
                self.table[index] = Slot::Chained(chain);
                self.occupied += 1;
                EntryPos::Chain(index, at)
            }
        }
    }

    /// Accounts for an insertion and grows when the threshold is crossed.
    #[inline]
    fn record_insert(&mut self) {
        self.occupied += 1;
        if self.occupied > self.max_size {
            let new_capacity = self.table.len() << 1;
            self.rehash(new_capacity);
        }
    }

    /// Grows ahead of an insertion, for callers that hand out references
    /// into the table right after inserting. The trigger condition matches
    /// [`record_insert`](UnifiedMap::record_insert) exactly.
    #[inline]
    fn reserve_one(&mut self) {
        if self.occupied + 1 > self.max_size {
            let new_capacity = self.table.len() << 1;
            self.rehash(new_capacity);
        }
    }

    /// Doubles the table and re-inserts every live entry against the new
    /// mask.
    fn rehash(&mut self, new_capacity: usize) {
        let old = mem::take(&mut self.table);
        self.allocate(new_capacity);
        self.occupied = 0;
        for slot in old {
            match slot {
                Slot::Empty => {}
                Slot::Direct(k, v) => {
                    self.put(k, v);
                }
                Slot::Chained(chain) => {
                    for (k, v) in chain {
                        self.put(k, v);
                    }
                }
            }
        }
    }

    /// Rebuilds the table around `entries`, dropping everything else the map
    /// still holds. Used by the view retain operations.
    pub(crate) fn adopt(&mut self, entries: Vec<(K, V)>) {
        self.allocate(init_capacity(entries.len(), self.load_factor));
        self.occupied = 0;
        for (k, v) in entries {
            self.put(k, v);
        }
    }
}

impl<K, V, S> Debug for UnifiedMap<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S: Default> Default for UnifiedMap<K, V, S> {
    /// Creates an empty `UnifiedMap` with the default capacity, load factor,
    /// and the `Default` value for the hasher.
    #[inline]
    fn default() -> Self {
        Self::with_capacity_and_load_factor_and_hasher(
            DEFAULT_INITIAL_CAPACITY,
            DEFAULT_LOAD_FACTOR,
            S::default(),
        )
    }
}

impl<K, V, S> PartialEq for UnifiedMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter()
            .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K, V, S> Eq for UnifiedMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S, Q> Index<&Q> for UnifiedMap<K, V, S>
where
    K: Eq + Hash,
    Q: ?Sized + Hash + Equivalent<K>,
    S: BuildHasher,
{
    type Output = V;

    /// Returns a reference to the value corresponding to the supplied key.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present in the `UnifiedMap`.
    #[inline]
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K, V, S> Extend<(K, V)> for UnifiedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    #[inline]
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.put(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for UnifiedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    #[inline]
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_pairs(iter)
    }
}

impl<K, V, S> IntoIterator for UnifiedMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    /// Creates a consuming iterator moving each entry out of the map in
    /// arbitrary order.
    #[inline]
    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter::new(self.table, self.occupied)
    }
}

impl<'a, K, V, S> IntoIterator for &'a UnifiedMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    #[inline]
    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut UnifiedMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    #[inline]
    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::RandomState;

    use hashbrown::HashMap;
    use rand::Rng;

    use crate::{table::Slot, UnifiedMap};

    /// A key whose hash collapses every instance into one bucket.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) struct Collider(pub(crate) u32);

    impl core::hash::Hash for Collider {
        fn hash<H: core::hash::Hasher>(&self, _state: &mut H) {}
    }

    /// Walks the whole table and asserts the structural invariants: power of
    /// two capacity, a free-slot margin, non-empty chains, every entry stored
    /// at its hash index, and an accurate length.
    pub(crate) fn check_invariants<K, V, S>(map: &UnifiedMap<K, V, S>)
    where
        K: Eq + core::hash::Hash,
        S: core::hash::BuildHasher,
    {
        assert!(map.table.len().is_power_of_two());
        assert!(map.max_size < map.table.len());
        let mut live = 0;
        for (i, slot) in map.table.iter().enumerate() {
            match slot {
                Slot::Empty => {}
                Slot::Direct(k, _) => {
                    assert_eq!(map.index(k), i, "direct entry stored out of place");
                    live += 1;
                }
                Slot::Chained(chain) => {
                    assert!(!chain.is_empty(), "chained slot with an empty chain");
                    for (k, _) in chain {
                        assert_eq!(map.index(k), i, "chained entry stored out of place");
                    }
                    live += chain.len();
                }
            }
        }
        assert_eq!(live, map.occupied, "occupied count out of sync");
    }

    #[test]
    fn basic_op() {
        let mut map = UnifiedMap::<String, String>::default();
        map.put("hello".to_string(), "world".to_string());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("hello").unwrap(), "world");
        map.put("hello2".to_string(), "world2".to_string());
        assert_eq!(map.get("hello2").unwrap(), "world2");
        assert_eq!(map.len(), 2);

        assert_eq!(
            map.remove_entry("hello").unwrap(),
            ("hello".to_string(), "world".to_string())
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.remove("hello2").unwrap(), "world2".to_string());
        assert_eq!(map.len(), 0);
        assert!(map.get("hello").is_none());

        map.put("hello3".to_string(), "world3".to_string());
        map.put("hello4".to_string(), "world4".to_string());
        map.clear();
        assert_eq!(map.len(), 0);
        assert!(map.get("hello3").is_none());
        assert!(map.get("hello4").is_none());
    }

    #[test]
    fn put_twice_is_idempotent_for_size() {
        let mut map = UnifiedMap::new();
        assert_eq!(map.put(7, "v"), None);
        assert_eq!(map.put(7, "v"), Some("v"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.remove(&7), Some("v"));
        assert_eq!(map.get(&7), None);
    }

    #[test]
    fn option_keys_and_values() {
        // The original table reserved a sentinel for null keys; here the
        // type system carries the same cases through Option.
        let mut map: UnifiedMap<Option<i32>, Option<&str>> = UnifiedMap::new();
        map.put(None, Some("a"));
        map.put(Some(1), None);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&None), Some(&Some("a")));
        assert_eq!(map.get(&Some(1)), Some(&None));
        assert!(map.contains_key(&None));
        assert!(map.contains_key(&Some(1)));
        assert!(map.contains_value(&None));

        let mut yielded_none_key = false;
        map.for_each_key(|k| yielded_none_key |= k.is_none());
        assert!(yielded_none_key);
    }

    #[test]
    fn grows_past_the_load_threshold() {
        let mut map = UnifiedMap::<i32, String>::with_capacity_and_load_factor(6, 0.75);
        assert_eq!(map.capacity(), 8);
        for i in 1..=6 {
            map.put(i, format!("v{i}"));
        }
        assert_eq!(map.capacity(), 8);
        map.put(7, "v7".to_string());
        assert_eq!(map.len(), 7);
        assert!(map.capacity() >= 16);
        for i in 1..=7 {
            assert_eq!(map.get(&i).unwrap(), &format!("v{i}"));
        }
        check_invariants(&map);
    }

    #[test]
    fn collisions_share_one_bucket() {
        let mut map = UnifiedMap::new();
        for i in 0..100u32 {
            map.put(Collider(i), i);
        }
        assert_eq!(map.len(), 100);
        assert_eq!(map.colliding_buckets(), 1);
        for i in 0..100 {
            assert_eq!(map.get(&Collider(i)), Some(&i));
        }
        check_invariants(&map);
    }

    #[test]
    fn chain_removal_compacts_toward_the_hole() {
        let mut map = UnifiedMap::new();
        for i in 0..10u32 {
            map.put(Collider(i), i);
        }
        // Removing a non-tail entry moves the trailing pair into its place;
        // everything else stays reachable.
        assert_eq!(map.remove(&Collider(3)), Some(3));
        assert_eq!(map.len(), 9);
        for i in (0..10).filter(|&i| i != 3) {
            assert_eq!(map.get(&Collider(i)), Some(&i));
        }
        check_invariants(&map);

        // Draining the chain entirely frees the bucket.
        for i in (0..10).filter(|&i| i != 3) {
            assert_eq!(map.remove(&Collider(i)), Some(i));
        }
        assert!(map.is_empty());
        assert_eq!(map.colliding_buckets(), 0);
        check_invariants(&map);
    }

    #[test]
    fn get_or_insert_variants() {
        let mut map: UnifiedMap<&str, i32> = UnifiedMap::new();
        assert_eq!(*map.get_or_insert("a", 1), 1);
        assert_eq!(*map.get_or_insert("a", 9), 1);

        let mut calls = 0;
        assert_eq!(
            *map.get_or_insert_with("b", || {
                calls += 1;
                2
            }),
            2
        );
        assert_eq!(
            *map.get_or_insert_with("b", || {
                calls += 1;
                9
            }),
            2
        );
        assert_eq!(calls, 1, "supplier must only run on a miss");

        assert_eq!(*map.get_or_insert_with_param("c", |p: &i32| p * 3, &11), 33);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn get_or_insert_survives_growth() {
        let mut map = UnifiedMap::<i32, i32>::with_capacity_and_load_factor(2, 0.75);
        for i in 0..40 {
            let v = *map.get_or_insert_with(i, || i * 10);
            assert_eq!(v, i * 10);
        }
        assert_eq!(map.len(), 40);
        for i in 0..40 {
            assert_eq!(map.get(&i), Some(&(i * 10)));
        }
        check_invariants(&map);
    }

    #[test]
    fn update_value_variants() {
        let mut counts: UnifiedMap<Collider, u32> = UnifiedMap::new();
        // Collider keys force the chained update path as the bucket fills.
        for round in 0..3 {
            for i in 0..8u32 {
                let updated = *counts.update_value(Collider(i), || 0, |n| n + 1);
                assert_eq!(updated, round + 1);
            }
        }
        for i in 0..8 {
            assert_eq!(counts.get(&Collider(i)), Some(&3));
        }

        let mut map: UnifiedMap<&str, i32> = UnifiedMap::new();
        assert_eq!(*map.update_value_with("k", || 10, |n, p| n + p, &5), 15);
        assert_eq!(*map.update_value_with("k", || 10, |n, p| n + p, &5), 20);
        check_invariants(&counts);
    }

    #[test]
    fn put_all_matches_repeated_put() {
        let mut source = UnifiedMap::new();
        for i in 0..50 {
            source.put(i, i * 2);
        }
        let mut bulk: UnifiedMap<i32, i32> = UnifiedMap::new();
        bulk.put_all(&source);

        let mut single: UnifiedMap<i32, i32> = UnifiedMap::new();
        source.for_each_key_value(|k, v| {
            single.put(*k, *v);
        });
        assert_eq!(bulk, single);
        assert_eq!(bulk, source);
    }

    #[test]
    fn construction_paths_agree() {
        let pairs = [(1, "a"), (2, "b"), (3, "c")];
        let from_pairs = UnifiedMap::<_, _>::from_pairs(pairs);
        let collected: UnifiedMap<_, _> = pairs.into_iter().collect();
        let copied = UnifiedMap::<_, _>::from_map(&from_pairs);
        let fluent = UnifiedMap::new()
            .with_key_value(1, "a")
            .with_key_value(2, "b")
            .with_key_value(3, "c");
        for map in [&from_pairs, &collected, &copied, &fluent] {
            assert_eq!(map.len(), 3);
            for (k, v) in pairs {
                assert_eq!(map.get(&k), Some(&v));
            }
        }
    }

    #[test]
    fn collect_values_preserves_shape() {
        let mut map = UnifiedMap::new();
        for i in 0..20u32 {
            map.put(Collider(i), i);
        }
        let doubled = map.collect_values(|_, v| v * 2);
        assert_eq!(doubled.len(), map.len());
        assert_eq!(doubled.capacity(), map.capacity());
        assert_eq!(doubled.load_factor(), map.load_factor());
        assert_eq!(doubled.colliding_buckets(), map.colliding_buckets());
        for i in 0..20 {
            assert_eq!(doubled.get(&Collider(i)), Some(&(i * 2)));
        }
    }

    #[test]
    fn retain_removes_failing_entries() {
        let mut map: UnifiedMap<i32, i32> = (0..32).map(|i| (i, i)).collect();
        map.retain(|&k, _| k % 4 == 0);
        assert_eq!(map.len(), 8);
        for i in 0..32 {
            assert_eq!(map.contains_key(&i), i % 4 == 0);
        }
        check_invariants(&map);
    }

    #[test]
    fn for_each_with_index_runs_in_visit_order() {
        let mut map = UnifiedMap::new();
        for i in 0..10 {
            map.put(i, i);
        }
        let mut indices = Vec::new();
        map.for_each_with_index(|_, index| indices.push(index));
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn memory_words_counts_chain_buffers() {
        let map = UnifiedMap::<i32, i32>::with_capacity_and_load_factor(4, 0.75);
        assert_eq!(map.memory_words(), map.capacity() * 2 + 2);

        let mut chained = UnifiedMap::<Collider, i32>::with_capacity_and_load_factor(4, 0.75);
        chained.put(Collider(0), 0);
        chained.put(Collider(1), 0);
        // One two-pair chain buffer on top of the flat table.
        assert_eq!(
            chained.memory_words(),
            chained.capacity() * 2 + 2 + (2 * 2 + 2)
        );
    }

    #[test]
    fn rehash_preserves_the_mapping() {
        let mut map = UnifiedMap::<i32, i32>::with_capacity_and_load_factor(2, 0.75);
        let mut snapshot = Vec::new();
        for i in 0..200 {
            map.put(i, i * 3);
            snapshot.push((i, i * 3));
        }
        for (k, v) in snapshot {
            assert_eq!(map.get(&k), Some(&v));
        }
        check_invariants(&map);
    }

    #[test]
    fn eq_ignores_iteration_order() {
        let mut map1: UnifiedMap<i32, i32> = UnifiedMap::new();
        let mut map2: UnifiedMap<i32, i32> = UnifiedMap::new();
        map1.put(1, 10);
        map1.put(2, 20);
        map2.put(2, 20);
        map2.put(1, 10);
        assert_eq!(map1, map2);
        map2.put(3, 30);
        assert_ne!(map1, map2);
    }

    #[test]
    fn index_test() {
        let mut map: UnifiedMap<i32, &str> = UnifiedMap::new();
        map.put(1, "a");
        assert_eq!(map[&1], "a");
    }

    #[test]
    #[should_panic(expected = "no entry found for key")]
    fn index_panic_test() {
        let map: UnifiedMap<i32, &str> = UnifiedMap::new();
        let _ = map[&1];
    }

    #[test]
    #[should_panic(expected = "load factor must be in (0, 1]")]
    fn zero_load_factor_panics() {
        let _ = UnifiedMap::<i32, i32>::with_capacity_and_load_factor(8, 0.0);
    }

    #[test]
    fn clone_is_independent() {
        let mut map = UnifiedMap::new();
        for i in 0..20u32 {
            map.put(Collider(i), i);
        }
        let mut cloned = map.clone();
        cloned.put(Collider(99), 99);
        assert_eq!(map.len(), 20);
        assert_eq!(cloned.len(), 21);
        for i in 0..20 {
            assert_eq!(cloned.get(&Collider(i)), Some(&i));
        }
        check_invariants(&cloned);
    }

    #[test]
    fn fuzzing() {
        let mut unified = UnifiedMap::<i32, i32>::new();
        let mut reference = HashMap::<i32, i32, RandomState>::default();
        for _ in 0..200_000 {
            let op = Operation::random();
            op.exec(&mut unified, &mut reference);
        }
        assert_eq!(unified.len(), reference.len());
        for (k, v) in &reference {
            assert_eq!(unified.get(k), Some(v));
        }
        let mut yielded = 0;
        unified.for_each_key_value(|k, v| {
            assert_eq!(reference.get(k), Some(v));
            yielded += 1;
        });
        assert_eq!(yielded, reference.len());
        check_invariants(&unified);

        enum Operation {
            Insert(i32, i32),
            Remove(i32),
            Get(i32),
            ModifyIfExist(i32, i32),
        }
        impl Operation {
            fn random() -> Self {
                let mut rng = rand::rng();

                let choice: u8 = rng.random();
                match choice % 4 {
                    0 => Operation::Insert(rng.random_range(0..96), rng.random()),
                    1 => Operation::Remove(rng.random_range(0..96)),
                    2 => Operation::Get(rng.random_range(0..96)),
                    3 => Operation::ModifyIfExist(rng.random_range(0..96), rng.random()),
                    _ => unreachable!(),
                }
            }

            fn exec(
                self,
                um: &mut UnifiedMap<i32, i32>,
                hm: &mut HashMap<i32, i32, RandomState>,
            ) {
                match self {
                    Operation::Insert(k, v) => {
                        assert_eq!(um.put(k, v), hm.insert(k, v));
                    }
                    Operation::Remove(k) => {
                        assert_eq!(um.remove(&k), hm.remove(&k));
                    }
                    Operation::Get(k) => {
                        assert_eq!(um.get(&k), hm.get(&k));
                    }
                    Operation::ModifyIfExist(k, nv) => {
                        let (uv, hv) = (um.get_mut(&k), hm.get_mut(&k));
                        assert_eq!(uv, hv);
                        if let Some(v) = uv {
                            *v = nv;
                        }
                        if let Some(v) = hv {
                            *v = nv;
                        }
                    }
                }
            }
        }
    }
}
