//! The flat slot table backing [`UnifiedMap`](crate::UnifiedMap).
//!
//! Each slot is the unit the hash function addresses. A colliding slot does not
//! spill into neighboring slots; instead it is promoted to a chain, a small
//! out-of-line buffer of key/value pairs that all share the slot's index. The
//! chain keeps its live pairs contiguous, so scans stop at `len()` and removal
//! compacts by swapping the trailing pair into the hole.

/// Pairs added to a chain buffer whenever it runs out of room.
pub(crate) const CHAIN_GROWTH: usize = 2;

/// One addressable slot of the table.
pub(crate) enum Slot<K, V> {
    /// No entry hashes here.
    Empty,
    /// Exactly one entry hashes here; it is stored inline.
    Direct(K, V),
    /// Two or more entries hash here; all of them live in the chain.
    ///
    /// A chain is never empty: removing its last pair collapses the slot back
    /// to `Empty` at the removal site.
    Chained(Vec<(K, V)>),
}

impl<K, V> Slot<K, V> {
    /// Moves the slot's contents out, leaving `Empty` behind.
    #[inline]
    pub(crate) fn take(&mut self) -> Slot<K, V> {
        core::mem::replace(self, Slot::Empty)
    }
}

impl<K: Clone, V: Clone> Clone for Slot<K, V> {
    fn clone(&self) -> Self {
        match self {
            Slot::Empty => Slot::Empty,
            Slot::Direct(k, v) => Slot::Direct(k.clone(), v.clone()),
            Slot::Chained(chain) => {
                let mut copy = Vec::with_capacity(chain.capacity());
                copy.extend(chain.iter().cloned());
                Slot::Chained(copy)
            }
        }
    }
}

/// Builds the two-pair chain a direct slot turns into on its first collision.
#[inline]
pub(crate) fn new_chain<K, V>(first: (K, V), second: (K, V)) -> Vec<(K, V)> {
    let mut chain = Vec::with_capacity(CHAIN_GROWTH);
    chain.push(first);
    chain.push(second);
    chain
}

/// Appends a pair, growing the buffer by [`CHAIN_GROWTH`] pairs when full.
#[inline]
pub(crate) fn chain_push<K, V>(chain: &mut Vec<(K, V)>, key: K, value: V) {
    if chain.len() == chain.capacity() {
        chain.reserve_exact(CHAIN_GROWTH);
    }
    chain.push((key, value));
}
