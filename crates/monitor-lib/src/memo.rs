//! Single-slot memoization for derived views
//!
//! Derived views are pure functions of their inputs, so a cache keyed on
//! input-tuple equality is enough to skip recomputation between ticks
//! when nothing relevant changed.

/// Remembers the last computed value and the key it was computed for
#[derive(Debug, Clone)]
pub struct Memo<K, V> {
    slot: Option<(K, V)>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self { slot: None }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, computing it on a miss
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce() -> V) -> &V {
        if !matches!(&self.slot, Some((cached, _)) if *cached == key) {
            self.slot = None;
        }
        let (_, value) = self.slot.get_or_insert_with(|| (key, compute()));
        value
    }
}
