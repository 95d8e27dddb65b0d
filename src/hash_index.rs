//! HashIndex: hashed lookup from a key to its position and value.
//!
//! The index does not store keys. Probing compares through a caller supplied
//! predicate over positions, and rehashing uses the hash stored alongside each
//! key in the sequence, so the index itself never calls into `K`.

use crate::key_sequence::Position;
use hashbrown::HashTable;

/// One per live key: where the key sits in the sequence, and its value.
#[derive(Clone, Debug)]
pub(crate) struct Entry<V> {
    pub(crate) position: Position,
    pub(crate) value: V,
}

#[derive(Clone, Debug)]
pub(crate) struct HashIndex<V> {
    table: HashTable<Entry<V>>,
}

impl<V> Default for HashIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HashIndex<V> {
    pub(crate) fn new() -> Self {
        Self {
            table: HashTable::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    /// Probe for an entry whose position satisfies `is_match`.
    pub(crate) fn find<F>(&self, hash: u64, mut is_match: F) -> Option<&Entry<V>>
    where
        F: FnMut(Position) -> bool,
    {
        self.table.find(hash, |e| is_match(e.position))
    }

    /// Identity lookup by position; runs no user code.
    pub(crate) fn at(&self, hash: u64, pos: Position) -> Option<&Entry<V>> {
        self.table.find(hash, |e| e.position == pos)
    }

    pub(crate) fn at_mut(&mut self, hash: u64, pos: Position) -> Option<&mut Entry<V>> {
        self.table.find_mut(hash, |e| e.position == pos)
    }

    /// Insert an entry known to be absent. `rehash` maps a position to its
    /// stored hash when the table grows.
    pub(crate) fn insert_unique<H>(&mut self, hash: u64, entry: Entry<V>, rehash: H)
    where
        H: Fn(Position) -> u64,
    {
        let _ = self
            .table
            .insert_unique(hash, entry, |e| rehash(e.position));
    }

    pub(crate) fn remove_at(&mut self, hash: u64, pos: Position) -> Option<Entry<V>> {
        self.table
            .find_entry(hash, |e| e.position == pos)
            .ok()
            .map(|occupied| occupied.remove().0)
    }
}
