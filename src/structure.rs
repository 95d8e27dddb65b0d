//! Structure: the hash index and key sequence kept mutually consistent, plus
//! the escaped-reference flag consulted by the copy-on-write layer.
//!
//! Consistency: every index entry points at exactly one live sequence node
//! holding its key, and every node is pointed at by exactly one entry. Each
//! method below either leaves the structure untouched or runs to completion
//! without calling into `K`/`V` while the two halves disagree. User code
//! (`Eq` while probing) only runs before the first structural change, and
//! displaced keys/values are handed back to the caller for dropping.

use crate::cow::Escape;
use crate::hash_index::{Entry, HashIndex};
use crate::key_sequence::{KeySequence, Position};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};

pub(crate) struct Structure<K, V, S> {
    hasher: S,
    index: HashIndex<V>,
    sequence: KeySequence<K>,
    escaped: bool,
}

/// Outcome of `Structure::upsert`.
pub(crate) struct Upserted<K, V> {
    pub(crate) position: Position,
    pub(crate) inserted: bool,
    /// The key and value replaced by a re-insertion; drop once consistent.
    pub(crate) displaced: Option<(K, V)>,
}

impl<K, V, S> Structure<K, V, S> {
    pub(crate) fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashIndex::new(),
            sequence: KeySequence::new(),
            escaped: false,
        }
    }

    pub(crate) fn hasher(&self) -> &S {
        &self.hasher
    }

    pub(crate) fn len(&self) -> usize {
        debug_assert_eq!(self.index.len(), self.sequence.len());
        self.sequence.len()
    }

    pub(crate) fn mark_escaped(&mut self) {
        self.escaped = true;
    }

    pub(crate) fn key(&self, pos: Position) -> Option<&K> {
        self.sequence.key(pos)
    }

    pub(crate) fn first(&self) -> Option<Position> {
        self.sequence.first()
    }

    pub(crate) fn last(&self) -> Option<Position> {
        self.sequence.last()
    }

    pub(crate) fn next(&self, pos: Position) -> Option<Position> {
        self.sequence.next(pos)
    }

    /// Fresh index lookup for the node at `pos`, using the stored hash.
    pub(crate) fn value(&self, pos: Position) -> Option<&V> {
        let hash = self.sequence.hash(pos)?;
        self.index.at(hash, pos).map(|e| &e.value)
    }

    pub(crate) fn value_mut(&mut self, pos: Position) -> Option<&mut V> {
        let hash = self.sequence.hash(pos)?;
        self.index.at_mut(hash, pos).map(|e| &mut e.value)
    }

    /// Unlink the node at `pos` and its entry. Neither step can fail once the
    /// position is known to be live.
    pub(crate) fn unlink(&mut self, pos: Position) -> Option<(K, V)> {
        let hash = self.sequence.hash(pos)?;
        let entry = self.index.remove_at(hash, pos)?;
        let key = self
            .sequence
            .remove(pos)
            .expect("indexed position must have a sequence node");
        Some((key, entry.value))
    }

    /// Empty both halves and return the old contents, so that dropping them
    /// happens after the structure is already consistent.
    pub(crate) fn take_contents(&mut self) -> (HashIndex<V>, KeySequence<K>) {
        let index = core::mem::take(&mut self.index);
        let sequence = core::mem::take(&mut self.sequence);
        (index, sequence)
    }
}

impl<K, V, S> Structure<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub(crate) fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Locate `q` given its hash. Runs `Eq` on colliding keys.
    pub(crate) fn locate<Q>(&self, hash: u64, q: &Q) -> Option<Position>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let sequence = &self.sequence;
        self.index
            .find(hash, |p| {
                sequence
                    .key(p)
                    .map(|k| k.borrow() == q)
                    .unwrap_or(false)
            })
            .map(|e| e.position)
    }

    /// Insert `key -> value`, or replace the value of an existing key and move
    /// that key to the end of the order.
    pub(crate) fn upsert(&mut self, hash: u64, key: K, value: V) -> Upserted<K, V> {
        // Only user code in here; nothing has changed yet if it panics.
        let existing = self.locate(hash, &key);

        let Self {
            index, sequence, ..
        } = self;
        let position = sequence.push_back(key, hash);
        match existing {
            Some(old) => {
                let entry = index
                    .at_mut(hash, old)
                    .expect("located key must have an index entry");
                entry.position = position;
                let old_value = core::mem::replace(&mut entry.value, value);
                let old_key = sequence
                    .remove(old)
                    .expect("located key must have a sequence node");
                Upserted {
                    position,
                    inserted: false,
                    displaced: Some((old_key, old_value)),
                }
            }
            None => {
                index.insert_unique(hash, Entry { position, value }, |p| {
                    sequence.hash(p).unwrap_or(0)
                });
                Upserted {
                    position,
                    inserted: true,
                    displaced: None,
                }
            }
        }
    }
}

/// Deep copy. Slot keys are indices into the arena, so every position handle
/// stays valid in the copy; the copy starts with no escaped references.
impl<K, V, S> Clone for Structure<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            index: self.index.clone(),
            sequence: self.sequence.clone(),
            escaped: false,
        }
    }
}

impl<K, V, S> Escape for Structure<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn escaped(&self) -> bool {
        self.escaped
    }
}
