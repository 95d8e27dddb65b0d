//! InsertionOrderedMap: public handle over copy-on-write shared storage.

use crate::cow::{self, exclusive, Transaction};
use crate::error::LookupError;
use crate::key_sequence::Position;
use crate::structure::{Structure, Upserted};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use std::collections::hash_map::RandomState;
use std::rc::Rc;

/// A hash map that iterates in insertion order and shares its storage
/// between clones until one of them is written to.
///
/// Inserting a key that is already present replaces its value and moves the
/// key to the end of the order. Cloning is O(1) unless a mutable reference
/// was handed out from the storage (`get_mut`, `get_or_default`), in which
/// case the clone copies eagerly.
pub struct InsertionOrderedMap<K, V, S = RandomState> {
    data: Rc<Structure<K, V, S>>,
}

impl<K, V> InsertionOrderedMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, S: Default> Default for InsertionOrderedMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> InsertionOrderedMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            data: Rc::new(Structure::with_hasher(hasher)),
        }
    }

    pub fn hasher(&self) -> &S {
        self.data.hasher()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries from least to most recently inserted.
    pub fn iter(&self) -> Iter<'_, K, V, S> {
        Iter {
            structure: &self.data,
            cursor: self.data.first(),
            remaining: self.data.len(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    /// The least recently inserted entry.
    pub fn first(&self) -> Option<(&K, &V)> {
        self.entry_at(self.data.first()?)
    }

    /// The most recently inserted entry.
    pub fn last(&self) -> Option<(&K, &V)> {
        self.entry_at(self.data.last()?)
    }

    /// True if both maps currently reference the same storage.
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    fn entry_at(&self, pos: Position) -> Option<(&K, &V)> {
        Some((self.data.key(pos)?, self.data.value(pos)?))
    }
}

impl<K, V, S> InsertionOrderedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn position_of<Q>(&self, q: &Q) -> Option<Position>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.data.make_hash(q);
        self.data.locate(hash, q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.position_of(q).is_some()
    }

    /// Shared access to the value for `q`. Never copies storage.
    pub fn get<Q>(&self, q: &Q) -> Result<&V, LookupError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.position_of(q).ok_or(LookupError)?;
        self.data.value(pos).ok_or(LookupError)
    }
}

impl<K, V, S> InsertionOrderedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Insert `key -> value`. Returns `true` if the key was new, `false` if an
    /// existing value was replaced; either way the key is now last in order.
    ///
    /// If `K: Hash` or `K: Eq` panics, or `K: Clone`/`V: Clone` panics while
    /// shared storage is being copied, the map (and any map sharing its
    /// storage) is left exactly as before the call.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.data.make_hash(&key);
        let mut tx = Transaction::begin(&mut self.data);
        let Upserted {
            inserted,
            displaced,
            ..
        } = tx.structure().upsert(hash, key, value);
        tx.commit();
        drop(displaced);
        inserted
    }

    /// Remove `q` and return its value, or `LookupError` if absent.
    pub fn remove<Q>(&mut self, q: &Q) -> Result<V, LookupError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.position_of(q).ok_or(LookupError)?;
        let (_key, value) = exclusive(&mut self.data)
            .unlink(pos)
            .expect("located key must be unlinkable");
        Ok(value)
    }

    /// Mutable access to the value for `q`.
    ///
    /// Marks the storage as having an escaped reference, so the next clone of
    /// this map copies eagerly instead of sharing.
    pub fn get_mut<Q>(&mut self, q: &Q) -> Result<&mut V, LookupError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let pos = self.position_of(q).ok_or(LookupError)?;
        Ok(self.escape_value(pos))
    }

    /// Mutable access to the value for `key`, inserting `V::default()` at the
    /// end of the order first if the key is absent. A present key keeps its
    /// position.
    pub fn get_or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let hash = self.data.make_hash(&key);
        let pos = match self.data.locate(hash, &key) {
            Some(pos) => pos,
            None => {
                let value = V::default();
                let mut tx = Transaction::begin(&mut self.data);
                let upserted = tx.structure().upsert(hash, key, value);
                tx.commit();
                upserted.position
            }
        };
        self.escape_value(pos)
    }

    fn escape_value(&mut self, pos: Position) -> &mut V {
        let structure = exclusive(&mut self.data);
        structure.mark_escaped();
        structure
            .value_mut(pos)
            .expect("located key must have a value")
    }

    /// Insert every entry of `other`, in `other`'s order. Keys present in both
    /// end up last, with `other`'s value.
    ///
    /// All or nothing: if cloning, hashing or comparing any key or value
    /// panics, `self` is restored to its exact state before the call.
    pub fn merge(&mut self, other: &Self) {
        if other.is_empty() || self.shares_storage_with(other) {
            return;
        }
        let mut tx = Transaction::begin_with_backup(&mut self.data);
        for (k, v) in other.iter() {
            let structure = tx.structure();
            let hash = structure.make_hash(k);
            structure.upsert(hash, k.clone(), v.clone());
        }
        tx.commit();
    }

    /// Remove every entry. Maps sharing the storage keep their contents.
    pub fn clear(&mut self) {
        match Rc::get_mut(&mut self.data) {
            Some(structure) => drop(structure.take_contents()),
            None => {
                let hasher = self.data.hasher().clone();
                self.data = Rc::new(Structure::with_hasher(hasher));
            }
        }
    }
}

impl<K, V, S> Clone for InsertionOrderedMap<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            data: cow::share(&self.data),
        }
    }
}

#[cfg(test)]
impl<K: Clone, V: Clone, S: Clone> InsertionOrderedMap<K, V, S> {
    pub(crate) fn is_escaped(&self) -> bool {
        use crate::cow::Escape;
        self.data.escaped()
    }
}

impl<K, V, S> fmt::Debug for InsertionOrderedMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Inserts each pair in turn; the whole batch is undone if any step panics.
impl<K, V, S> Extend<(K, V)> for InsertionOrderedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let mut tx = Transaction::begin_with_backup(&mut self.data);
        for (k, v) in iter {
            let structure = tx.structure();
            let hash = structure.make_hash(&k);
            structure.upsert(hash, k, v);
        }
        tx.commit();
    }
}

impl<K, V, S> FromIterator<(K, V)> for InsertionOrderedMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a InsertionOrderedMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, S>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over `(&K, &V)` in insertion order.
///
/// Holds a position in the key sequence and looks the value up afresh at
/// each step. Equality compares positions only.
pub struct Iter<'a, K, V, S> {
    structure: &'a Structure<K, V, S>,
    cursor: Option<Position>,
    remaining: usize,
}

impl<'a, K, V, S> Iter<'a, K, V, S> {
    /// Position of the entry the next call to `next` yields, if any.
    ///
    /// Only meaningful for comparing two iterators over the same map.
    pub fn position(&self) -> Option<Position> {
        self.cursor
    }
}

impl<'a, K, V, S> Iterator for Iter<'a, K, V, S> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.cursor?;
        let key = self.structure.key(pos)?;
        let value = self.structure.value(pos)?;
        self.cursor = self.structure.next(pos);
        self.remaining = self.remaining.saturating_sub(1);
        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V, S> ExactSizeIterator for Iter<'a, K, V, S> {}

impl<'a, K, V, S> FusedIterator for Iter<'a, K, V, S> {}

impl<'a, K, V, S> Clone for Iter<'a, K, V, S> {
    fn clone(&self) -> Self {
        Self {
            structure: self.structure,
            cursor: self.cursor,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V, S> PartialEq for Iter<'a, K, V, S> {
    fn eq(&self, other: &Self) -> bool {
        self.cursor == other.cursor
    }
}

impl<'a, K, V, S> Eq for Iter<'a, K, V, S> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn order<V: Clone>(m: &InsertionOrderedMap<&'static str, V>) -> Vec<(&'static str, V)> {
        m.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    /// Invariant: clones share storage until one of them is written, and the
    /// write never shows through the other handle.
    #[test]
    fn clone_shares_until_write() {
        let mut a = InsertionOrderedMap::new();
        a.insert("k", 1);
        let mut b = a.clone();
        assert!(a.shares_storage_with(&b));

        b.insert("k2", 2);
        assert!(!a.shares_storage_with(&b));
        assert_eq!(order(&a), [("k", 1)]);
        assert_eq!(order(&b), [("k", 1), ("k2", 2)]);
    }

    /// Invariant: after `get_mut`, the next clone copies eagerly and the
    /// copy starts with no escaped reference of its own.
    #[test]
    fn escaped_reference_forces_eager_copy() {
        let mut a = InsertionOrderedMap::new();
        a.insert("k", 1);
        *a.get_mut("k").unwrap() = 5;
        assert!(a.is_escaped());

        let b = a.clone();
        assert!(!a.shares_storage_with(&b));
        assert!(!b.is_escaped());

        let c = b.clone();
        assert!(b.shares_storage_with(&c));
        assert_eq!(order(&c), [("k", 5)]);
    }

    /// Invariant: `get` never marks the storage escaped and never copies.
    #[test]
    fn shared_get_does_not_escape() {
        let mut a = InsertionOrderedMap::new();
        a.insert("k", 1);
        let b = a.clone();
        assert_eq!(a.get("k"), Ok(&1));
        assert_eq!(a.get("z"), Err(LookupError));
        assert!(!a.is_escaped());
        assert!(a.shares_storage_with(&b));
    }

    /// Invariant: `get_or_default` marks the storage escaped whether the key
    /// was present or default-inserted, on shared and unshared storage.
    #[test]
    fn get_or_default_escapes() {
        let mut present = InsertionOrderedMap::new();
        present.insert("a", 1);
        *present.get_or_default("a") += 1;
        assert!(present.is_escaped());
        assert!(!present.clone().shares_storage_with(&present));

        let mut unshared = InsertionOrderedMap::new();
        unshared.insert("a", 1);
        *unshared.get_or_default("b") = 2;
        assert!(unshared.is_escaped());
        assert!(!unshared.clone().shares_storage_with(&unshared));

        let mut shared = InsertionOrderedMap::new();
        shared.insert("a", 1);
        let sibling = shared.clone();
        *shared.get_or_default("b") = 2;
        assert!(shared.is_escaped());
        assert!(!sibling.is_escaped());
        assert!(!shared.clone().shares_storage_with(&shared));
        assert_eq!(order(&sibling), [("a", 1)]);
        assert_eq!(order(&shared), [("a", 1), ("b", 2)]);
    }

    /// Invariant: `get_or_default` on a present key keeps its position.
    #[test]
    fn get_or_default_keeps_present_position() {
        let mut m = InsertionOrderedMap::new();
        m.insert("a", 1);
        m.insert("b", 2);
        *m.get_or_default("a") = 7;
        assert_eq!(order(&m), [("a", 7), ("b", 2)]);
        *m.get_or_default("c") += 3;
        assert_eq!(order(&m), [("a", 7), ("b", 2), ("c", 3)]);
    }

    /// Invariant: clearing a shared map leaves the sibling intact; clearing
    /// an unshared map empties it in place.
    #[test]
    fn clear_respects_sharing() {
        let mut a = InsertionOrderedMap::new();
        a.insert("a", 1);
        let b = a.clone();
        a.clear();
        assert!(a.is_empty());
        assert_eq!(order(&b), [("a", 1)]);

        let mut c = b.clone();
        drop(b);
        let before = Rc::as_ptr(&c.data);
        c.clear();
        assert_eq!(Rc::as_ptr(&c.data), before);
        assert!(c.is_empty());
    }

    /// Invariant: merging two handles to the same storage changes nothing.
    #[test]
    fn merge_with_shared_self_is_noop() {
        let mut a = InsertionOrderedMap::new();
        a.insert("a", 1);
        a.insert("b", 2);
        let b = a.clone();
        a.merge(&b);
        assert!(a.shares_storage_with(&b));
        assert_eq!(order(&a), [("a", 1), ("b", 2)]);
    }

    /// Invariant: iterator equality compares positions; a clone of an
    /// iterator restarts from the same place.
    #[test]
    fn iterator_position_identity() {
        let m: InsertionOrderedMap<_, _> = [("a", 1), ("b", 2)].into_iter().collect();
        let mut it = m.iter();
        let start = it.clone();
        assert_eq!(it.len(), 2);
        assert!(it == start);
        assert_eq!(it.next(), Some((&"a", &1)));
        assert!(it != start);

        let mut second = start.clone();
        second.next();
        assert!(it == second);
        assert_eq!(it.next(), Some((&"b", &2)));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
        assert!(it.position().is_none());
        assert_eq!(start.count(), 2);
    }

    /// Invariant: `first`/`last` follow re-insertion.
    #[test]
    fn first_and_last_track_order() {
        let mut m = InsertionOrderedMap::new();
        assert!(m.first().is_none());
        m.insert("a", 1);
        m.insert("b", 2);
        assert_eq!(m.first(), Some((&"a", &1)));
        m.insert("a", 3);
        assert_eq!(m.first(), Some((&"b", &2)));
        assert_eq!(m.last(), Some((&"a", &3)));
    }

    #[test]
    fn debug_lists_entries_in_order() {
        let mut m = InsertionOrderedMap::new();
        m.insert("b", 1);
        m.insert("a", 2);
        assert_eq!(format!("{:?}", m), r#"{"b": 1, "a": 2}"#);
    }
}
