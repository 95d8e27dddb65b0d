//! KeySequence: insertion order as a doubly linked list threaded through a
//! generational arena.

use slotmap::{DefaultKey, SlotMap};

/// Stable handle to one node of the key sequence.
///
/// Stays valid while other keys are inserted or removed; it stops resolving
/// once its own node is removed, and never aliases a node that later reuses
/// the same slot. The public API only hands these out through
/// `Iter::position`, where they serve to compare iterator positions.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Position(DefaultKey);

impl Position {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Position(k)
    }
    pub(crate) fn raw_position(&self) -> DefaultKey {
        self.0
    }
}

#[derive(Clone, Debug)]
struct Link<K> {
    key: K,
    hash: u64,
    prev: Option<DefaultKey>,
    next: Option<DefaultKey>,
}

#[derive(Clone, Debug)]
pub(crate) struct KeySequence<K> {
    links: SlotMap<DefaultKey, Link<K>>,
    head: Option<DefaultKey>,
    tail: Option<DefaultKey>,
}

impl<K> Default for KeySequence<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeySequence<K> {
    pub(crate) fn new() -> Self {
        Self {
            links: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    /// Append `key` (with its precomputed hash) and return the new node's handle.
    pub(crate) fn push_back(&mut self, key: K, hash: u64) -> Position {
        let prev = self.tail;
        let k = self.links.insert(Link {
            key,
            hash,
            prev,
            next: None,
        });
        match prev {
            Some(p) => self.links[p].next = Some(k),
            None => self.head = Some(k),
        }
        self.tail = Some(k);
        Position::new(k)
    }

    /// Unlink and return the key at `pos`. O(1); neighbours keep their handles.
    pub(crate) fn remove(&mut self, pos: Position) -> Option<K> {
        let link = self.links.remove(pos.raw_position())?;
        match link.prev {
            Some(p) => self.links[p].next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(n) => self.links[n].prev = link.prev,
            None => self.tail = link.prev,
        }
        Some(link.key)
    }

    pub(crate) fn key(&self, pos: Position) -> Option<&K> {
        self.links.get(pos.raw_position()).map(|l| &l.key)
    }

    pub(crate) fn hash(&self, pos: Position) -> Option<u64> {
        self.links.get(pos.raw_position()).map(|l| l.hash)
    }

    pub(crate) fn first(&self) -> Option<Position> {
        self.head.map(Position::new)
    }

    pub(crate) fn last(&self) -> Option<Position> {
        self.tail.map(Position::new)
    }

    pub(crate) fn next(&self, pos: Position) -> Option<Position> {
        self.links
            .get(pos.raw_position())
            .and_then(|l| l.next)
            .map(Position::new)
    }
}
