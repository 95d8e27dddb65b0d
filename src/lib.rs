//! insertion-ordered-map: a single-threaded hash map that iterates in
//! insertion order and shares storage between copies (copy-on-write).
//!
//! Internal Design:
//!
//! Summary
//! - Goal: O(1) average keyed access, deterministic iteration order that
//!   follows the most recent insertion of each key, O(1) copies, and the
//!   strong guarantee on every mutation.
//! - Layers:
//!   - KeySequence<K>: doubly linked list of keys threaded through a
//!     generational arena; `Position` handles are stable slot keys.
//!   - HashIndex<V>: hashed table of `{position, value}` entries; probes
//!     compare keys through the sequence and rehash from stored hashes.
//!   - Structure<K, V, S>: both halves plus the hasher and an
//!     escaped-reference flag; owns the consistency invariant.
//!   - cow: `Rc`-based sharing, check-and-copy before mutation, and a
//!     rollback transaction for multi-step mutations.
//!   - InsertionOrderedMap<K, V, S>: public handle; `Iter` walks positions
//!     and looks each value up afresh.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` through `Rc`; no internal locking.
//! - Unique keys. Re-inserting an existing key replaces its value and moves
//!   it to the end of the order.
//! - Each key's `u64` hash is computed once on insertion and stored; the
//!   table never calls `K: Hash` when it grows or when iterating.
//!
//! Copy-on-write and escaped references
//! - Cloning a map clones the `Rc`. The first mutation through a handle that
//!   shares storage deep-copies it first (`Rc::make_mut`).
//! - `get_mut` and `get_or_default` set the escaped flag before handing out
//!   `&mut V`. A clone of storage with the flag set copies eagerly instead of
//!   sharing. A fresh copy starts with the flag cleared; nothing else clears
//!   it.
//! - Arena slot keys survive a deep copy unchanged, so positions taken from
//!   the old storage stay valid in the copy.
//!
//! Failure model
//! - Absent keys on `get`, `get_mut` and `remove` yield `LookupError`.
//! - `Clone`, `Hash`, `Eq` and `Default` of user types may panic. The panic
//!   propagates unchanged, and the map (plus every map sharing its storage)
//!   is left exactly as it was before the call:
//!   - user code runs before the first structural change where possible;
//!   - a copy that panics midway is discarded before it is installed;
//!   - `merge`, `extend` and writes into shared storage run inside a
//!     `Transaction` that reinstalls the pre-call `Rc` on unwind;
//!   - displaced keys and values are dropped only once the structure is
//!     consistent again.

mod cow;
mod error;
mod hash_index;
mod insertion_ordered_map;
mod insertion_ordered_map_proptest;
mod key_sequence;
mod structure;

// Public surface
pub use error::LookupError;
pub use insertion_ordered_map::{InsertionOrderedMap, Iter};
pub use key_sequence::Position;
