//! Copy-on-write manager for `Rc`-shared storage.
//!
//! - `share` implements handle copies: a cheap `Rc` clone, unless a mutable
//!   reference has escaped from the storage, in which case an eager deep copy.
//! - `exclusive` is the check-and-copy step run before every mutation.
//! - `Transaction` keeps the pre-call `Rc` alive across a multi-step mutation
//!   and puts it back if the mutation unwinds.

use std::rc::Rc;

/// Storage that can report whether a mutable alias into it was handed out.
pub(crate) trait Escape: Clone {
    fn escaped(&self) -> bool;
}

/// Produce a second handle to `data`.
pub(crate) fn share<T: Escape>(data: &Rc<T>) -> Rc<T> {
    if data.escaped() {
        Rc::new(T::clone(data))
    } else {
        Rc::clone(data)
    }
}

/// Exclusive access to `data`, deep-copying first if any other handle shares it.
///
/// If the copy panics, `data` still points at the original storage.
#[inline]
pub(crate) fn exclusive<T: Escape>(data: &mut Rc<T>) -> &mut T {
    Rc::make_mut(data)
}

/// Rollback scope for a mutation. Dropping it without `commit` restores the
/// storage the handle referenced when the transaction began.
pub(crate) struct Transaction<'a, T: Escape> {
    data: &'a mut Rc<T>,
    backup: Option<Rc<T>>,
}

impl<'a, T: Escape> Transaction<'a, T> {
    /// Begin a mutation that may fail after its first structural change.
    ///
    /// The backup is only taken when `data` is shared: an unshared structure
    /// stays unshared so the mutation happens in place.
    pub(crate) fn begin(data: &'a mut Rc<T>) -> Self {
        let backup = (Rc::strong_count(data) > 1).then(|| Rc::clone(data));
        Self { data, backup }
    }

    /// Begin a mutation that must be undoable even in place. Always keeps a
    /// backup, which forces the first `structure()` call to deep-copy.
    pub(crate) fn begin_with_backup(data: &'a mut Rc<T>) -> Self {
        let backup = Some(Rc::clone(data));
        Self { data, backup }
    }

    pub(crate) fn structure(&mut self) -> &mut T {
        exclusive(self.data)
    }

    /// Keep the mutated storage and release the backup.
    pub(crate) fn commit(mut self) {
        self.backup = None;
    }
}

impl<'a, T: Escape> Drop for Transaction<'a, T> {
    fn drop(&mut self) {
        if let Some(backup) = self.backup.take() {
            *self.data = backup;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Bag {
        items: Vec<u32>,
        escaped: bool,
    }

    impl Escape for Bag {
        fn escaped(&self) -> bool {
            self.escaped
        }
    }

    fn bag(items: &[u32]) -> Rc<Bag> {
        Rc::new(Bag {
            items: items.to_vec(),
            escaped: false,
        })
    }

    /// Invariant: sharing is by reference until an alias escapes, then eager.
    #[test]
    fn share_respects_escape_flag() {
        let mut a = bag(&[1]);
        let b = share(&a);
        assert!(Rc::ptr_eq(&a, &b));
        drop(b);

        exclusive(&mut a).escaped = true;
        let c = share(&a);
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(a.items, c.items);
    }

    /// Invariant: exclusive access copies only when shared.
    #[test]
    fn exclusive_copies_only_when_shared() {
        let mut a = bag(&[1]);
        let before = Rc::as_ptr(&a);
        exclusive(&mut a).items.push(2);
        assert_eq!(Rc::as_ptr(&a), before);

        let b = share(&a);
        exclusive(&mut a).items.push(3);
        assert!(!Rc::ptr_eq(&a, &b));
        assert_eq!(b.items, [1, 2]);
        assert_eq!(a.items, [1, 2, 3]);
    }

    /// Invariant: an uncommitted transaction restores the pre-call storage,
    /// a committed one keeps the mutation.
    #[test]
    fn transaction_rolls_back_unless_committed() {
        let mut a = bag(&[1]);
        {
            let mut tx = Transaction::begin_with_backup(&mut a);
            tx.structure().items.push(2);
        }
        assert_eq!(a.items, [1]);

        let mut tx = Transaction::begin_with_backup(&mut a);
        tx.structure().items.push(3);
        tx.commit();
        assert_eq!(a.items, [1, 3]);
    }

    /// Invariant: rollback after a panic puts back the very same allocation,
    /// so a sibling handle still shares it.
    #[test]
    fn transaction_restores_shared_reference_on_unwind() {
        let mut a = bag(&[1]);
        let sibling = share(&a);
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut tx = Transaction::begin(&mut a);
            tx.structure().items.push(2);
            panic!("injected");
        }));
        assert!(res.is_err());
        assert!(Rc::ptr_eq(&a, &sibling));
        assert_eq!(a.items, [1]);
    }
}
