//! Internal disposal registry owned by a single scope.

use std::collections::HashSet;

use crate::traits::Disposable;

/// Outcome of appending to a [`DisposeBag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BagPush {
    /// Appended at the given creation position.
    Appended(usize),
    /// The instance is already tracked; nothing changed.
    Duplicate,
    /// Disposal has begun; the bag no longer accepts entries.
    Frozen,
}

/// Append-only, creation-ordered list of disposable instances.
///
/// Each instance appears at most once. Once [`freeze`](Self::freeze) has
/// handed out the snapshot, further appends are refused.
#[derive(Default)]
pub(crate) struct DisposeBag {
    entries: Vec<Disposable>,
    seen: HashSet<usize>,
    frozen: bool,
}

impl DisposeBag {
    /// Appends an instance unless it is already tracked or the bag is frozen.
    pub(crate) fn push(&mut self, instance: Disposable) -> BagPush {
        if self.frozen {
            return BagPush::Frozen;
        }
        if !self.seen.insert(instance.identity()) {
            return BagPush::Duplicate;
        }
        self.entries.push(instance);
        BagPush::Appended(self.entries.len() - 1)
    }

    /// Freezes the bag and takes its entries in creation order.
    pub(crate) fn freeze(&mut self) -> Vec<Disposable> {
        self.frozen = true;
        self.seen.clear();
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the bag is empty (nothing tracked).
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DisposeResult;
    use crate::traits::Dispose;
    use std::sync::Arc;

    struct Noop;
    impl Dispose for Noop {
        fn dispose(&self) -> DisposeResult {
            Ok(())
        }
    }

    #[test]
    fn appends_in_creation_order() {
        let mut bag = DisposeBag::default();
        assert_eq!(bag.push(Disposable::sync(Arc::new(Noop))), BagPush::Appended(0));
        assert_eq!(bag.push(Disposable::sync(Arc::new(Noop))), BagPush::Appended(1));
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn same_instance_is_tracked_once() {
        let mut bag = DisposeBag::default();
        let instance = Arc::new(Noop);
        assert_eq!(bag.push(Disposable::sync(instance.clone())), BagPush::Appended(0));
        assert_eq!(bag.push(Disposable::sync(instance)), BagPush::Duplicate);
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn frozen_bag_refuses_appends() {
        let mut bag = DisposeBag::default();
        bag.push(Disposable::sync(Arc::new(Noop)));
        let snapshot = bag.freeze();
        assert_eq!(snapshot.len(), 1);
        assert!(bag.is_empty());
        assert_eq!(bag.push(Disposable::sync(Arc::new(Noop))), BagPush::Frozen);
    }
}
