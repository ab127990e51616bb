//! This module provides the [`ControlBlock`].
use std::ptr::NonNull;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::atomic::{fence, AtomicUsize};
use orengine_utils::hints::{likely, unlikely};

/// The maximum number of owners of one control block.
///
/// Above this value the counter could overflow after enough `mem::forget` calls,
/// and an overflowed counter would free a live object.
const MAX_OWNERS: usize = isize::MAX as usize;

/// A separately allocated counter of live owners of one shared object.
///
/// It is created with a count of one by the first owner and is freed
/// by the owner that brings the count to zero.
pub(crate) struct ControlBlock {
    owners: AtomicUsize,
}

impl ControlBlock {
    /// Allocates a new control block with one owner.
    pub(crate) fn allocate() -> NonNull<Self> {
        let block = NonNull::from(Box::leak(Box::new(Self {
            owners: AtomicUsize::new(1),
        })));

        log::trace!("allocated control block {block:p}");

        block
    }

    /// Frees a control block allocated with [`ControlBlock::allocate`].
    ///
    /// # Safety
    ///
    /// * `block` was returned by [`ControlBlock::allocate`] and is not freed yet.
    /// * The count has reached zero, so no owner can access `block` anymore.
    pub(crate) unsafe fn free(block: NonNull<Self>) {
        debug_assert_eq!(unsafe { block.as_ref() }.owners.load(Relaxed), 0);

        drop(unsafe { Box::from_raw(block.as_ptr()) });
    }

    /// Returns the current number of owners.
    ///
    /// It is a relaxed snapshot, and it can be stale by the time the caller reads it.
    pub(crate) fn owners(&self) -> usize {
        self.owners.load(Relaxed)
    }

    /// Returns whether the caller is the only owner.
    ///
    /// A `true` answer synchronizes with every release of the other owners.
    /// It means exclusive access only if the caller also holds its owner exclusively,
    /// otherwise another thread can register a new owner right after the load.
    pub(crate) fn is_unique(&self) -> bool {
        self.owners.load(Acquire) == 1
    }

    /// Registers one more owner.
    ///
    /// The caller is already an owner, so the count can't reach zero concurrently,
    /// and atomicity alone is enough.
    ///
    /// # Aborts
    ///
    /// It aborts the process if the count overflows.
    pub(crate) fn acquire_owner(&self) {
        let prev = self.owners.fetch_add(1, Relaxed);

        debug_assert_ne!(prev, 0, "a released control block was resurrected");

        if unlikely(prev > MAX_OWNERS) {
            log::error!("the number of owners of a shared handle overflowed, aborting");

            std::process::abort();
        }
    }

    /// Unregisters one owner and returns whether it was the last one.
    ///
    /// The decrement publishes the caller's writes to the object. When it returns
    /// `true`, all writes of all previous owners are visible to the caller,
    /// and the caller must destroy the object and [`free`](ControlBlock::free) the block.
    #[must_use]
    pub(crate) fn release_owner(&self) -> bool {
        let prev = self.owners.fetch_sub(1, Release);

        debug_assert_ne!(prev, 0, "a control block was released more times than it was acquired");

        if likely(prev != 1) {
            return false;
        }

        // Pairs with the `Release` decrements of all previous owners
        fence(Acquire);

        true
    }

    /// Unregisters the caller only if it is the last owner.
    ///
    /// Returns `true` if the count was one and now is zero. In this case it behaves
    /// like a successful [`release_owner`](ControlBlock::release_owner).
    /// Otherwise, the count is left untouched.
    #[must_use]
    pub(crate) fn release_if_unique(&self) -> bool {
        self.owners
            .compare_exchange(1, 0, Acquire, Relaxed)
            .is_ok()
    }
}

