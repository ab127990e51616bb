//! This module provides the [`SharedHandle`].
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::{fmt, mem};
use orengine_utils::hints::{unlikely, unwrap_or_bug_message_hint};
use crate::control_block::ControlBlock;

/// A pointer to a shared object and to its [`ControlBlock`].
///
/// Both pointers are stored together, so a [`SharedHandle`] either has both or none of them.
struct Owned<T> {
    value: NonNull<T>,
    block: NonNull<ControlBlock>,
}

impl<T> Owned<T> {
    /// Takes ownership of a `Box`-allocated object and allocates a new control block for it.
    ///
    /// Returns `None` if `ptr` is null.
    ///
    /// # Safety
    ///
    /// `ptr` is null or is returned by [`Box::into_raw`] and is not owned by anything else.
    unsafe fn adopt(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(|value| Self {
            value,
            block: ControlBlock::allocate(),
        })
    }

    /// Returns a reference to the control block.
    fn block(&self) -> &ControlBlock {
        unsafe { self.block.as_ref() }
    }

    /// Drops the object and frees the control block.
    ///
    /// # Safety
    ///
    /// The caller was the last owner, and it has observed the count reaching zero.
    unsafe fn destroy(self) {
        log::trace!("destroying the shared object {:p}", self.value);

        drop(unsafe { Box::from_raw(self.value.as_ptr()) });

        unsafe { ControlBlock::free(self.block) };
    }
}

impl<T> Clone for Owned<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Owned<T> {}

/// A thread-safe reference-counted handle that shares ownership of a heap-allocated object.
///
/// Every clone of a `SharedHandle` is one more owner of the same object.
/// The object and its separately allocated counter are freed exactly once,
/// when the last owner is dropped or reset.
///
/// A handle can be empty. An empty handle owns nothing, its [`use_count`] is zero,
/// and it must not be dereferenced.
///
/// The handle protects only the lifetime of the object.
/// Concurrent mutation of the object requires its own synchronization,
/// for example, a `Mutex` inside of it.
///
/// # Memory ordering
///
/// Cloning increments the counter with [`Relaxed`] ordering: the cloning thread
/// already owns the object, so the count can't reach zero concurrently.
///
/// Releasing decrements the counter with [`Release`] ordering, and the thread that
/// brings it to zero issues an [`Acquire`] fence before dropping the object.
/// Therefore, all writes made by any owner before its release happen before the drop.
///
/// # Example
///
/// ```rust
/// use std::sync::Mutex;
/// use std::thread;
/// use shared_handle::SharedHandle;
///
/// let log = SharedHandle::new(Mutex::new(Vec::new()));
/// let threads = (0..4)
///     .map(|i| {
///         let log = log.clone();
///
///         thread::spawn(move || {
///             log.lock().unwrap().push(i);
///         })
///     })
///     .collect::<Vec<_>>();
///
/// for thread in threads {
///     thread.join().unwrap();
/// }
///
/// assert_eq!(log.use_count(), 1);
/// assert_eq!(log.lock().unwrap().len(), 4);
/// ```
///
/// [`use_count`]: SharedHandle::use_count
/// [`Relaxed`]: std::sync::atomic::Ordering::Relaxed
/// [`Release`]: std::sync::atomic::Ordering::Release
/// [`Acquire`]: std::sync::atomic::Ordering::Acquire
pub struct SharedHandle<T> {
    owned: Option<Owned<T>>,
    phantom_data: PhantomData<T>,
}

impl<T> SharedHandle<T> {
    /// Creates an empty `SharedHandle`.
    pub const fn empty() -> Self {
        Self {
            owned: None,
            phantom_data: PhantomData,
        }
    }

    /// Moves `value` to the heap and creates the first owner of it.
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Creates the first owner of the boxed object.
    pub fn from_box(value: Box<T>) -> Self {
        unsafe { Self::from_raw(Box::into_raw(value)) }
    }

    /// Creates the first owner of the object behind `ptr`.
    ///
    /// If `ptr` is null, it returns an empty handle.
    ///
    /// # Safety
    ///
    /// `ptr` is null or is returned by [`Box::into_raw`], and nothing else owns it.
    /// In particular, it must not be already owned by another `SharedHandle`:
    /// every call allocates a new counter.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self {
            owned: unsafe { Owned::adopt(ptr) },
            phantom_data: PhantomData,
        }
    }

    /// Returns whether the handle owns nothing.
    pub fn is_empty(&self) -> bool {
        self.owned.is_none()
    }

    /// Returns a reference to the object, or `None` if the handle is empty.
    pub fn get(&self) -> Option<&T> {
        self.owned
            .as_ref()
            .map(|owned| unsafe { owned.value.as_ref() })
    }

    /// Returns a mutable reference to the object if this handle is its only owner.
    ///
    /// Returns `None` if the handle is empty or the object has other owners.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self.owned.as_mut() {
            Some(owned) if owned.block().is_unique() => Some(unsafe { owned.value.as_mut() }),
            _ => None,
        }
    }

    /// Returns a pointer to the object, or a null pointer if the handle is empty.
    pub fn as_ptr(&self) -> *const T {
        self.owned
            .as_ref()
            .map_or(ptr::null(), |owned| owned.value.as_ptr().cast_const())
    }

    /// Returns the number of owners of the object, or zero if the handle is empty.
    ///
    /// It is only a snapshot: other threads can clone or drop their handles at any moment.
    /// Don't use it to decide whether the object can be accessed exclusively,
    /// use [`get_mut`](SharedHandle::get_mut) or [`try_unwrap`](SharedHandle::try_unwrap).
    pub fn use_count(&self) -> usize {
        self.owned
            .as_ref()
            .map_or(0, |owned| owned.block().owners())
    }

    /// Returns whether this handle is the only owner of the object.
    ///
    /// It takes `&mut self`, so no other thread can clone this handle while it runs.
    /// Therefore, unlike [`use_count`](SharedHandle::use_count), a `true` answer stays
    /// true until this handle is cloned, and it synchronizes with the releases
    /// of all previous owners.
    #[allow(
        clippy::needless_pass_by_ref_mut,
        reason = "The exclusive borrow is what makes the answer reliable."
    )]
    pub fn is_unique(&mut self) -> bool {
        self.owned
            .as_ref()
            .is_some_and(|owned| owned.block().is_unique())
    }

    /// Returns whether both handles share the same object.
    ///
    /// Two empty handles are considered equal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.owned.as_ref(), other.owned.as_ref()) {
            (Some(a), Some(b)) => a.block == b.block,
            (None, None) => true,
            _ => false,
        }
    }

    /// Makes this handle one more owner of the object of `source`.
    ///
    /// The previous object of this handle is released first. If both handles already share
    /// the same object (or both are empty), it does nothing.
    pub fn assign(&mut self, source: &Self) {
        if self.ptr_eq(source) {
            return;
        }

        self.release();

        if let Some(owned) = source.owned {
            owned.block().acquire_owner();

            self.owned = Some(owned);
        }
    }

    /// Releases the object and leaves the handle empty.
    ///
    /// It does nothing if the handle is already empty.
    pub fn reset(&mut self) {
        self.release();
    }

    /// Releases the object and becomes the first owner of the object behind `ptr`.
    ///
    /// If `ptr` is the object of this handle, it does nothing.
    /// If `ptr` is null, the handle becomes empty.
    ///
    /// # Safety
    ///
    /// `ptr` is null, is the current object of this handle,
    /// or satisfies the requirements of [`from_raw`](SharedHandle::from_raw).
    pub unsafe fn reset_raw(&mut self, ptr: *mut T) {
        if ptr.cast_const() == self.as_ptr() {
            return;
        }

        self.release();

        self.owned = unsafe { Owned::adopt(ptr) };
    }

    /// Releases the object and becomes the first owner of `value`.
    pub fn reset_with(&mut self, value: T) {
        *self = Self::new(value);
    }

    /// Swaps the objects of two handles without changing their counts.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.owned, &mut other.owned);
    }

    /// Moves the ownership out of this handle and leaves it empty.
    ///
    /// The count doesn't change.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Returns the object if this handle is its only owner.
    ///
    /// Otherwise, or if the handle is empty, it returns the handle back.
    ///
    /// # Errors
    ///
    /// Returns `Err(self)` when the object has other owners or the handle is empty.
    pub fn try_unwrap(mut self) -> Result<T, Self> {
        match self.owned {
            Some(owned) if owned.block().release_if_unique() => {
                self.owned = None;

                let value = unsafe { *Box::from_raw(owned.value.as_ptr()) };

                unsafe { ControlBlock::free(owned.block) };

                Ok(value)
            }
            _ => Err(self),
        }
    }

    /// Gives up the ownership of the object.
    ///
    /// The last owner drops the object and frees the control block.
    fn release(&mut self) {
        let Some(owned) = self.owned.take() else {
            return;
        };

        if unlikely(owned.block().release_owner()) {
            unsafe { owned.destroy() };
        }
    }
}

impl<T> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        if let Some(owned) = self.owned {
            owned.block().acquire_owner();
        }

        Self {
            owned: self.owned,
            phantom_data: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl<T> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> Deref for SharedHandle<T> {
    type Target = T;

    /// Returns a reference to the object.
    ///
    /// # Panics
    ///
    /// If the handle is empty and `cfg(debug_assertions)` is enabled.
    ///
    /// # Undefined behavior
    ///
    /// If the handle is empty and `cfg(debug_assertions)` is disabled.
    fn deref(&self) -> &T {
        unsafe {
            unwrap_or_bug_message_hint(self.owned, "Attempt to dereference an empty SharedHandle.")
                .value
                .as_ref()
        }
    }
}

impl<T> Default for SharedHandle<T> {
    /// Creates an empty `SharedHandle`.
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<T> for SharedHandle<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> From<Box<T>> for SharedHandle<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f
                .debug_struct("SharedHandle")
                .field("value", value)
                .field("use_count", &self.use_count())
                .finish(),
            None => f.write_str("SharedHandle(Empty)"),
        }
    }
}

impl<T> fmt::Pointer for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

impl<T: PartialEq> PartialEq for SharedHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl<T: Eq> Eq for SharedHandle<T> {}

impl<T: PartialOrd> PartialOrd for SharedHandle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.get().partial_cmp(&other.get())
    }
}

impl<T: Ord> Ord for SharedHandle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.get().cmp(&other.get())
    }
}

impl<T: Hash> Hash for SharedHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.get().hash(state);
    }
}

// Any owner can drop the object on its thread, and every owner can get `&T`.
unsafe impl<T: Send + Sync> Send for SharedHandle<T> {}
unsafe impl<T: Send + Sync> Sync for SharedHandle<T> {}
