//! # shared-handle
//!
//! `shared-handle` provides [`SharedHandle`], a **thread-safe reference-counted handle**
//! that lets many owners share one heap-allocated object.
//!
//! The object is destroyed exactly once, by the owner that releases it last,
//! and every write made by any owner before its release is visible to the destroying thread.
//!
//! ## Core Concepts
//!
//! - [`SharedHandle`] is an **owner**.
//!   Cloning it creates one more owner of the same object;
//!   dropping or resetting it releases the ownership.
//!
//! - The **control block** is a separately allocated atomic counter of owners.
//!   It is allocated when the first owner is created from a raw pointer or a value,
//!   and it is freed together with the object.
//!
//! - An **empty** handle owns nothing. Its use count is zero, and it must not be dereferenced.
//!
//! ## Example
//!
//! ```rust
//! use shared_handle::SharedHandle;
//!
//! # fn main() {
//! let first = SharedHandle::new(String::from("shared"));
//! let second = first.clone();
//!
//! assert_eq!(first.use_count(), 2);
//! assert!(first.ptr_eq(&second));
//!
//! drop(second);
//!
//! assert_eq!(first.use_count(), 1);
//! assert_eq!(*first, "shared");
//!
//! // Adopt an object that was allocated by the caller.
//! let mut third = SharedHandle::from_box(Box::new(String::from("boxed")));
//!
//! third.reset();
//!
//! assert!(third.is_empty());
//! assert_eq!(third.use_count(), 0);
//! # }
//! ```
//!
//! ## Safety Guarantees
//!
//! - The object is dropped exactly once, after the last owner is gone.
//! - The handle doesn't synchronize access to the object itself:
//!   use a lock or atomics inside of the object to mutate it concurrently.
//! - Dereferencing an empty handle panics when `cfg(debug_assertions)` is enabled,
//!   and is undefined behavior otherwise. Use [`SharedHandle::get`] for checked access.
//!
//! ## When *Not* to Use
//!
//! - If you need weak references, use [`std::sync::Arc`].
//! - If the object is shared by one thread only, a non-atomic counter is cheaper.
//!
//! ---

#![deny(clippy::all)]
#![deny(clippy::assertions_on_result_states)]
#![deny(clippy::match_wild_err_arm)]
#![deny(clippy::allow_attributes_without_reason)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(
    clippy::multiple_crate_versions,
    reason = "They were set by dev-dependencies"
)]
#![allow(
    clippy::missing_const_for_fn,
    reason = "Since we cannot make a constant function non-constant after its release,
    we need to look for a reason to make it constant, and not vice versa."
)]
#![allow(
    clippy::must_use_candidate,
    reason = "It is better to developer think about it."
)]
#![allow(
    clippy::module_name_repetitions,
    reason = "This is acceptable most of the time."
)]
#![allow(clippy::redundant_pub_crate, reason = "It improves readability.")]
#![allow(
    rustdoc::private_intra_doc_links,
    reason = "It allows to create more readable docs."
)]

mod control_block;
mod shared_handle;

pub use shared_handle::*;
