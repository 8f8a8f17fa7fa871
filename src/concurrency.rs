//! Concurrency control seam.
//!
//! The buffer pool asks a [`LockManager`] for every page it hands out. The
//! only implementation today grants everything; a two-phase lock table can
//! slot in behind the same trait.

pub mod lock;

pub use lock::{LockManager, NoopLockManager, Permission};
