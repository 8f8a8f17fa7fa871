//! Transaction identifiers.
//!
//! Transactions are only names here: pages record which transaction dirtied
//! them and the lock seam is keyed by them, but no commit or abort protocol
//! exists yet.

pub mod id;

pub use id::{TransactionId, TransactionIdGenerator};
