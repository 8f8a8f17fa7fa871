//! heapdb: a single-node relational storage engine.
//!
//! Tables are heap files of fixed-size slotted pages. Every page access goes
//! through a bounded [`storage::buffer::BufferPool`], and relational
//! operators pull tuples through the [`access::scan::OpIterator`] protocol.

pub mod access;
pub mod catalog;
pub mod concurrency;
pub mod database;
pub mod executor;
pub mod storage;
pub mod transaction;
