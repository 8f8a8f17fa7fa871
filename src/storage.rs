//! Storage layer for heapdb.
//!
//! - **PageManager**: page-granular reads and writes of one file
//! - **HeapPage**: slotted page of fixed-width tuples with an occupancy bitmap
//! - **BufferPool**: bounded page cache with pluggable eviction
//!
//! Dirty pages reach disk only when flushed explicitly or when evicted.

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferPool, EvictionPolicy};
pub use disk::{PageManager, DEFAULT_PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::{HeapPage, PageId, PageRef, RecordId};
