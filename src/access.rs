//! Access layer for tuple-oriented operations.
//!
//! - **DataType / Value**: fixed-width column types and their values
//! - **Schema**: ordered, typed column lists
//! - **Tuple**: a row, tagged with its record id once stored
//! - **HeapFile**: a table as a sequence of slotted pages on disk
//! - **scan**: the iterator protocol and the heap-file scan
//!
//! Tables are unordered; a tuple's location only matters for deleting it.

pub mod heap;
pub mod scan;
pub mod schema;
pub mod tuple;
pub mod value;

pub use heap::HeapFile;
pub use scan::{Cursor, HeapFileScan, OpIterator, TupleList, TupleSource};
pub use schema::{Column, Schema};
pub use tuple::Tuple;
pub use value::{CompareOp, DataType, Value};
