//! Pull-based relational operators.
//!
//! Each operator is a [`TupleSource`](crate::access::scan::TupleSource);
//! wrap it in a [`Cursor`](crate::access::scan::Cursor) to drive it through
//! the [`OpIterator`](crate::access::scan::OpIterator) protocol. Operators
//! take their children as boxed `OpIterator`s, so plans compose freely.

use crate::catalog::Catalog;
use crate::storage::buffer::BufferPool;
use crate::transaction::TransactionId;
use std::sync::Arc;

pub mod aggregate;
pub mod delete;
pub mod filter;
pub mod insert;
pub mod seq_scan;

pub use aggregate::{Aggregate, AggregateOp};
pub use delete::Delete;
pub use filter::{Filter, Predicate};
pub use insert::Insert;
pub use seq_scan::SeqScan;

/// What every operator of one plan shares: the pool it reads and writes
/// through, and the transaction it acts for.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub pool: BufferPool,
    pub tid: TransactionId,
}

impl ExecutionContext {
    pub fn new(pool: BufferPool, tid: TransactionId) -> Self {
        Self { pool, tid }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.pool.catalog()
    }
}
