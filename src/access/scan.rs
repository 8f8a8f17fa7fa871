//! The pull-based iterator protocol shared by table scans and operators.
//!
//! A producer only implements [`TupleSource`]: it yields tuples until it
//! runs out. [`Cursor`] wraps a source with the open/closed state machine
//! and one tuple of lookahead, so `has_next` can be asked repeatedly without
//! consuming anything.

use crate::access::heap::HeapFile;
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::concurrency::Permission;
use crate::storage::buffer::BufferPool;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Produces tuples one at a time.
pub trait TupleSource {
    /// Schema of the tuples this source yields.
    fn schema(&self) -> &Arc<Schema>;

    /// Prepares the source; called before the first `fetch_next`.
    fn open(&mut self) -> StorageResult<()> {
        Ok(())
    }

    /// The next tuple, or `None` once exhausted.
    fn fetch_next(&mut self) -> StorageResult<Option<Tuple>>;

    /// Restarts from the first tuple.
    fn rewind(&mut self) -> StorageResult<()>;

    fn close(&mut self) {}
}

/// The iterator interface operators consume.
///
/// Every method except `open` and `close` fails with
/// [`StorageError::IteratorNotOpen`] unless the iterator is open.
pub trait OpIterator {
    fn open(&mut self) -> StorageResult<()>;

    fn has_next(&mut self) -> StorageResult<bool>;

    /// The next tuple; fails with [`StorageError::NoSuchElement`] once
    /// exhausted.
    fn next(&mut self) -> StorageResult<Tuple>;

    fn rewind(&mut self) -> StorageResult<()>;

    fn close(&mut self);

    fn schema(&self) -> &Arc<Schema>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Created,
    Open,
    Closed,
}

/// Adapts a [`TupleSource`] to [`OpIterator`].
pub struct Cursor<S> {
    source: S,
    state: CursorState,
    lookahead: Option<Tuple>,
}

impl<S: TupleSource> Cursor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: CursorState::Created,
            lookahead: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_open(&self) -> bool {
        self.state == CursorState::Open
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StorageError::IteratorNotOpen)
        }
    }
}

impl<S: TupleSource> OpIterator for Cursor<S> {
    fn open(&mut self) -> StorageResult<()> {
        self.lookahead = None;
        self.source.open()?;
        self.state = CursorState::Open;
        Ok(())
    }

    fn has_next(&mut self) -> StorageResult<bool> {
        self.ensure_open()?;
        if self.lookahead.is_none() {
            self.lookahead = self.source.fetch_next()?;
        }
        Ok(self.lookahead.is_some())
    }

    fn next(&mut self) -> StorageResult<Tuple> {
        if !self.has_next()? {
            return Err(StorageError::NoSuchElement);
        }
        self.lookahead.take().ok_or(StorageError::NoSuchElement)
    }

    fn rewind(&mut self) -> StorageResult<()> {
        self.ensure_open()?;
        self.lookahead = None;
        self.source.rewind()
    }

    fn close(&mut self) {
        if self.state == CursorState::Open {
            self.source.close();
        }
        self.lookahead = None;
        self.state = CursorState::Closed;
    }

    fn schema(&self) -> &Arc<Schema> {
        self.source.schema()
    }
}

/// Drains an open iterator into a vector.
pub fn collect_tuples(it: &mut dyn OpIterator) -> StorageResult<Vec<Tuple>> {
    let mut tuples = Vec::new();
    while it.has_next()? {
        tuples.push(it.next()?);
    }
    Ok(tuples)
}

/// Walks a heap file page by page through the buffer pool.
///
/// Each page's live tuples are copied out under a read lock when the scan
/// reaches it, so the page is not held while the caller consumes them.
pub struct HeapFileScan {
    file: Arc<HeapFile>,
    tid: TransactionId,
    pool: BufferPool,
    next_page: u32,
    current: std::vec::IntoIter<Tuple>,
}

impl HeapFileScan {
    pub fn new(file: Arc<HeapFile>, tid: TransactionId, pool: BufferPool) -> Self {
        Self {
            file,
            tid,
            pool,
            next_page: 0,
            current: Vec::new().into_iter(),
        }
    }

    fn reset(&mut self) {
        self.next_page = 0;
        self.current = Vec::new().into_iter();
    }
}

impl TupleSource for HeapFileScan {
    fn schema(&self) -> &Arc<Schema> {
        self.file.schema()
    }

    fn open(&mut self) -> StorageResult<()> {
        self.reset();
        Ok(())
    }

    fn fetch_next(&mut self) -> StorageResult<Option<Tuple>> {
        loop {
            if let Some(tuple) = self.current.next() {
                return Ok(Some(tuple));
            }
            // Re-read the page count so pages appended mid-scan are visited
            if self.next_page >= self.file.num_pages()? {
                return Ok(None);
            }
            let page_id = PageId::new(self.file.id(), self.next_page);
            let page = self.pool.get_page(self.tid, page_id, Permission::ReadOnly)?;
            let tuples: Vec<Tuple> = page.read().iter().cloned().collect();
            self.next_page += 1;
            self.current = tuples.into_iter();
        }
    }

    fn rewind(&mut self) -> StorageResult<()> {
        self.reset();
        Ok(())
    }

    fn close(&mut self) {
        self.reset();
    }
}

/// A source over tuples already in memory.
pub struct TupleList {
    schema: Arc<Schema>,
    tuples: Vec<Tuple>,
    position: usize,
}

impl TupleList {
    pub fn new(schema: Arc<Schema>, tuples: Vec<Tuple>) -> Self {
        Self {
            schema,
            tuples,
            position: 0,
        }
    }

    pub fn cursor(schema: Arc<Schema>, tuples: Vec<Tuple>) -> Cursor<TupleList> {
        Cursor::new(Self::new(schema, tuples))
    }
}

impl TupleSource for TupleList {
    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    fn open(&mut self) -> StorageResult<()> {
        self.position = 0;
        Ok(())
    }

    fn fetch_next(&mut self) -> StorageResult<Option<Tuple>> {
        let tuple = self.tuples.get(self.position).cloned();
        if tuple.is_some() {
            self.position += 1;
        }
        Ok(tuple)
    }

    fn rewind(&mut self) -> StorageResult<()> {
        self.position = 0;
        Ok(())
    }
}
