use crate::access::scan::{Cursor, HeapFileScan};
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::catalog::TableId;
use crate::concurrency::Permission;
use crate::storage::buffer::BufferPool;
use crate::storage::disk::PageManager;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{HeapPage, PageId, PageRef};
use crate::transaction::TransactionId;
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;

/// A table stored as an unordered sequence of fixed-size heap pages in one
/// file. Page `n` lives at byte offset `n * page_size`.
///
/// Reads during inserts, deletes and scans go through the buffer pool; only
/// [`HeapFile::read_page`] and [`HeapFile::write_page`] touch the file directly.
#[derive(Debug)]
pub struct HeapFile {
    id: TableId,
    schema: Arc<Schema>,
    pages: PageManager,
    /// Held while the file grows by a page
    append_latch: Mutex<()>,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating it empty if absent. The table
    /// id is derived from the canonical path, so opening the same file twice
    /// yields the same id.
    pub fn open(path: &Path, schema: Arc<Schema>, page_size: usize) -> StorageResult<Self> {
        let pages = PageManager::open(path, page_size)?;
        let canonical = pages.path().canonicalize()?;
        let id = table_id_for_path(&canonical);
        debug!("opened heap file {} as table {}", canonical.display(), id);
        Ok(Self {
            id,
            schema,
            pages,
            append_latch: Mutex::new(()),
        })
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        self.pages.path()
    }

    pub fn page_size(&self) -> usize {
        self.pages.page_size()
    }

    /// Number of pages in the file. A partial trailing page counts as a page.
    pub fn num_pages(&self) -> StorageResult<u32> {
        self.pages.num_pages()
    }

    /// Reads a page straight from disk, bypassing the buffer pool.
    pub fn read_page(&self, page_id: PageId) -> StorageResult<HeapPage> {
        if page_id.table_id != self.id {
            return Err(StorageError::PageNotFound(page_id));
        }
        let data = self
            .pages
            .read_page(page_id.page_no)?
            .ok_or(StorageError::PageNotFound(page_id))?;
        HeapPage::from_bytes(page_id, self.schema.clone(), &data)
    }

    /// Writes a page image at its page number, extending the file if needed.
    pub fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        let page_id = page.page_id();
        if page_id.table_id != self.id {
            return Err(StorageError::PageNotFound(page_id));
        }
        self.pages.write_page(page_id.page_no, &page.to_bytes())
    }

    /// Stores `tuple` in the first page with a free slot, appending a new
    /// page when every existing page is full. Returns the pages modified.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: &mut Tuple,
        pool: &BufferPool,
    ) -> StorageResult<Vec<PageRef>> {
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(StorageError::SchemaMismatch(format!(
                "tuple schema [{}] does not match table schema [{}]",
                tuple.schema(),
                self.schema
            )));
        }

        let mut scanned = 0;
        loop {
            let num_pages = self.num_pages()?;
            for page_no in scanned..num_pages {
                let page =
                    pool.get_page(tid, PageId::new(self.id, page_no), Permission::ReadWrite)?;
                let inserted = {
                    let mut guard = page.write();
                    if guard.num_empty_slots() > 0 {
                        guard.insert_tuple(tuple)?;
                        // Dirty under the same guard so an eviction racing us writes it
                        guard.mark_dirty(true, tid);
                        true
                    } else {
                        false
                    }
                };
                if inserted {
                    return Ok(vec![page]);
                }
            }
            scanned = num_pages;

            let _append = self.append_latch.lock();
            if self.num_pages()? != num_pages {
                // Someone else appended while we scanned; try their page first
                continue;
            }
            let page_id = PageId::new(self.id, num_pages);
            let mut page = HeapPage::new_empty(page_id, self.schema.clone(), self.page_size())?;
            // The caller's tuple only learns its record id once the page is
            // both cached and on disk
            let mut staged = tuple.clone();
            let record_id = page.insert_tuple(&mut staged)?;
            page.mark_dirty(true, tid);
            let page = Arc::new(RwLock::new(page));

            // Cache before the file grows, so nobody reads the new page from disk
            // and caches a second instance of it
            pool.install_page(page.clone())?;
            let image = page.read().to_bytes();
            if let Err(e) = self.pages.write_page(num_pages, &image) {
                pool.discard_page(page_id);
                return Err(e);
            }
            tuple.set_record_id(Some(record_id));
            debug!("table {} grew to {} pages", self.id, num_pages + 1);
            return Ok(vec![page]);
        }
    }

    /// Removes `tuple` from the slot its record id names. Returns the pages
    /// modified.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &mut Tuple,
        pool: &BufferPool,
    ) -> StorageResult<Vec<PageRef>> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| StorageError::TupleNotFound("tuple has no record id".to_string()))?;
        if record_id.page_id.table_id != self.id {
            return Err(StorageError::TupleNotFound(format!(
                "{} is not in table {}",
                record_id, self.id
            )));
        }
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(StorageError::SchemaMismatch(format!(
                "tuple schema [{}] does not match table schema [{}]",
                tuple.schema(),
                self.schema
            )));
        }

        let page = pool.get_page(tid, record_id.page_id, Permission::ReadWrite)?;
        {
            let mut guard = page.write();
            guard.delete_tuple(tuple)?;
            guard.mark_dirty(true, tid);
        }
        Ok(vec![page])
    }

    /// A cursor over every stored tuple, page by page in slot order.
    pub fn iterator(
        self: &Arc<Self>,
        tid: TransactionId,
        pool: &BufferPool,
    ) -> Cursor<HeapFileScan> {
        Cursor::new(HeapFileScan::new(self.clone(), tid, pool.clone()))
    }
}

/// 32-bit FNV-1a hash of the path bytes.
fn table_id_for_path(path: &Path) -> TableId {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    path.to_string_lossy()
        .as_bytes()
        .iter()
        .fold(OFFSET_BASIS, |hash, &b| (hash ^ b as u32).wrapping_mul(PRIME))
}
