use crate::access::heap::HeapFile;
use crate::access::scan::Cursor;
use crate::access::schema::Schema;
use crate::catalog::{Catalog, TableId};
use crate::executor::{ExecutionContext, SeqScan};
use crate::storage::buffer::{BufferPool, EvictionPolicy, DEFAULT_POOL_PAGES};
use crate::storage::disk::DEFAULT_PAGE_SIZE;
use crate::transaction::{TransactionId, TransactionIdGenerator};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Knobs fixed for the lifetime of a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Bytes per page in every heap file
    pub page_size: usize,
    /// Buffer pool capacity in pages
    pub pool_pages: usize,
    pub eviction: EvictionPolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_pages: DEFAULT_POOL_PAGES,
            eviction: EvictionPolicy::default(),
        }
    }
}

/// One independent database: a catalog, the buffer pool over it and a
/// transaction id source. Nothing is global, so several can coexist.
#[derive(Debug)]
pub struct Database {
    config: DatabaseConfig,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
    tids: TransactionIdGenerator,
}

impl Database {
    pub fn new(config: DatabaseConfig) -> Self {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = BufferPool::new(
            config.pool_pages,
            catalog.clone(),
            config.eviction.replacer(),
        );
        Self {
            config,
            catalog,
            buffer_pool,
            tids: TransactionIdGenerator::new(),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Opens (or creates) the heap file at `path` and registers it as `name`.
    pub fn open_table(&self, path: &Path, name: &str, schema: Schema) -> Result<TableId> {
        if schema.tuple_size() > self.config.page_size {
            bail!(
                "tuples of {} bytes do not fit in {} byte pages",
                schema.tuple_size(),
                self.config.page_size
            );
        }
        let file = HeapFile::open(path, Arc::new(schema), self.config.page_size)
            .with_context(|| format!("failed to open table file {}", path.display()))?;
        let table_id = file.id();
        self.catalog.add_table(Arc::new(file), name, None);
        Ok(table_id)
    }

    /// Registers every table declared in a schema file.
    pub fn load_schema(&self, path: &Path) -> Result<Vec<TableId>> {
        self.catalog.load_schema(path, self.config.page_size)
    }

    /// Starts a transaction. Transactions only name work; see
    /// [`BufferPool::transaction_complete`].
    pub fn begin(&self) -> TransactionId {
        self.tids.next()
    }

    pub fn context(&self, tid: TransactionId) -> ExecutionContext {
        ExecutionContext::new(self.buffer_pool.clone(), tid)
    }

    /// A sequential scan of `table_id` aliased by the table's name.
    pub fn scan(&self, tid: TransactionId, table_id: TableId) -> Result<Cursor<SeqScan>> {
        Ok(Cursor::new(SeqScan::by_name(&self.context(tid), table_id)?))
    }

    /// Writes every dirty cached page to disk.
    pub fn flush(&self) -> Result<()> {
        self.buffer_pool
            .flush_all_pages()
            .context("failed to flush buffer pool")
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(DatabaseConfig::default())
    }
}
