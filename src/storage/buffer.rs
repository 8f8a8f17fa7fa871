pub mod lru;
pub mod replacer;
pub mod sweep;

use crate::access::tuple::Tuple;
use crate::catalog::{Catalog, TableId};
use crate::concurrency::{LockManager, NoopLockManager, Permission};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{PageId, PageRef};
use crate::transaction::TransactionId;
use dashmap::DashMap;
use log::debug;
use lru::LruReplacer;
use parking_lot::{Mutex, RwLock};
use replacer::{Candidate, Replacer};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sweep::SweepReplacer;

/// Default number of pages the pool may cache.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Which replacer a pool is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Evict the first cached page found, flushing it if dirty.
    #[default]
    Sweep,
    Lru,
    /// LRU that never evicts dirty pages.
    LruNoSteal,
}

impl EvictionPolicy {
    pub fn replacer(&self) -> Box<dyn Replacer> {
        match self {
            EvictionPolicy::Sweep => Box::new(SweepReplacer::new()),
            EvictionPolicy::Lru => Box::new(LruReplacer::new()),
            EvictionPolicy::LruNoSteal => Box::new(LruReplacer::no_steal()),
        }
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sweep" => Ok(EvictionPolicy::Sweep),
            "lru" => Ok(EvictionPolicy::Lru),
            "lru-no-steal" => Ok(EvictionPolicy::LruNoSteal),
            other => Err(format!(
                "unknown eviction policy {:?} (expected sweep, lru or lru-no-steal)",
                other
            )),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EvictionPolicy::Sweep => "sweep",
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::LruNoSteal => "lru-no-steal",
        };
        f.write_str(s)
    }
}

/// Bounded cache of heap pages shared by every operator.
///
/// A cached page is handed out by identity: all callers asking for the same
/// page id get the same `PageRef` until the page is evicted or discarded.
/// Admission, eviction, flushing and discarding are serialized by one latch,
/// so the number of cached pages never exceeds the capacity.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    pages: DashMap<PageId, PageRef>,
    catalog: Arc<Catalog>,
    replacer: Mutex<Box<dyn Replacer>>,
    lock_manager: Box<dyn LockManager>,
    latch: Mutex<()>,
    capacity: usize,
    evictions: AtomicU64,
}

impl BufferPool {
    pub fn new(capacity: usize, catalog: Arc<Catalog>, replacer: Box<dyn Replacer>) -> Self {
        Self::with_lock_manager(capacity, catalog, replacer, Box::new(NoopLockManager))
    }

    pub fn with_lock_manager(
        capacity: usize,
        catalog: Arc<Catalog>,
        replacer: Box<dyn Replacer>,
        lock_manager: Box<dyn LockManager>,
    ) -> Self {
        Self {
            inner: Arc::new(BufferPoolInner {
                pages: DashMap::with_capacity(capacity),
                catalog,
                replacer: Mutex::new(replacer),
                lock_manager,
                latch: Mutex::new(()),
                capacity: capacity.max(1),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of pages currently cached.
    pub fn len(&self) -> usize {
        self.inner.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pages.is_empty()
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.pages.contains_key(&page_id)
    }

    pub fn eviction_count(&self) -> u64 {
        self.inner.evictions.load(Ordering::Relaxed)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.inner.catalog
    }

    /// Returns the cached page, reading it through its table's file on a
    /// miss. Evicts one page first if the cache is full.
    pub fn get_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permission,
    ) -> StorageResult<PageRef> {
        self.inner.lock_manager.acquire(tid, page_id, perm)?;

        if let Some(page) = self.cached(page_id) {
            self.inner.replacer.lock().record_access(page_id);
            return Ok(page);
        }

        let _latch = self.inner.latch.lock();
        // Another caller may have admitted it while we waited
        if let Some(page) = self.cached(page_id) {
            self.inner.replacer.lock().record_access(page_id);
            return Ok(page);
        }

        if self.inner.pages.len() >= self.inner.capacity {
            self.evict_locked()?;
        }

        let file = self.inner.catalog.database_file(page_id.table_id)?;
        let page = Arc::new(RwLock::new(file.read_page(page_id)?));
        self.inner.pages.insert(page_id, page.clone());
        self.inner.replacer.lock().record_access(page_id);
        debug!("admitted page {} for {} ({:?})", page_id, tid, perm);
        Ok(page)
    }

    /// Places `page` in the cache under its own id, replacing any cached
    /// instance. Evicts first if the id is not cached and the cache is full.
    pub fn install_page(&self, page: PageRef) -> StorageResult<()> {
        let page_id = page.read().page_id();
        let _latch = self.inner.latch.lock();
        if !self.inner.pages.contains_key(&page_id)
            && self.inner.pages.len() >= self.inner.capacity
        {
            self.evict_locked()?;
        }
        self.inner.pages.insert(page_id, page);
        self.inner.replacer.lock().record_access(page_id);
        Ok(())
    }

    /// Inserts `tuple` into table `table_id` on behalf of `tid`. On success
    /// the tuple carries its new record id and every page it touched is
    /// cached and dirty.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> StorageResult<()> {
        let file = self.inner.catalog.database_file(table_id)?;
        let dirtied = file.insert_tuple(tid, tuple, self)?;
        self.adopt_dirty_pages(tid, dirtied)
    }

    /// Deletes `tuple` from the table its record id names.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> StorageResult<()> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| StorageError::TupleNotFound("tuple has no record id".to_string()))?;
        let file = self
            .inner
            .catalog
            .database_file(record_id.page_id.table_id)?;
        let dirtied = file.delete_tuple(tid, tuple, self)?;
        self.adopt_dirty_pages(tid, dirtied)
    }

    fn adopt_dirty_pages(&self, tid: TransactionId, pages: Vec<PageRef>) -> StorageResult<()> {
        for page in pages {
            page.write().mark_dirty(true, tid);
            self.install_page(page)?;
        }
        Ok(())
    }

    /// Writes the cached page to disk if it is dirty and marks it clean.
    /// Pages that are not cached are ignored.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<()> {
        let _latch = self.inner.latch.lock();
        self.flush_locked(page_id)
    }

    /// Flushes every dirty cached page. Pages stay cached.
    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let _latch = self.inner.latch.lock();
        let page_ids: Vec<PageId> = self.inner.pages.iter().map(|e| *e.key()).collect();
        for page_id in page_ids {
            self.flush_locked(page_id)?;
        }
        Ok(())
    }

    /// Placeholder for flushing the pages `tid` dirtied. There is no
    /// per-transaction page tracking, so cached pages are left as they are.
    pub fn flush_pages(&self, tid: TransactionId) -> StorageResult<()> {
        debug!("flush_pages for {} is a no-op", tid);
        Ok(())
    }

    /// Drops a page from the cache without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        let _latch = self.inner.latch.lock();
        if self.inner.pages.remove(&page_id).is_some() {
            self.inner.replacer.lock().remove(page_id);
            debug!("discarded page {}", page_id);
        }
    }

    /// Evicts one page chosen by the replacer, flushing it first if dirty.
    pub fn evict_page(&self) -> StorageResult<()> {
        let _latch = self.inner.latch.lock();
        self.evict_locked()
    }

    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.inner.lock_manager.release(tid, page_id);
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.inner.lock_manager.holds_lock(tid, page_id)
    }

    /// Ends `tid` by releasing whatever the lock seam holds for it. Commit
    /// and abort leave cached pages untouched: dirty pages stay dirty until
    /// flushed or evicted.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> StorageResult<()> {
        self.inner.lock_manager.release_all(tid);
        debug!("{} complete (commit: {})", tid, commit);
        Ok(())
    }

    fn cached(&self, page_id: PageId) -> Option<PageRef> {
        self.inner.pages.get(&page_id).map(|e| e.value().clone())
    }

    fn flush_locked(&self, page_id: PageId) -> StorageResult<()> {
        let Some(page) = self.cached(page_id) else {
            return Ok(());
        };
        let mut page = page.write();
        let Some(tid) = page.dirtied_by() else {
            return Ok(());
        };
        let wrap = |e: StorageError| StorageError::FlushFailed {
            page_id,
            source: Box::new(e),
        };
        let file = self
            .inner
            .catalog
            .database_file(page_id.table_id)
            .map_err(wrap)?;
        file.write_page(&page).map_err(wrap)?;
        page.mark_dirty(false, tid);
        debug!("flushed page {} dirtied by {}", page_id, tid);
        Ok(())
    }

    fn evict_locked(&self) -> StorageResult<()> {
        let candidates: Vec<Candidate> = self
            .inner
            .pages
            .iter()
            .map(|e| Candidate {
                page_id: *e.key(),
                dirty: e.value().read().is_dirty(),
            })
            .collect();
        if candidates.is_empty() {
            return Err(StorageError::EvictionFailed {
                reason: "buffer pool is empty".to_string(),
            });
        }

        let victim = self
            .inner
            .replacer
            .lock()
            .victim(&candidates)
            .ok_or_else(|| StorageError::EvictionFailed {
                reason: format!("none of {} cached pages may be evicted", candidates.len()),
            })?;

        self.flush_locked(victim)
            .map_err(|e| StorageError::EvictionFailed {
                reason: e.to_string(),
            })?;
        self.inner.pages.remove(&victim);
        self.inner.replacer.lock().remove(victim);
        self.inner.evictions.fetch_add(1, Ordering::Relaxed);
        debug!("evicted page {}", victim);
        Ok(())
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("capacity", &self.inner.capacity)
            .field("cached", &self.inner.pages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::heap::HeapFile;
    use crate::access::schema::Schema;
    use crate::access::value::{DataType, Value};
    use crate::storage::disk::DEFAULT_PAGE_SIZE;
    use crate::storage::page::HeapPage;
    use anyhow::Result;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        file: Arc<HeapFile>,
        catalog: Arc<Catalog>,
        schema: Arc<Schema>,
    }

    /// A table file with `pages` pages, each holding one tuple `(page_no)`.
    fn fixture(pages: u32) -> Result<Fixture> {
        let dir = tempfile::tempdir()?;
        let schema = Arc::new(Schema::new(&[DataType::Int32], &[Some("n")])?);
        let file = Arc::new(HeapFile::open(
            &dir.path().join("t.dat"),
            schema.clone(),
            DEFAULT_PAGE_SIZE,
        )?);
        for page_no in 0..pages {
            let mut page = HeapPage::new_empty(
                PageId::new(file.id(), page_no),
                schema.clone(),
                DEFAULT_PAGE_SIZE,
            )?;
            let mut tuple = Tuple::from_values(schema.clone(), vec![Value::Int32(page_no as i32)])?;
            page.insert_tuple(&mut tuple)?;
            file.write_page(&page)?;
        }
        let catalog = Arc::new(Catalog::new());
        catalog.add_table(file.clone(), "t", None);
        Ok(Fixture {
            _dir: dir,
            file,
            catalog,
            schema,
        })
    }

    fn pool(fx: &Fixture, capacity: usize, policy: EvictionPolicy) -> BufferPool {
        BufferPool::new(capacity, fx.catalog.clone(), policy.replacer())
    }

    const TID: TransactionId = TransactionId(1);

    #[test]
    fn test_get_page_shares_identity() -> Result<()> {
        let fx = fixture(2)?;
        let pool = pool(&fx, 4, EvictionPolicy::Sweep);
        let pid = PageId::new(fx.file.id(), 1);

        let a = pool.get_page(TID, pid, Permission::ReadOnly)?;
        let b = pool.get_page(TID, pid, Permission::ReadWrite)?;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.read().num_tuples(), 1);
        assert_eq!(pool.len(), 1);
        Ok(())
    }

    #[test]
    fn test_get_page_beyond_file_is_not_found() -> Result<()> {
        let fx = fixture(1)?;
        let pool = pool(&fx, 4, EvictionPolicy::Sweep);
        let err = pool
            .get_page(TID, PageId::new(fx.file.id(), 1), Permission::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, StorageError::PageNotFound(_)));
        assert!(pool.is_empty());
        Ok(())
    }

    #[test]
    fn test_unknown_table() -> Result<()> {
        let fx = fixture(1)?;
        let pool = pool(&fx, 4, EvictionPolicy::Sweep);
        let err = pool
            .get_page(TID, PageId::new(fx.file.id().wrapping_add(1), 0), Permission::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, StorageError::TableNotFound(_)));
        Ok(())
    }

    #[test]
    fn test_cache_never_exceeds_capacity() -> Result<()> {
        let fx = fixture(5)?;
        let pool = pool(&fx, 2, EvictionPolicy::Sweep);
        for page_no in 0..5 {
            pool.get_page(TID, PageId::new(fx.file.id(), page_no), Permission::ReadOnly)?;
            assert!(pool.len() <= 2);
        }
        assert_eq!(pool.eviction_count(), 3);
        Ok(())
    }

    #[test]
    fn test_lru_evicts_least_recent() -> Result<()> {
        let fx = fixture(3)?;
        let pool = pool(&fx, 2, EvictionPolicy::Lru);
        let p0 = PageId::new(fx.file.id(), 0);
        let p1 = PageId::new(fx.file.id(), 1);
        let p2 = PageId::new(fx.file.id(), 2);

        pool.get_page(TID, p0, Permission::ReadOnly)?;
        pool.get_page(TID, p1, Permission::ReadOnly)?;
        pool.get_page(TID, p0, Permission::ReadOnly)?;
        pool.get_page(TID, p2, Permission::ReadOnly)?;

        assert!(pool.contains(p0));
        assert!(!pool.contains(p1));
        assert!(pool.contains(p2));
        Ok(())
    }

    #[test]
    fn test_evicting_dirty_page_flushes_it() -> Result<()> {
        let fx = fixture(2)?;
        let pool = pool(&fx, 1, EvictionPolicy::Sweep);
        let p0 = PageId::new(fx.file.id(), 0);

        let page = pool.get_page(TID, p0, Permission::ReadWrite)?;
        {
            let mut guard = page.write();
            let mut tuple = Tuple::from_values(fx.schema.clone(), vec![Value::Int32(42)])?;
            guard.insert_tuple(&mut tuple)?;
            guard.mark_dirty(true, TID);
        }

        pool.get_page(TID, PageId::new(fx.file.id(), 1), Permission::ReadOnly)?;
        assert!(!pool.contains(p0));

        let on_disk = fx.file.read_page(p0)?;
        assert_eq!(on_disk.num_tuples(), 2);
        assert!(!page.read().is_dirty());
        Ok(())
    }

    #[test]
    fn test_no_steal_refuses_to_evict_dirty_pages() -> Result<()> {
        let fx = fixture(2)?;
        let pool = pool(&fx, 1, EvictionPolicy::LruNoSteal);
        let page = pool.get_page(TID, PageId::new(fx.file.id(), 0), Permission::ReadWrite)?;
        page.write().mark_dirty(true, TID);

        let err = pool
            .get_page(TID, PageId::new(fx.file.id(), 1), Permission::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, StorageError::EvictionFailed { .. }));
        assert_eq!(pool.len(), 1);
        Ok(())
    }

    #[test]
    fn test_evict_empty_pool_fails() -> Result<()> {
        let fx = fixture(0)?;
        let pool = pool(&fx, 1, EvictionPolicy::Sweep);
        assert!(matches!(
            pool.evict_page(),
            Err(StorageError::EvictionFailed { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_flush_page_clears_dirty_flag() -> Result<()> {
        let fx = fixture(1)?;
        let pool = pool(&fx, 2, EvictionPolicy::Sweep);
        let pid = PageId::new(fx.file.id(), 0);
        let page = pool.get_page(TID, pid, Permission::ReadWrite)?;
        page.write().mark_dirty(true, TID);

        pool.flush_page(pid)?;
        assert!(!page.read().is_dirty());
        assert!(pool.contains(pid));

        // Not cached, nothing to do
        pool.flush_page(PageId::new(fx.file.id(), 7))?;
        Ok(())
    }

    #[test]
    fn test_discard_drops_unwritten_changes() -> Result<()> {
        let fx = fixture(1)?;
        let pool = pool(&fx, 2, EvictionPolicy::Sweep);
        let pid = PageId::new(fx.file.id(), 0);
        let page = pool.get_page(TID, pid, Permission::ReadWrite)?;
        {
            let mut guard = page.write();
            let mut tuple = Tuple::from_values(fx.schema.clone(), vec![Value::Int32(9)])?;
            guard.insert_tuple(&mut tuple)?;
            guard.mark_dirty(true, TID);
        }

        pool.discard_page(pid);
        assert!(!pool.contains(pid));
        let reread = pool.get_page(TID, pid, Permission::ReadOnly)?;
        assert!(!Arc::ptr_eq(&page, &reread));
        assert_eq!(reread.read().num_tuples(), 1);
        Ok(())
    }

    #[test]
    fn test_insert_and_delete_mark_pages_dirty() -> Result<()> {
        let fx = fixture(1)?;
        let pool = pool(&fx, 4, EvictionPolicy::Sweep);

        let mut tuple = Tuple::from_values(fx.schema.clone(), vec![Value::Int32(5)])?;
        pool.insert_tuple(TID, fx.file.id(), &mut tuple)?;
        let rid = tuple.record_id().expect("record id assigned");
        assert_eq!(rid.page_id.page_no, 0);
        assert_eq!(rid.slot_id, 1);

        let page = pool.get_page(TID, rid.page_id, Permission::ReadOnly)?;
        assert_eq!(page.read().dirtied_by(), Some(TID));

        pool.flush_all_pages()?;
        assert!(!page.read().is_dirty());

        pool.delete_tuple(TID, &mut tuple)?;
        assert!(tuple.record_id().is_none());
        assert!(page.read().is_dirty());
        assert!(pool.delete_tuple(TID, &mut tuple).is_err());
        Ok(())
    }

    #[test]
    fn test_transaction_complete_leaves_pages_cached() -> Result<()> {
        let fx = fixture(1)?;
        let pool = pool(&fx, 4, EvictionPolicy::Sweep);
        let first = TransactionId(1);
        let second = TransactionId(2);

        let mut a = Tuple::from_values(fx.schema.clone(), vec![Value::Int32(1)])?;
        pool.insert_tuple(first, fx.file.id(), &mut a)?;
        pool.flush_all_pages()?;
        let mut b = Tuple::from_values(fx.schema.clone(), vec![Value::Int32(2)])?;
        pool.insert_tuple(second, fx.file.id(), &mut b)?;
        let pid = b.record_id().expect("record id assigned").page_id;

        pool.flush_pages(second)?;
        pool.transaction_complete(second, false)?;
        let page = pool.get_page(second, pid, Permission::ReadOnly)?;
        assert!(pool.contains(pid));
        assert_eq!(page.read().dirtied_by(), Some(second));
        assert_eq!(page.read().num_tuples(), 3);
        assert_eq!(fx.file.read_page(pid)?.num_tuples(), 2);

        pool.transaction_complete(second, true)?;
        assert!(Arc::ptr_eq(&page, &pool.get_page(second, pid, Permission::ReadOnly)?));
        assert_eq!(page.read().dirtied_by(), Some(second));
        assert_eq!(fx.file.read_page(pid)?.num_tuples(), 2);
        Ok(())
    }

    #[test]
    fn test_eviction_policy_parsing() {
        assert_eq!("LRU".parse::<EvictionPolicy>(), Ok(EvictionPolicy::Lru));
        assert_eq!(
            "lru-no-steal".parse::<EvictionPolicy>(),
            Ok(EvictionPolicy::LruNoSteal)
        );
        assert!("clock".parse::<EvictionPolicy>().is_err());
        assert_eq!(EvictionPolicy::default().to_string(), "sweep");
    }
}
