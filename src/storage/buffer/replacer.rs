use crate::storage::page::PageId;
use std::fmt::Debug;

/// A cached page offered to the replacer as a possible victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub page_id: PageId,
    pub dirty: bool,
}

/// Eviction policy of the buffer pool.
pub trait Replacer: Send + Sync + Debug {
    /// Called whenever a page is admitted or served from the cache.
    fn record_access(&mut self, page_id: PageId);

    /// Called when a page leaves the cache.
    fn remove(&mut self, page_id: PageId);

    /// Picks the page to evict among `candidates`. Returns None if no
    /// candidate may be evicted.
    fn victim(&mut self, candidates: &[Candidate]) -> Option<PageId>;
}
