//! Page lock interface.

use crate::storage::error::StorageResult;
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::fmt::Debug;

/// Access requested when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// Per-page locking keyed by transaction.
pub trait LockManager: Send + Sync + Debug {
    /// Blocks until `tid` holds a lock on `page_id` compatible with `perm`.
    fn acquire(&self, tid: TransactionId, page_id: PageId, perm: Permission) -> StorageResult<()>;

    fn release(&self, tid: TransactionId, page_id: PageId);

    fn release_all(&self, tid: TransactionId);

    fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool;
}

/// Grants every request and records nothing.
#[derive(Debug, Default)]
pub struct NoopLockManager;

impl LockManager for NoopLockManager {
    fn acquire(
        &self,
        _tid: TransactionId,
        _page_id: PageId,
        _perm: Permission,
    ) -> StorageResult<()> {
        Ok(())
    }

    fn release(&self, _tid: TransactionId, _page_id: PageId) {}

    fn release_all(&self, _tid: TransactionId) {}

    fn holds_lock(&self, _tid: TransactionId, _page_id: PageId) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_lock_manager() {
        let locks = NoopLockManager;
        let tid = TransactionId::new(1);
        let pid = PageId::new(1, 0);

        assert!(locks.acquire(tid, pid, Permission::ReadWrite).is_ok());
        assert!(!locks.holds_lock(tid, pid));
        locks.release(tid, pid);
        locks.release_all(tid);
    }
}
