use super::replacer::{Candidate, Replacer};
use crate::storage::page::PageId;

/// Evicts whichever cached page the sweep meets first, dirty or clean.
/// Keeps no access history.
#[derive(Debug, Default)]
pub struct SweepReplacer;

impl SweepReplacer {
    pub fn new() -> Self {
        Self
    }
}

impl Replacer for SweepReplacer {
    fn record_access(&mut self, _page_id: PageId) {}

    fn remove(&mut self, _page_id: PageId) {}

    fn victim(&mut self, candidates: &[Candidate]) -> Option<PageId> {
        candidates.first().map(|c| c.page_id)
    }
}
