use super::replacer::{Candidate, Replacer};
use crate::storage::page::PageId;
use std::collections::{HashMap, VecDeque};

/// Least-recently-used eviction. With `no_steal` set, dirty pages are never
/// chosen, so uncommitted changes only reach disk through an explicit flush.
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Least recently used at the front
    lru_list: VecDeque<PageId>,
    no_steal: bool,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_steal() -> Self {
        Self {
            lru_list: VecDeque::new(),
            no_steal: true,
        }
    }

    pub fn size(&self) -> usize {
        self.lru_list.len()
    }

    fn evictable(&self, candidate: &Candidate) -> bool {
        !(self.no_steal && candidate.dirty)
    }
}

impl Replacer for LruReplacer {
    fn record_access(&mut self, page_id: PageId) {
        self.remove(page_id);
        self.lru_list.push_back(page_id);
    }

    fn remove(&mut self, page_id: PageId) {
        if let Some(idx) = self.lru_list.iter().position(|&p| p == page_id) {
            self.lru_list.remove(idx);
        }
    }

    fn victim(&mut self, candidates: &[Candidate]) -> Option<PageId> {
        let by_id: HashMap<PageId, &Candidate> =
            candidates.iter().map(|c| (c.page_id, c)).collect();

        let tracked = self
            .lru_list
            .iter()
            .find(|p| by_id.get(p).is_some_and(|c| self.evictable(c)))
            .copied();

        // Pages the replacer never saw count as least recently used
        tracked.or_else(|| {
            candidates
                .iter()
                .find(|c| !self.lru_list.contains(&c.page_id) && self.evictable(c))
                .map(|c| c.page_id)
        })
    }
}
