//! Block index (component H, SPEC_FULL.md §4.4, §9).
//!
//! A per-inode, runtime-only ordered map from file offset to block
//! descriptor location. Grounded on the design note in SPEC_FULL.md §9: any
//! balanced structure satisfying `find-less-equal` in O(log N) is
//! acceptable, so this uses a plain `BTreeMap`, whose `range` method gives
//! `find-less-equal` for free via `range(..=offset).next_back()`. It is pure
//! cache: wrong or missing entries are never a correctness problem, only a
//! performance one, since it is always rebuildable from the persistent
//! block-array chain.

use std::collections::BTreeMap;

use crate::fs::block::BlockLocator;

#[derive(Default)]
pub struct BlockIndex {
    by_offset: BTreeMap<u64, BlockLocator>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, offset: u64, block: BlockLocator) {
        self.by_offset.insert(offset, block);
    }

    pub fn remove(&mut self, offset: u64) {
        self.by_offset.remove(&offset);
    }

    /// Returns the descriptor covering the largest offset `<= offset`, if
    /// any — the operation the read/write engine uses to reposition its
    /// cursor by absolute offset (SPEC_FULL.md §4.5).
    pub fn find_less_equal(&self, offset: u64) -> Option<(u64, BlockLocator)> {
        self.by_offset
            .range(..=offset)
            .next_back()
            .map(|(&off, &loc)| (off, loc))
    }

    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_offset.clear();
    }
}
