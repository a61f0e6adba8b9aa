//! Block array (component E, SPEC_FULL.md §3, §4.5, §6).
//!
//! A regular file's content lives in a linked chain of block-array pages;
//! each page holds a fixed-capacity array of block descriptors. Descriptors
//! are chained in file-offset order via `next_block`, independent of which
//! page happens to hold them (SPEC_FULL.md §3). Since this crate's arena
//! hands out whole-object refs rather than sub-object byte offsets, a
//! descriptor's location is addressed as a `(page, index-within-page)` pair
//! — [`BlockLocator`] — instead of a raw object-ref to the descriptor
//! itself; the descriptor stays embedded in its page exactly as the
//! `blocks[length]` on-disk layout describes.

use array_macro::array;

use crate::arena::{ArenaObject, ObjectKind, ObjectRef};
use crate::param::BLOCKS_PER_PAGE;

/// Locates one block descriptor: the page it lives in, plus its slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLocator {
    pub page: ObjectRef<BlockArrayPage>,
    pub index: usize,
}

/// A single block descriptor. `None` in the page's slot array plays the
/// role of the source's `size == 0` free-slot sentinel.
#[derive(Debug, Clone)]
pub struct BlockDescriptor {
    /// Next descriptor in file-offset order, possibly in a different page.
    pub next_block: Option<BlockLocator>,
    /// The block's persistent data region.
    pub data_ref: ObjectRef<Vec<u8>>,
    /// Bytes actually filled (for the final descriptor this is
    /// `last_block_fill`; earlier descriptors are always full).
    pub size: u32,
    /// Starting file offset this descriptor covers.
    pub offset: u64,
    pub flags: u32,
}

#[derive(Clone)]
pub struct BlockArrayPage {
    pub next: Option<ObjectRef<BlockArrayPage>>,
    pub slots: [Option<BlockDescriptor>; BLOCKS_PER_PAGE],
}

impl BlockArrayPage {
    pub fn empty() -> Self {
        Self {
            next: None,
            slots: array![_ => None; BLOCKS_PER_PAGE],
        }
    }
}

impl Default for BlockArrayPage {
    fn default() -> Self {
        Self::empty()
    }
}

impl ArenaObject for BlockArrayPage {
    const KIND: ObjectKind = ObjectKind::BlockArrayPage;
}

impl ArenaObject for Vec<u8> {
    const KIND: ObjectKind = ObjectKind::BlockData;

    /// Charges the buffer's actual length rather than `Vec<u8>`'s own stack
    /// size, so the arena's capacity accounting reflects the allocation a
    /// block-data request actually asked for.
    fn byte_size(&self) -> u64 {
        self.len() as u64
    }
}
