//! Read/write engine (component I, SPEC_FULL.md §4.5).
//!
//! Grounded on the source's `data.c`: extend-on-write with a cached cursor,
//! zero-fill of holes, and size-class block allocation. The cursor here is
//! carried on [`crate::vnode::VnodeState::free_cursor`] rather than
//! reproduced as a second field, since both "where do I resume scanning for
//! a free slot" and "where did I last read/write" reduce to the same
//! `(page, index, global offset)` triple once a [`crate::block_index::BlockIndex`]
//! exists to jump straight to an arbitrary offset.

use crate::arena::{HeapArena, ObjectRef, Transaction};
use crate::block_index::BlockIndex;
use crate::error::{PmemfsError, Result};
use crate::fs::block::{BlockArrayPage, BlockDescriptor, BlockLocator};
use crate::fs::inode::{DiskInode, InodeKind, Timestamp};
use crate::param::{
    AUTO_BLOCK_SIZES, AUTO_BLOCK_THRESHOLDS, DEFAULT_RELATIME_WINDOW_SECS, MAX_BLOCK_SIZE,
    MAX_EXPLICIT_BLOCK_SIZE, MIN_BLOCK_SIZE, MIN_EXPLICIT_BLOCK_SIZE,
};

/// The `block_size` knob described in SPEC_FULL.md §4.5.
#[derive(Debug, Clone, Copy)]
pub enum BlockSizePolicy {
    Auto,
    NextPowerOfTwo,
    Explicit(u64),
}

impl BlockSizePolicy {
    /// Picks the size of the next block to allocate given `remaining`
    /// bytes still to be written.
    pub fn size_for(&self, remaining: u64) -> u64 {
        match self {
            BlockSizePolicy::Auto => {
                let class = AUTO_BLOCK_THRESHOLDS
                    .iter()
                    .position(|&t| remaining <= t)
                    .unwrap_or(AUTO_BLOCK_THRESHOLDS.len());
                AUTO_BLOCK_SIZES[class]
            }
            BlockSizePolicy::NextPowerOfTwo => {
                remaining.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE).next_power_of_two()
            }
            BlockSizePolicy::Explicit(n) => (*n).clamp(MIN_EXPLICIT_BLOCK_SIZE, MAX_EXPLICIT_BLOCK_SIZE),
        }
    }
}

#[cfg(test)]
mod policy_tests {
    use super::*;

    #[test]
    fn explicit_mode_allocates_exact_size_within_range() {
        assert_eq!(BlockSizePolicy::Explicit(100).size_for(1), 100);
        assert_eq!(BlockSizePolicy::Explicit(5_000_000).size_for(1), 5_000_000);
    }

    #[test]
    fn explicit_mode_clamps_outside_range() {
        assert_eq!(BlockSizePolicy::Explicit(0).size_for(1), MIN_EXPLICIT_BLOCK_SIZE);
        assert_eq!(BlockSizePolicy::Explicit(1).size_for(1), MIN_EXPLICIT_BLOCK_SIZE);
        assert_eq!(
            BlockSizePolicy::Explicit(u64::MAX).size_for(1),
            MAX_EXPLICIT_BLOCK_SIZE
        );
    }
}

/// Builds (or rebuilds) a block index by walking the inode's persistent
/// block-array chain once (SPEC_FULL.md §4.4).
pub fn build_block_index(arena: &HeapArena, head: Option<ObjectRef<BlockArrayPage>>) -> Result<BlockIndex> {
    let mut index = BlockIndex::new();
    let mut page = head;
    while let Some(p) = page {
        let (entries, next): (Vec<(u64, BlockLocator)>, _) = arena.with(p, |bp: &BlockArrayPage| {
            let entries = bp
                .slots
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| {
                    slot.as_ref().map(|d| {
                        (
                            d.offset,
                            BlockLocator {
                                page: p,
                                index: i,
                            },
                        )
                    })
                })
                .collect();
            (entries, bp.next)
        })?;
        for (offset, loc) in entries {
            index.insert(offset, loc);
        }
        page = next;
    }
    Ok(index)
}

/// Locates the first descriptor slot with `size == 0` starting from `hint`
/// (or the chain head if none), appending a fresh page when the chain is
/// exhausted (SPEC_FULL.md §4.5 "Free-slot reuse").
fn find_or_extend_free_slot(
    tx: &mut Transaction<'_>,
    head: ObjectRef<BlockArrayPage>,
    hint: Option<BlockLocator>,
) -> Result<BlockLocator> {
    let mut page = hint.map(|h| h.page).unwrap_or(head);
    loop {
        let (slot, next) = tx.with(page, |bp: &BlockArrayPage| {
            (bp.slots.iter().position(|s| s.is_none()), bp.next)
        })?;
        if let Some(index) = slot {
            return Ok(BlockLocator { page, index });
        }
        match next {
            Some(next_page) => page = next_page,
            None => {
                let new_page = tx.alloc(BlockArrayPage::empty())?;
                tx.with_mut(page, move |bp: &mut BlockArrayPage| {
                    bp.next = Some(new_page);
                })?;
                page = new_page;
            }
        }
    }
}

/// Allocates a fresh block of persistent data sized by `policy` and installs
/// it at `loc`, returning the descriptor's data ref and size.
fn allocate_block(
    tx: &mut Transaction<'_>,
    loc: BlockLocator,
    offset: u64,
    policy: BlockSizePolicy,
    remaining: u64,
) -> Result<(ObjectRef<Vec<u8>>, u64)> {
    let size = policy.size_for(remaining);
    let data_ref = tx.xalloc_bytes(size as usize)?;
    tx.with_mut(loc.page, move |bp: &mut BlockArrayPage| {
        bp.slots[loc.index] = Some(BlockDescriptor {
            next_block: None,
            data_ref,
            size: 0,
            offset,
            flags: 0,
        });
    })?;
    Ok((data_ref, size))
}

/// Writes `buf` at `offset` into the regular file rooted at `inode_ref`,
/// extending it and zero-filling any gap as needed. Returns the number of
/// bytes written.
pub fn write_at(
    tx: &mut Transaction<'_>,
    inode_ref: ObjectRef<DiskInode>,
    index: &mut BlockIndex,
    free_cursor: &mut Option<BlockLocator>,
    policy: BlockSizePolicy,
    offset: u64,
    buf: &[u8],
    now: Timestamp,
) -> Result<usize> {
    let (kind, size, head) = tx.with(inode_ref, |inode: &DiskInode| {
        (inode.kind, inode.size, inode.block_head())
    })?;
    if kind != InodeKind::Regular {
        return Err(PmemfsError::InvalidArgument);
    }

    // Zero-fill the gap between current size and the write's start offset,
    // growing the chain as needed (SPEC_FULL.md §4.5).
    let mut cur_size = size;
    let head = match head {
        Some(h) => h,
        None => {
            let h = tx.alloc(BlockArrayPage::empty())?;
            tx.with_mut(inode_ref, move |inode: &mut DiskInode| {
                inode.payload = crate::fs::inode::Payload::Regular(Some(h));
            })?;
            h
        }
    };

    while cur_size < offset {
        let remaining_gap = offset - cur_size;
        let loc = find_or_extend_free_slot(tx, head, *free_cursor)?;
        let (_, block_size) = allocate_block(tx, loc, cur_size, policy, remaining_gap)?;
        let fill = remaining_gap.min(block_size);
        let data_ref = tx.with(loc.page, |bp: &BlockArrayPage| {
            bp.slots[loc.index].as_ref().unwrap().data_ref
        })?;
        tx.memset_persist(data_ref, 0, fill as usize)?;
        tx.with_mut(loc.page, move |bp: &mut BlockArrayPage| {
            bp.slots[loc.index].as_mut().unwrap().size = fill as u32;
        })?;
        index.insert(cur_size, loc);
        *free_cursor = Some(loc);
        cur_size += fill;
    }

    // Write the payload itself, allocating more blocks as needed.
    let mut written = 0usize;
    let mut pos = offset;
    while written < buf.len() {
        let remaining = (buf.len() - written) as u64;
        let loc = match index.find_less_equal(pos) {
            Some((block_off, loc)) => {
                let data_ref = tx.with(loc.page, |bp: &BlockArrayPage| {
                    bp.slots[loc.index].as_ref().unwrap().data_ref
                })?;
                let block_size = tx.arena_ref().usable_size(data_ref)? as u64;
                let in_block = pos - block_off;
                if in_block < block_size {
                    Some((loc, in_block, data_ref, block_size))
                } else {
                    None
                }
            }
            None => None,
        };
        let (loc, in_block, data_ref, block_size) = match loc {
            Some(t) => t,
            None => {
                let loc = find_or_extend_free_slot(tx, head, *free_cursor)?;
                let (data_ref, block_size) = allocate_block(tx, loc, pos, policy, remaining)?;
                index.insert(pos, loc);
                (loc, 0, data_ref, block_size)
            }
        };
        let chunk = ((block_size - in_block).min(remaining)) as usize;
        tx.memcpy_persist(data_ref, in_block as usize, &buf[written..written + chunk])?;
        let new_fill = in_block + chunk as u64;
        tx.with_mut(loc.page, move |bp: &mut BlockArrayPage| {
            let d = bp.slots[loc.index].as_mut().unwrap();
            if new_fill > d.size as u64 {
                d.size = new_fill as u32;
            }
        })?;
        *free_cursor = Some(loc);
        written += chunk;
        pos += chunk as u64;
    }

    let new_size = cur_size.max(offset + buf.len() as u64).max(size);
    tx.with_mut(inode_ref, move |inode: &mut DiskInode| {
        inode.size = new_size;
        inode.mtime = now;
    })?;
    Ok(written)
}

/// Reads up to `buf.len()` bytes starting at `offset`. Returns the number of
/// bytes read; stops at end-of-file or at a hole boundary (SPEC_FULL.md
/// §4.5).
pub fn read_at(
    arena: &HeapArena,
    inode_ref: ObjectRef<DiskInode>,
    index: &BlockIndex,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize> {
    let (kind, size) = arena.with(inode_ref, |inode: &DiskInode| (inode.kind, inode.size))?;
    if kind != InodeKind::Regular {
        return Err(PmemfsError::InvalidArgument);
    }
    if offset >= size {
        return Ok(0);
    }
    let want = buf.len().min((size - offset) as usize);
    let mut read = 0usize;
    let mut pos = offset;
    while read < want {
        let (block_off, loc) = match index.find_less_equal(pos) {
            Some(t) => t,
            None => break,
        };
        let (data_ref, fill) = arena.with(loc.page, |bp: &BlockArrayPage| {
            let d = bp.slots[loc.index].as_ref().unwrap();
            (d.data_ref, d.size as u64)
        })?;
        let in_block = pos - block_off;
        if in_block >= fill {
            break; // hole past last_block_fill: EOF at this point
        }
        let chunk = ((fill - in_block).min((want - read) as u64)) as usize;
        arena.with(data_ref, |data: &Vec<u8>| {
            buf[read..read + chunk].copy_from_slice(&data[in_block as usize..in_block as usize + chunk]);
        })?;
        read += chunk;
        pos += chunk as u64;
    }
    Ok(read)
}

/// Refreshes `atime` under relative-atime policy (SPEC_FULL.md §4.5, §9):
/// only when the current atime trails ctime, mtime, or `now - window`.
/// Best-effort: callers ignore a failure from this function.
pub fn maybe_update_atime(
    tx: &mut Transaction<'_>,
    inode_ref: ObjectRef<DiskInode>,
    now: Timestamp,
    window_secs: i64,
) -> Result<()> {
    let window_secs = if window_secs > 0 {
        window_secs
    } else {
        DEFAULT_RELATIME_WINDOW_SECS
    };
    let (atime, ctime, mtime) = tx.with(inode_ref, |inode: &DiskInode| {
        (inode.atime, inode.ctime, inode.mtime)
    })?;
    let stale = atime.sec < ctime.sec || atime.sec < mtime.sec || atime.sec < now.sec - window_secs;
    if stale {
        tx.with_mut(inode_ref, move |inode: &mut DiskInode| {
            inode.atime = now;
        })?;
    }
    Ok(())
}

/// Frees every block in the chain *except the head page* and resets
/// size/fill (SPEC_FULL.md §4.5 `truncate`, size-to-zero only; §8 scenario 6
/// "block-array pages freed except the head"). The head page's `next` is
/// cleared first so an aborted truncate cannot orphan live descriptors; its
/// descriptor slots are cleared in place rather than the page itself being
/// freed, matching the inode's embedded head block array never being
/// `TX_FREE`'d.
pub fn truncate_to_zero(tx: &mut Transaction<'_>, inode_ref: ObjectRef<DiskInode>, now: Timestamp) -> Result<()> {
    let head = tx.with(inode_ref, |inode: &DiskInode| inode.block_head())?;
    if let Some(head) = head {
        let first_next = tx.with(head, |bp: &BlockArrayPage| bp.next)?;
        tx.with_mut(head, |bp: &mut BlockArrayPage| bp.next = None)?;

        free_descriptors_in(tx, head)?;
        tx.with_mut(head, |bp: &mut BlockArrayPage| {
            for slot in bp.slots.iter_mut() {
                *slot = None;
            }
        })?;

        let mut page = first_next;
        while let Some(p) = page {
            let next = tx.with(p, |bp: &BlockArrayPage| bp.next)?;
            free_descriptors_in(tx, p)?;
            tx.free(p)?;
            page = next;
        }
    }
    tx.with_mut(inode_ref, move |inode: &mut DiskInode| {
        inode.size = 0;
        inode.last_block_fill = 0;
        inode.mtime = now;
        inode.payload = crate::fs::inode::Payload::Regular(head);
    })?;
    Ok(())
}

fn free_descriptors_in(tx: &mut Transaction<'_>, page: ObjectRef<BlockArrayPage>) -> Result<()> {
    let data_refs = tx.with(page, |bp: &BlockArrayPage| {
        bp.slots
            .iter()
            .filter_map(|s| s.as_ref().map(|d| d.data_ref))
            .collect::<Vec<_>>()
    })?;
    for data_ref in data_refs {
        tx.free(data_ref)?;
    }
    Ok(())
}
