//! Stat record and pool-wide statistics (SPEC_FULL.md §4.8).
//!
//! Grounded on the source's `pmemfile_stat_t`; `stats()` mirrors `file.c`'s
//! object-count walk, rebuilt here on top of [`crate::arena::HeapArena::count`]
//! instead of a raw `POBJ_FOREACH`.

use crate::arena::{HeapArena, ObjectKind};
use crate::fs::inode::{DiskInode, InodeKind, Timestamp};

/// A single inode's externally visible attributes.
#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub ino: u64,
    pub kind: InodeKind,
    pub mode: u16,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub nlink: u32,
    pub atime: Timestamp,
    pub mtime: Timestamp,
    pub ctime: Timestamp,
}

impl Stat {
    pub fn from_inode(ino: u64, inode: &DiskInode) -> Self {
        Self {
            ino,
            kind: inode.kind,
            mode: inode.mode,
            uid: inode.uid,
            gid: inode.gid,
            size: inode.size,
            nlink: inode.nlink,
            atime: inode.atime,
            mtime: inode.mtime,
            ctime: inode.ctime,
        }
    }
}

/// Pool-wide object counts, by kind (SPEC_FULL.md §4.8 `stats(pool)`).
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub inodes: usize,
    pub dir_pages: usize,
    pub block_array_pages: usize,
    pub orphan_pages: usize,
    pub block_data_regions: usize,
}

pub fn pool_stats(arena: &HeapArena) -> PoolStats {
    PoolStats {
        inodes: arena.count(ObjectKind::Inode),
        dir_pages: arena.count(ObjectKind::DirPage),
        block_array_pages: arena.count(ObjectKind::BlockArrayPage),
        orphan_pages: arena.count(ObjectKind::OrphanPage),
        block_data_regions: arena.count(ObjectKind::BlockData),
    }
}
