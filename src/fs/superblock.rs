//! Superblock (component B, SPEC_FULL.md §3, §4.2, §6).
//!
//! One root record: the pool formatter (`mkfs`) creates it once, and normal
//! operation only ever mutates the orphan-list head as inodes are
//! orphaned and reclaimed. Unlike inodes and pages, there is exactly one of
//! these per pool, so it is held directly by [`crate::pool::Pool`] rather
//! than being an arena-allocated object in its own right.

use crate::arena::ObjectRef;
use crate::fs::inode::DiskInode;
use crate::fs::orphan::OrphanPage;

#[derive(Clone)]
pub struct Superblock {
    pub root_inode: ObjectRef<DiskInode>,
    pub orphan_list: Option<ObjectRef<OrphanPage>>,
}
