//! Persistent inode record (component C, SPEC_FULL.md §3, §6).
//!
//! Layout mirrors the source's `{ kind, mode, uid, gid, size, nlink,
//! last_block_fill, atime/mtime/ctime, payload_head }` record. Rust lets the
//! kind-discriminated payload (directory table head vs. block-array head) be
//! expressed directly as an enum instead of a tagged union plus a separate
//! `kind` field, but the `kind` field is kept too since it is part of the
//! fixed on-disk shape (SPEC_FULL.md §6).

use crate::arena::{ArenaObject, ObjectKind, ObjectRef};
use crate::fs::block::BlockArrayPage;
use crate::fs::dirent::DirentPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    Regular,
    Directory,
}

/// Seconds + nanoseconds, matching the wire format in SPEC_FULL.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: u32,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Directory(ObjectRef<DirentPage>),
    Regular(Option<ObjectRef<BlockArrayPage>>),
}

/// The persistent inode. Allocated once per file or directory and never
/// moved; only its fields change, each inside a transaction.
#[derive(Debug, Clone)]
pub struct DiskInode {
    pub kind: InodeKind,
    pub mode: u16,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub nlink: u32,
    pub last_block_fill: u32,
    pub atime: Timestamp,
    pub mtime: Timestamp,
    pub ctime: Timestamp,
    pub payload: Payload,
}

impl DiskInode {
    pub fn new_directory(self_dir: ObjectRef<DirentPage>, now: Timestamp, mode: u16) -> Self {
        Self {
            kind: InodeKind::Directory,
            mode,
            uid: 0,
            gid: 0,
            size: 0,
            nlink: 0,
            last_block_fill: 0,
            atime: now,
            mtime: now,
            ctime: now,
            payload: Payload::Directory(self_dir),
        }
    }

    pub fn new_regular(now: Timestamp, mode: u16) -> Self {
        Self {
            kind: InodeKind::Regular,
            mode,
            uid: 0,
            gid: 0,
            size: 0,
            nlink: 0,
            last_block_fill: 0,
            atime: now,
            mtime: now,
            ctime: now,
            payload: Payload::Regular(None),
        }
    }

    pub fn dir_head(&self) -> Option<ObjectRef<DirentPage>> {
        match self.payload {
            Payload::Directory(h) => Some(h),
            Payload::Regular(_) => None,
        }
    }

    pub fn block_head(&self) -> Option<ObjectRef<BlockArrayPage>> {
        match self.payload {
            Payload::Regular(h) => h,
            Payload::Directory(_) => None,
        }
    }
}

impl ArenaObject for DiskInode {
    const KIND: ObjectKind = ObjectKind::Inode;
}
