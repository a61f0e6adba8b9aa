//! On-pool persistent data model: the records the arena stores, laid out
//! exactly as SPEC_FULL.md §6 describes them. Five pieces, leaves first:
//! inodes, directory pages, block-array pages, orphan pages, and the one
//! superblock tying them together.

pub mod block;
pub mod dirent;
pub mod inode;
pub mod orphan;
pub mod superblock;

pub use block::{BlockArrayPage, BlockDescriptor};
pub use dirent::{Dirent, DirentPage};
pub use inode::{DiskInode, InodeKind};
pub use orphan::OrphanPage;
pub use superblock::Superblock;
