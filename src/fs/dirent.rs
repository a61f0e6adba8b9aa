//! Directory table (component D, SPEC_FULL.md §3, §4.6, §6).
//!
//! A directory's contents are a linked chain of fixed-capacity pages of
//! dirent slots, not a growable `Vec` — this is the one place the pool's
//! persistent layout has a genuinely fixed record shape (SPEC_FULL.md §6:
//! `dirents[num_elements]`), so each page is sized at compile time via
//! [`crate::param::DIRENTS_PER_PAGE`] and slots are filled and vacated in
//! place rather than the page being resized.

use array_macro::array;
use arrayvec::ArrayVec;

use crate::arena::{ArenaObject, ObjectKind, ObjectRef};
use crate::fs::inode::DiskInode;
use crate::param::{DIRENTS_PER_PAGE, NAME_MAX};

/// A bounded-length name, matching the on-disk `name[NAME_MAX+1]` field.
pub type Name = ArrayVec<u8, NAME_MAX>;

#[derive(Debug, Clone)]
pub struct Dirent {
    pub inode_ref: ObjectRef<DiskInode>,
    pub name: Name,
}

/// One page of the directory's dirent chain. A slot is free when it is
/// `None`, matching the source's "name's first byte is zero" convention
/// expressed directly as an `Option` instead of a sentinel byte.
#[derive(Clone)]
pub struct DirentPage {
    pub next: Option<ObjectRef<DirentPage>>,
    pub slots: [Option<Dirent>; DIRENTS_PER_PAGE],
}

impl DirentPage {
    pub fn empty() -> Self {
        Self {
            next: None,
            slots: array![_ => None; DIRENTS_PER_PAGE],
        }
    }
}

impl Default for DirentPage {
    fn default() -> Self {
        Self::empty()
    }
}

impl ArenaObject for DirentPage {
    const KIND: ObjectKind = ObjectKind::DirPage;
}
