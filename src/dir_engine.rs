//! Directory engine (component J, SPEC_FULL.md §4.6).
//!
//! Pure directory-chain operations: locate, add, and clear dirents, and
//! flatten a chain into the wire format `getdents`/`getdents64` return.
//! nlink bookkeeping and orphan-list placement are *not* done here — they
//! need the vnode cache's view of whether an inode is still open, which
//! this module deliberately has no access to — [`crate::pool::Pool`] wires
//! the two together (mirroring the source's split between `dir.c`'s pure
//! dirent-chain logic and `file.c`'s open-handle-aware policy on top of it).

use zerocopy::AsBytes;

use crate::arena::{HeapArena, ObjectRef, Transaction};
use crate::error::{PmemfsError, Result};
use crate::fs::dirent::{Dirent, DirentPage, Name};
use crate::fs::inode::DiskInode;

/// Read-locked scan of `head`'s chain for a dirent named `name`.
/// SPEC_FULL.md §4.6: "Empty name returns the parent itself" is handled by
/// the caller (the resolver), not here.
pub fn lookup(
    arena: &HeapArena,
    head: ObjectRef<DirentPage>,
    name: &str,
) -> Result<Option<ObjectRef<DiskInode>>> {
    let mut page = Some(head);
    while let Some(p) = page {
        let (found, next) = arena.with(p, |dp: &DirentPage| {
            let found = dp
                .slots
                .iter()
                .flatten()
                .find(|d| d.name.as_slice() == name.as_bytes())
                .map(|d| d.inode_ref);
            (found, dp.next)
        })?;
        if found.is_some() {
            return Ok(found);
        }
        page = next;
    }
    Ok(None)
}

/// Adds `(name, child)` to the directory rooted at `head`. Fails
/// `NameTooLong`/`Exists` per SPEC_FULL.md §4.6.
pub fn add_dirent(
    tx: &mut Transaction<'_>,
    head: ObjectRef<DirentPage>,
    name: &str,
    child: ObjectRef<DiskInode>,
) -> Result<()> {
    crate::path::validate_name(name)?;
    if lookup(tx_arena(tx), head, name)?.is_some() {
        return Err(PmemfsError::Exists);
    }
    let mut name_buf = Name::new();
    name_buf
        .try_extend_from_slice(name.as_bytes())
        .map_err(|_| PmemfsError::NameTooLong)?;

    let mut page = head;
    loop {
        let slot_index = tx.with(page, |dp: &DirentPage| {
            dp.slots.iter().position(|s| s.is_none())
        })?;
        if let Some(index) = slot_index {
            tx.with_mut(page, move |dp: &mut DirentPage| {
                dp.slots[index] = Some(Dirent {
                    inode_ref: child,
                    name: name_buf,
                });
            })?;
            return Ok(());
        }
        let next = tx.with(page, |dp: &DirentPage| dp.next)?;
        match next {
            Some(next_page) => page = next_page,
            None => {
                let new_page = tx.alloc(DirentPage::empty())?;
                tx.with_mut(page, move |dp: &mut DirentPage| {
                    dp.next = Some(new_page);
                })?;
                page = new_page;
            }
        }
    }
}

/// Clears the slot named `name`, returning the inode-ref it held. The
/// caller is responsible for nlink/orphan bookkeeping.
pub fn clear_dirent(
    tx: &mut Transaction<'_>,
    head: ObjectRef<DirentPage>,
    name: &str,
) -> Result<ObjectRef<DiskInode>> {
    let mut page = head;
    loop {
        let (slot_index, child) = tx.with(page, |dp: &DirentPage| {
            dp.slots
                .iter()
                .position(|s| matches!(s, Some(d) if d.name.as_slice() == name.as_bytes()))
                .map(|i| (i, dp.slots[i].as_ref().unwrap().inode_ref))
                .map_or((None, None), |(i, r)| (Some(i), Some(r)))
        })?;
        if let (Some(index), Some(child)) = (slot_index, child) {
            tx.with_mut(page, move |dp: &mut DirentPage| {
                dp.slots[index] = None;
            })?;
            return Ok(child);
        }
        let next = tx.with(page, |dp: &DirentPage| dp.next)?;
        match next {
            Some(next_page) => page = next_page,
            None => return Err(PmemfsError::NotFound),
        }
    }
}

/// True if the directory contains nothing but the occupied slot count given
/// by `skip` (used by `rmdir` to check for exactly `.`/`..`, SPEC_FULL.md
/// §4.6).
pub fn count_live(arena: &HeapArena, head: ObjectRef<DirentPage>) -> Result<usize> {
    let mut total = 0usize;
    let mut page = Some(head);
    while let Some(p) = page {
        let (count, next) = arena.with(p, |dp: &DirentPage| {
            (dp.slots.iter().flatten().count(), dp.next)
        })?;
        total += count;
        page = next;
    }
    Ok(total)
}

/// One flattened entry ready for wire encoding.
pub struct Entry {
    pub ino: u64,
    pub name: Vec<u8>,
}

/// Walks the whole chain into an ordered `Vec`, chain-then-index
/// (SPEC_FULL.md §4.6 "Directory enumeration ordering is chain-then-index").
pub fn enumerate(arena: &HeapArena, head: ObjectRef<DirentPage>) -> Result<Vec<Entry>> {
    let mut out = Vec::new();
    let mut page = Some(head);
    while let Some(p) = page {
        let (entries, next): (Vec<(u64, Vec<u8>)>, _) = arena.with(p, |dp: &DirentPage| {
            let entries = dp
                .slots
                .iter()
                .flatten()
                .map(|d| (d.inode_ref.as_u64(), d.name.to_vec()))
                .collect();
            (entries, dp.next)
        })?;
        out.extend(
            entries
                .into_iter()
                .map(|(ino, name)| Entry { ino, name }),
        );
        page = next;
    }
    Ok(out)
}

/// The fixed-width prefix of one dirent record, laid out exactly as the
/// wire format in SPEC_FULL.md §4.6 describes it. `zerocopy::AsBytes` gives
/// a checked, declarative cast to its little-endian byte representation in
/// place of manual `copy_from_slice`/`to_le_bytes` splicing.
#[derive(zerocopy::AsBytes)]
#[repr(C, packed)]
struct RecordHeader {
    ino: u64,
    off: u64,
    reclen: u16,
}

/// Encodes as many `entries` as fit into `buf` in the `getdents64` wire
/// format described in SPEC_FULL.md §4.6: `ino: u64, off: u64, reclen: u16,
/// name + NUL, d_type: u8`. `off` is the entry's own inode id, matching the
/// spec's "record offset is identical to inode id in this design". Returns
/// the number of entries consumed (so the caller can resume past them) and
/// the number of bytes written. An entry that does not fit terminates
/// encoding without consuming it.
pub fn encode_getdents64(buf: &mut [u8], entries: &[Entry]) -> (usize, usize) {
    encode(buf, entries, true)
}

/// 32-bit `getdents` variant: same layout without the trailing `d_type`.
pub fn encode_getdents(buf: &mut [u8], entries: &[Entry]) -> (usize, usize) {
    encode(buf, entries, false)
}

fn encode(buf: &mut [u8], entries: &[Entry], with_d_type: bool) -> (usize, usize) {
    let mut offset = 0usize;
    let mut consumed = 0usize;
    for entry in entries {
        let trailer = if with_d_type { 2 } else { 1 }; // NUL (+ d_type)
        let reclen = std::mem::size_of::<RecordHeader>() + entry.name.len() + trailer;
        if offset + reclen > buf.len() {
            break;
        }
        let header = RecordHeader {
            ino: entry.ino,
            off: entry.ino,
            reclen: reclen as u16,
        };
        let mut w = offset;
        buf[w..w + std::mem::size_of::<RecordHeader>()].copy_from_slice(header.as_bytes());
        w += std::mem::size_of::<RecordHeader>();
        buf[w..w + entry.name.len()].copy_from_slice(&entry.name);
        w += entry.name.len();
        buf[w] = 0; // NUL terminator
        if with_d_type {
            buf[w + 1] = 0; // d_type: unused discriminant, symlinks/devices out of scope (SPEC_FULL.md §1)
        }
        offset += reclen;
        consumed += 1;
    }
    (consumed, offset)
}

// `Transaction` reads go through `&HeapArena` internally; this helper lets
// `add_dirent` call the read-only `lookup` without borrowing `tx` mutably
// and immutably at once.
fn tx_arena<'a>(tx: &Transaction<'a>) -> &'a HeapArena {
    tx.arena_ref()
}
