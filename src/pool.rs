//! Pool runtime (component M, SPEC_FULL.md §3 "Pool Runtime", §4.7, §4.8).
//!
//! Ties the arena, superblock, vnode cache, and working-directory vnode
//! together behind one entry point, mirroring the source's top-level
//! `PMEMfilepool` handle. Path resolution (§4.7) and the directory-operation
//! dispatch (open/mkdir/unlink/rmdir/link, §4.8) live here because they are
//! the one layer with simultaneous access to the directory engine, the
//! vnode cache, and the pool-wide lock the orphan list needs.

use std::sync::Arc;

use crate::arena::HeapArena;
use crate::dir_engine;
use crate::error::{PmemfsError, Result, ResultExt};
use crate::file::{FileHandle, OpenFlags};
use crate::fs::inode::{DiskInode, InodeKind, Timestamp};
use crate::fs::orphan::{OrphanLocator, OrphanPage};
use crate::fs::superblock::Superblock;
use crate::lock::NamedMutex;
use crate::path::{Component, Path};
use crate::rw::BlockSizePolicy;
use crate::stat::{pool_stats, PoolStats, Stat};
use crate::vnode::{Vnode, VnodeCache};

/// Runtime-configurable knobs (SPEC_FULL.md §4.5, §9): the block-size policy
/// and the relative-atime window are pool fields, not constants, resolving
/// the "should this be configurable" open question in favor of
/// configurable-with-a-sane-default.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub block_size: BlockSizePolicy,
    pub relative_atime_window_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: BlockSizePolicy::Auto,
            relative_atime_window_secs: crate::param::DEFAULT_RELATIME_WINDOW_SECS,
        }
    }
}

/// The explicit, non-global pool handle (SPEC_FULL.md §3).
pub struct Pool {
    pub arena: HeapArena,
    superblock: NamedMutex<Superblock>,
    vnodes: VnodeCache,
    cwd: NamedMutex<Arc<Vnode>>,
    pub config: Config,
}

/// `lseek` origin (SPEC_FULL.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
    Data,
    Hole,
}

/// `fcntl` command (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FcntlOp {
    GetFl,
    SetLk,
    Unlck,
}

/// Frees an inode's block chain (if any), the inode itself, and — if it was
/// appended to the orphan list while still open — that list entry, used on
/// the last close of an unlinked-while-open inode (SPEC_FULL.md §3, §4.3,
/// §4.6). `truncate_to_zero` preserves the block chain's head page (it is
/// embedded in the inode and never freed on an ordinary truncate), so a full
/// reclamation has to free that head page itself once the inode it belongs
/// to is also being destroyed.
fn reclaim_inode(
    tx: &mut crate::arena::Transaction<'_>,
    inode_ref: crate::arena::ObjectRef<DiskInode>,
    orphan_slot: Option<OrphanLocator>,
) -> Result<()> {
    let head = tx.with(inode_ref, |i: &DiskInode| i.block_head())?;
    if let Some(head) = head {
        crate::rw::truncate_to_zero(tx, inode_ref, Timestamp::default())?;
        tx.free(head)?;
    }
    if let Some(slot) = orphan_slot {
        tx.with_mut(slot.page, move |p: &mut OrphanPage| p.slots[slot.index] = None)?;
    }
    tx.free(inode_ref)
}

/// Result of resolving a path (SPEC_FULL.md §4.7).
pub struct Resolved {
    pub parent: Arc<Vnode>,
    pub name: String,
    pub target: Option<Arc<Vnode>>,
    pub trailing_slash: bool,
}

impl Pool {
    /// Formats a brand-new pool in heap memory: one root directory, empty
    /// orphan list (SPEC_FULL.md §6 CLI, used by `mkfs`).
    pub fn format(capacity_bytes: u64, config: Config) -> Result<Self> {
        (|| {
            let arena = HeapArena::new(capacity_bytes);
            let mut tx = arena.begin();
            let now = Timestamp::default();
            let dir_head = tx.zalloc()?;
            let root_ref = tx.alloc(DiskInode::new_directory(dir_head, now, 0o755))?;
            tx.with_mut(root_ref, |inode: &mut DiskInode| inode.nlink = 2)?;
            dir_engine::add_dirent(&mut tx, dir_head, ".", root_ref)?;
            dir_engine::add_dirent(&mut tx, dir_head, "..", root_ref)?;
            tx.commit();
            log::info!("pool: formatted {capacity_bytes} bytes, root inode allocated");

            let vnodes = VnodeCache::new();
            let root_vnode = vnodes.acquire(root_ref);
            Ok(Self {
                arena,
                superblock: NamedMutex::new(
                    "superblock",
                    Superblock {
                        root_inode: root_ref,
                        orphan_list: None,
                    },
                ),
                vnodes,
                cwd: NamedMutex::new("cwd", root_vnode),
                config,
            })
        })()
        .or_abort()
    }

    pub fn root_vnode(&self) -> Arc<Vnode> {
        let root_ref = self.superblock.lock().root_inode;
        self.vnodes.acquire(root_ref)
    }

    pub fn cwd_vnode(&self) -> Arc<Vnode> {
        self.cwd.lock().clone()
    }

    pub fn chdir(&self, path: &str) -> Result<()> {
        (|| {
            let resolved = self.resolve(&self.cwd_vnode(), path)?;
            let target = resolved.target.ok_or(PmemfsError::NotFound)?;
            let is_dir = self.arena.with(target.inode_ref, |i: &DiskInode| i.kind)? == InodeKind::Directory;
            if !is_dir {
                return Err(PmemfsError::NotDirectory);
            }
            *self.cwd.lock() = target;
            Ok(())
        })()
        .or_abort()
    }

    /// Walks `path` from `base`, per SPEC_FULL.md §4.7.
    pub fn resolve(&self, base: &Arc<Vnode>, path: &str) -> Result<Resolved> {
        self.resolve_inner(base, path).or_abort()
    }

    fn resolve_inner(&self, base: &Arc<Vnode>, path: &str) -> Result<Resolved> {
        let parsed = Path::parse(path);
        let mut current = if parsed.is_absolute {
            self.root_vnode()
        } else {
            base.clone()
        };

        if parsed.components.is_empty() {
            return Ok(Resolved {
                parent: current.clone(),
                name: String::new(),
                target: Some(current),
                trailing_slash: parsed.trailing_slash,
            });
        }

        let last = parsed.components.len() - 1;
        for (i, component) in parsed.components.iter().enumerate() {
            let name = match component {
                Component::CurDir => continue,
                Component::ParentDir => {
                    let dir_head = self.dir_head_of(&current)?;
                    if let Some(child) = dir_engine::lookup(&self.arena, dir_head, "..")? {
                        current = self.vnodes.acquire(child);
                    }
                    continue;
                }
                Component::Named(n) => *n,
            };
            let dir_head = self.dir_head_of(&current)?;
            let found = dir_engine::lookup(&self.arena, dir_head, name)?;
            if i == last {
                return Ok(Resolved {
                    parent: current.clone(),
                    name: name.to_string(),
                    target: found.map(|r| self.vnodes.acquire(r)),
                    trailing_slash: parsed.trailing_slash,
                });
            }
            let next_ref = found.ok_or(PmemfsError::NotFound)?;
            current = self.vnodes.acquire(next_ref);
        }
        unreachable!("loop always returns at i == last")
    }

    fn dir_head_of(
        &self,
        vnode: &Arc<Vnode>,
    ) -> Result<crate::arena::ObjectRef<crate::fs::dirent::DirentPage>> {
        self.arena
            .with(vnode.inode_ref, |i: &DiskInode| i.dir_head())?
            .ok_or(PmemfsError::NotDirectory)
    }

    /// `open(base, path, flags, mode)` (SPEC_FULL.md §4.8). The `O_CREAT`
    /// path holds the parent's write lock across the dirent insertion for
    /// the same reason [`Pool::mkdir`] does: two concurrent creates under the
    /// same parent must not race on the same free dirent slot.
    pub fn open(&self, base: &Arc<Vnode>, path: &str, flags: OpenFlags, mode: u16) -> Result<FileHandle> {
        (|| {
            if flags.access_mode_count() != 1 {
                return Err(PmemfsError::InvalidArgument);
            }
            let now = Timestamp::default();

            if flags.contains(OpenFlags::TMPFILE) {
                let mut tx = self.arena.begin();
                let inode_ref = tx.alloc(DiskInode::new_regular(now, mode))?;
                tx.commit();
                let vnode = self.vnodes.acquire(inode_ref);
                return Ok(FileHandle::new(vnode, flags));
            }

            let resolved = self.resolve(base, path)?;
            let vnode = match resolved.target {
                Some(v) => {
                    if flags.contains(OpenFlags::EXCLUSIVE) && flags.contains(OpenFlags::CREATE) {
                        return Err(PmemfsError::Exists);
                    }
                    v
                }
                None => {
                    if !flags.contains(OpenFlags::CREATE) {
                        return Err(PmemfsError::NotFound);
                    }
                    let parent_dir = self.dir_head_of(&resolved.parent)?;
                    let _parent_guard = resolved.parent.lock.write();
                    let mut tx = self.arena.begin();
                    let inode_ref = tx.alloc(DiskInode::new_regular(now, mode))?;
                    dir_engine::add_dirent(&mut tx, parent_dir, &resolved.name, inode_ref)?;
                    tx.with_mut(inode_ref, |i: &mut DiskInode| i.nlink = 1)?;
                    tx.commit();
                    self.vnodes.acquire(inode_ref)
                }
            };

            let kind = self.arena.with(vnode.inode_ref, |i: &DiskInode| i.kind)?;
            if flags.contains(OpenFlags::DIRECTORY) && kind != InodeKind::Directory {
                return Err(PmemfsError::NotDirectory);
            }
            if flags.contains(OpenFlags::TRUNCATE) {
                if kind != InodeKind::Regular {
                    return Err(PmemfsError::IsDirectory);
                }
                if !flags.can_write() {
                    return Err(PmemfsError::AccessDenied);
                }
                let mut state = vnode.lock.write();
                let mut tx = self.arena.begin();
                crate::rw::truncate_to_zero(&mut tx, vnode.inode_ref, now)?;
                tx.commit();
                state.block_index = None;
                drop(state);
            }
            Ok(FileHandle::new(vnode, flags))
        })()
        .or_abort()
    }

    /// `mkdir`/`mkdirat` (SPEC_FULL.md §6). Holds the parent's write lock
    /// across the transaction (SPEC_FULL.md §5 "parent-then-child"); the new
    /// directory has no vnode yet, so there is no child lock to take.
    pub fn mkdir(&self, base: &Arc<Vnode>, path: &str, mode: u16) -> Result<()> {
        (|| {
            let resolved = self.resolve(base, path)?;
            if resolved.target.is_some() {
                return Err(PmemfsError::Exists);
            }
            let parent_dir = self.dir_head_of(&resolved.parent)?;
            let now = Timestamp::default();
            let _parent_guard = resolved.parent.lock.write();
            let mut tx = self.arena.begin();
            let dir_head = tx.zalloc()?;
            let inode_ref = tx.alloc(DiskInode::new_directory(dir_head, now, mode))?;
            dir_engine::add_dirent(&mut tx, parent_dir, &resolved.name, inode_ref)?;
            dir_engine::add_dirent(&mut tx, dir_head, ".", inode_ref)?;
            dir_engine::add_dirent(&mut tx, dir_head, "..", resolved.parent.inode_ref)?;
            tx.with_mut(inode_ref, |i: &mut DiskInode| i.nlink = 2)?;
            tx.with_mut(resolved.parent.inode_ref, |i: &mut DiskInode| i.nlink += 1)?;
            tx.commit();
            Ok(())
        })()
        .or_abort()
    }

    /// `rmdir` (SPEC_FULL.md §4.6). Holds the parent's then the target
    /// directory's write lock across the transaction, parent-then-child
    /// (SPEC_FULL.md §5).
    pub fn rmdir(&self, base: &Arc<Vnode>, path: &str) -> Result<()> {
        (|| {
            let resolved = self.resolve(base, path)?;
            let target = resolved.target.ok_or(PmemfsError::NotFound)?;
            let kind = self.arena.with(target.inode_ref, |i: &DiskInode| i.kind)?;
            if kind != InodeKind::Directory {
                return Err(PmemfsError::NotDirectory);
            }
            let target_dir = self.dir_head_of(&target)?;
            if dir_engine::count_live(&self.arena, target_dir)? > 2 {
                return Err(PmemfsError::NotEmpty);
            }
            let parent_dir = self.dir_head_of(&resolved.parent)?;
            let parent_guard = resolved.parent.lock.write();
            let target_guard = target.lock.write();
            let mut tx = self.arena.begin();
            dir_engine::clear_dirent(&mut tx, parent_dir, &resolved.name)?;
            tx.with_mut(resolved.parent.inode_ref, |i: &mut DiskInode| i.nlink -= 1)?;
            tx.with_mut(target.inode_ref, |i: &mut DiskInode| i.nlink = 0)?;
            tx.free(target_dir)?;
            tx.commit();
            drop(target_guard);
            drop(parent_guard);
            self.vnodes
                .release(target, &self.arena, |tx, inode_ref| tx.free(inode_ref))?;
            Ok(())
        })()
        .or_abort()
    }

    /// `link`/`linkat`: adds a new dirent for an existing regular-file inode
    /// (SPEC_FULL.md §4.8 "directories cannot be hard-linked"). Holds the new
    /// parent's then the target's write lock, parent-then-child
    /// (SPEC_FULL.md §5).
    pub fn link(&self, base: &Arc<Vnode>, old: &str, new: &str) -> Result<()> {
        (|| {
            let old_resolved = self.resolve(base, old)?;
            let target = old_resolved.target.ok_or(PmemfsError::NotFound)?;
            if self.arena.with(target.inode_ref, |i: &DiskInode| i.kind)? == InodeKind::Directory {
                return Err(PmemfsError::IsDirectory);
            }
            let new_resolved = self.resolve(base, new)?;
            if new_resolved.target.is_some() {
                return Err(PmemfsError::Exists);
            }
            let parent_dir = self.dir_head_of(&new_resolved.parent)?;
            let _parent_guard = new_resolved.parent.lock.write();
            let _target_guard = target.lock.write();
            let mut tx = self.arena.begin();
            dir_engine::add_dirent(&mut tx, parent_dir, &new_resolved.name, target.inode_ref)?;
            tx.with_mut(target.inode_ref, |i: &mut DiskInode| i.nlink += 1)?;
            tx.commit();
            Ok(())
        })()
        .or_abort()
    }

    /// `unlink`/`unlinkat`: removes a non-directory dirent, appending the
    /// inode to the orphan list if it is still open (SPEC_FULL.md §4.6).
    /// Holds the parent's then the target's write lock, parent-then-child
    /// (SPEC_FULL.md §5); the target's lock is also what makes it safe to
    /// record the orphan slot into its `VnodeState` here.
    pub fn unlink(&self, base: &Arc<Vnode>, path: &str) -> Result<()> {
        (|| {
            let resolved = self.resolve(base, path)?;
            let target = resolved.target.ok_or(PmemfsError::NotFound)?;
            if self.arena.with(target.inode_ref, |i: &DiskInode| i.kind)? == InodeKind::Directory {
                return Err(PmemfsError::IsDirectory);
            }
            let parent_dir = self.dir_head_of(&resolved.parent)?;
            let parent_guard = resolved.parent.lock.write();
            let mut target_guard = target.lock.write();
            let mut tx = self.arena.begin();
            dir_engine::clear_dirent(&mut tx, parent_dir, &resolved.name)?;
            let nlink = tx.with_mut(target.inode_ref, |i: &mut DiskInode| {
                i.nlink -= 1;
                i.nlink
            })?;
            let mut orphan_slot = None;
            if nlink == 0 && self.still_open(&target) {
                let slot = self.append_orphan(&mut tx, target.inode_ref)?;
                orphan_slot = Some(slot);
            }
            tx.commit();
            target_guard.orphan_slot = orphan_slot;
            drop(target_guard);
            drop(parent_guard);
            self.vnodes
                .release(target, &self.arena, move |tx, inode_ref| reclaim_inode(tx, inode_ref, orphan_slot))?;
            Ok(())
        })()
        .or_abort()
    }

    /// `close(H)`: drops the handle's vnode reference. If the inode was
    /// unlinked while open and this was the last open reference, its
    /// persistent storage — and, if present, its orphan-list entry — are
    /// reclaimed here (SPEC_FULL.md §3, §4.8).
    pub fn close(&self, handle: FileHandle) -> Result<()> {
        (|| {
            let orphan_slot = handle.vnode.lock.read().orphan_slot;
            self.vnodes
                .release(handle.vnode, &self.arena, move |tx, inode_ref| reclaim_inode(tx, inode_ref, orphan_slot))
        })()
        .or_abort()
    }

    /// Lazily builds the handle's runtime block index from the persistent
    /// chain, matching the cache-or-rebuild convention every caller of
    /// [`crate::rw::read_at`]/[`crate::rw::write_at`] must follow
    /// (SPEC_FULL.md §4.4).
    fn ensure_block_index(&self, vnode: &Arc<Vnode>) -> Result<()> {
        let mut state = vnode.lock.write();
        if state.block_index.is_none() {
            let head = self.arena.with(vnode.inode_ref, |i: &DiskInode| i.block_head())?;
            state.block_index = Some(crate::rw::build_block_index(&self.arena, head)?);
        }
        Ok(())
    }

    /// `write(H, buf, count)` (SPEC_FULL.md §4.5): append mode seeks to the
    /// current size before writing; on success the handle's offset advances
    /// by the number of bytes written, matching `count`.
    pub fn write(&self, handle: &FileHandle, buf: &[u8]) -> Result<usize> {
        (|| {
            if !handle.flags.can_write() {
                return Err(PmemfsError::BadHandle);
            }
            self.ensure_block_index(&handle.vnode)?;
            if handle.flags.contains(OpenFlags::APPEND) {
                let size = self.fstat(&handle.vnode)?.size;
                handle.set_offset(size);
            }
            let offset = handle.offset();
            let now = Timestamp::default();
            // The per-vnode write lock must stay held from before the transaction
            // begins until after it has fully committed or rolled back (SPEC_FULL.md
            // §5 "unlock-on-commit"), so it is acquired before `arena.begin()` and
            // only dropped once `tx.commit()` has returned.
            let mut state = handle.vnode.lock.write();
            let mut tx = self.arena.begin();
            let state_ref = &mut *state;
            let written = crate::rw::write_at(
                &mut tx,
                handle.vnode.inode_ref,
                state_ref.block_index.as_mut().unwrap(),
                &mut state_ref.free_cursor,
                self.config.block_size,
                offset,
                buf,
                now,
            )?;
            tx.commit();
            drop(state);
            handle.advance(written as u64);
            Ok(written)
        })()
        .or_abort()
    }

    /// `read(H, buf, count)` (SPEC_FULL.md §4.5): advances the handle's
    /// offset by the number of bytes produced; the access-timestamp update
    /// is best-effort and never fails the read.
    pub fn read(&self, handle: &FileHandle, buf: &mut [u8]) -> Result<usize> {
        (|| {
            if !handle.flags.can_read() {
                return Err(PmemfsError::BadHandle);
            }
            self.ensure_block_index(&handle.vnode)?;
            let offset = handle.offset();
            let state = handle.vnode.lock.read();
            let read = crate::rw::read_at(&self.arena, handle.vnode.inode_ref, state.block_index.as_ref().unwrap(), offset, buf)?;
            drop(state);
            handle.advance(read as u64);
            if !handle.flags.contains(OpenFlags::NO_ATIME) {
                let mut tx = self.arena.begin();
                if crate::rw::maybe_update_atime(&mut tx, handle.vnode.inode_ref, Timestamp::default(), self.config.relative_atime_window_secs).is_ok() {
                    tx.commit();
                }
            }
            Ok(read)
        })()
        .or_abort()
    }

    /// `truncate(vnode)` (SPEC_FULL.md §4.5): size-to-zero only. Holds the
    /// vnode's write lock across the whole transaction, same discipline as
    /// [`Pool::write`].
    pub fn truncate(&self, vnode: &Arc<Vnode>) -> Result<()> {
        (|| {
            let mut state = vnode.lock.write();
            let mut tx = self.arena.begin();
            crate::rw::truncate_to_zero(&mut tx, vnode.inode_ref, Timestamp::default())?;
            tx.commit();
            state.block_index = None;
            drop(state);
            Ok(())
        })()
        .or_abort()
    }

    /// `getdents`/`getdents64` (SPEC_FULL.md §4.6, §6): encodes the
    /// directory's live entries into `buf` starting at the handle's current
    /// offset (used here as an entry cursor, not a byte offset), advancing it
    /// by the number of entries consumed. Returns the number of bytes
    /// written.
    fn getdents_impl(&self, handle: &FileHandle, buf: &mut [u8], wide: bool) -> Result<usize> {
        let dir_head = self.dir_head_of(&handle.vnode)?;
        let entries = dir_engine::enumerate(&self.arena, dir_head)?;
        let start = handle.offset() as usize;
        if start >= entries.len() {
            return Ok(0);
        }
        let (consumed, written) = if wide {
            dir_engine::encode_getdents64(buf, &entries[start..])
        } else {
            dir_engine::encode_getdents(buf, &entries[start..])
        };
        handle.advance(consumed as u64);
        Ok(written)
    }

    pub fn getdents(&self, handle: &FileHandle, buf: &mut [u8]) -> Result<usize> {
        self.getdents_impl(handle, buf, false).or_abort()
    }

    pub fn getdents64(&self, handle: &FileHandle, buf: &mut [u8]) -> Result<usize> {
        self.getdents_impl(handle, buf, true).or_abort()
    }

    /// `lseek(H, offset, whence)` (SPEC_FULL.md §4.5, §9): `data`/`hole`
    /// resolve per `pmemfile_lseek64`'s actual behavior (both only check
    /// `offset <= size`, since this design tracks no finer hole boundary).
    pub fn lseek(&self, handle: &FileHandle, offset: i64, whence: Whence) -> Result<u64> {
        (|| {
            let kind = self.arena.with(handle.vnode.inode_ref, |i: &DiskInode| i.kind)?;
            if kind == InodeKind::Directory && whence == Whence::End {
                return Err(PmemfsError::InvalidArgument);
            }
            let size = self.fstat(&handle.vnode)?.size as i64;
            let new_offset = match whence {
                Whence::Set => offset,
                Whence::Current => handle.offset() as i64 + offset,
                Whence::End => size + offset,
                Whence::Data => {
                    if offset < 0 {
                        0
                    } else if offset > size {
                        return Err(PmemfsError::NoXsiData);
                    } else {
                        offset
                    }
                }
                Whence::Hole => {
                    if offset > size {
                        return Err(PmemfsError::NoXsiData);
                    }
                    size
                }
            };
            if new_offset < 0 {
                return Err(PmemfsError::InvalidArgument);
            }
            handle.set_offset(new_offset as u64);
            Ok(new_offset as u64)
        })()
        .or_abort()
    }

    /// `fcntl(GETFL/SETLK/UNLCK)` (SPEC_FULL.md §6). `SETLK`/`UNLCK` are a
    /// no-op: this design has no concept of byte-range advisory locks to
    /// enforce.
    pub fn fcntl(&self, handle: &FileHandle, op: FcntlOp) -> u32 {
        match op {
            FcntlOp::GetFl => handle.flags.bits(),
            FcntlOp::SetLk | FcntlOp::Unlck => 0,
        }
    }

    /// `getcwd()`: walks from the working-directory vnode up to the root via
    /// `..`, reading each level's own name out of its parent's directory
    /// chain (SPEC_FULL.md §6).
    pub fn getcwd(&self) -> Result<String> {
        (|| {
            let root_ref = self.superblock.lock().root_inode;
            let mut vnode = self.cwd_vnode();
            let mut components = Vec::new();
            while vnode.inode_ref != root_ref {
                let dir_head = self.dir_head_of(&vnode)?;
                let parent_ref = dir_engine::lookup(&self.arena, dir_head, "..")?.ok_or(PmemfsError::NotFound)?;
                let parent = self.vnodes.acquire(parent_ref);
                let parent_dir = self.dir_head_of(&parent)?;
                let entries = dir_engine::enumerate(&self.arena, parent_dir)?;
                let name = entries
                    .into_iter()
                    .find(|e| {
                        e.ino == vnode.inode_ref.as_u64() && e.name != b"." && e.name != b".."
                    })
                    .map(|e| String::from_utf8_lossy(&e.name).into_owned())
                    .ok_or(PmemfsError::Internal("directory entry missing from its own parent"))?;
                components.push(name);
                vnode = parent;
            }
            if components.is_empty() {
                return Ok("/".to_string());
            }
            components.reverse();
            Ok(format!("/{}", components.join("/")))
        })()
        .or_abort()
    }

    fn still_open(&self, vnode: &Arc<Vnode>) -> bool {
        // Two expected references: the vnode cache's own entry and the
        // caller's `target` handle held across this call.
        Arc::strong_count(vnode) > 2
    }

    fn append_orphan(
        &self,
        tx: &mut crate::arena::Transaction<'_>,
        inode_ref: crate::arena::ObjectRef<DiskInode>,
    ) -> Result<OrphanLocator> {
        let head = self.superblock.lock().orphan_list;
        let page = match head {
            Some(h) => h,
            None => {
                let h = tx.zalloc()?;
                self.superblock.lock().orphan_list = Some(h);
                h
            }
        };
        let mut cur = page;
        loop {
            let (slot, next) = tx.with(cur, |p: &OrphanPage| {
                (p.slots.iter().position(|s| s.is_none()), p.next)
            })?;
            if let Some(index) = slot {
                tx.with_mut(cur, move |p: &mut OrphanPage| {
                    p.slots[index] = Some(inode_ref);
                })?;
                return Ok(OrphanLocator { page: cur, index });
            }
            match next {
                Some(n) => cur = n,
                None => {
                    let new_page = tx.alloc(OrphanPage::empty())?;
                    tx.with_mut(cur, move |p: &mut OrphanPage| {
                        p.next = Some(new_page);
                    })?;
                    cur = new_page;
                }
            }
        }
    }

    pub fn stat_path(&self, base: &Arc<Vnode>, path: &str) -> Result<Stat> {
        (|| {
            let resolved = self.resolve(base, path)?;
            let target = resolved.target.ok_or(PmemfsError::NotFound)?;
            self.fstat(&target)
        })()
        .or_abort()
    }

    pub fn fstat(&self, vnode: &Arc<Vnode>) -> Result<Stat> {
        self.arena
            .with(vnode.inode_ref, |i: &DiskInode| Stat::from_inode(vnode.inode_ref.as_u64(), i))
            .or_abort()
    }

    pub fn stats(&self) -> PoolStats {
        pool_stats(&self.arena)
    }
}
