//! End-to-end scenarios exercising `Pool` as a client application would,
//! covering SPEC_FULL.md §8's numbered scenarios.

use pmemfs::file::{FileHandle, OpenFlags};
use pmemfs::fs::inode::{DiskInode, Timestamp};
use pmemfs::{Config, Pool};

const POOL_BYTES: u64 = 64 * 1024 * 1024;

fn ensure_block_index(pool: &Pool, handle: &FileHandle) {
    let mut state = handle.vnode.lock.write();
    if state.block_index.is_none() {
        let head = pool
            .arena
            .with(handle.vnode.inode_ref, |i: &DiskInode| i.block_head())
            .unwrap();
        state.block_index = Some(pmemfs::rw::build_block_index(&pool.arena, head).unwrap());
    }
}

fn write_all(pool: &Pool, handle: &FileHandle, offset: u64, buf: &[u8]) {
    pool.lseek(handle, offset as i64, pmemfs::Whence::Set).unwrap();
    pool.write(handle, buf).expect("write succeeds");
}

fn read_all(pool: &Pool, handle: &FileHandle, offset: u64, out: &mut [u8]) -> usize {
    pool.lseek(handle, offset as i64, pmemfs::Whence::Set).unwrap();
    pool.read(handle, out).expect("read succeeds")
}

#[test]
fn basic_create_write_read() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let handle = pool
        .open(&root, "/f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap();
    write_all(&pool, &handle, 0, b"hello");
    drop(handle);

    let handle = pool.open(&root, "/f", OpenFlags::READ_ONLY, 0).unwrap();
    let mut buf = [0u8; 5];
    let n = read_all(&pool, &handle, 0, &mut buf);
    assert_eq!(n, 5);
    assert_eq!(&buf, b"hello");

    let stats = pool.stats();
    assert_eq!(stats.inodes, 2);
    assert_eq!(stats.dir_pages, 1);
    assert_eq!(stats.block_array_pages, 1);
    assert_eq!(stats.block_data_regions, 1);
}

#[test]
fn append_semantics() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let handle = pool
        .open(&root, "/f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap();
    write_all(&pool, &handle, 0, b"abc");
    drop(handle);

    let handle = pool.open(&root, "/f", OpenFlags::READ_ONLY, 0).unwrap();
    let mut buf = [0u8; 6];
    let handle_write = pool.open(&root, "/f", OpenFlags::WRITE_ONLY, 0).unwrap();
    let size_before = pool.fstat(&handle_write.vnode).unwrap().size;
    write_all(&pool, &handle_write, size_before, b"XYZ");
    let n = read_all(&pool, &handle, 0, &mut buf);
    assert_eq!(n, 6);
    assert_eq!(&buf, b"abcXYZ");
}

#[test]
fn hole_then_read() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let handle = pool
        .open(&root, "/f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap();
    write_all(&pool, &handle, 100, b"end");
    drop(handle);

    let handle = pool.open(&root, "/f", OpenFlags::READ_ONLY, 0).unwrap();
    let mut buf = [0u8; 103];
    let n = read_all(&pool, &handle, 0, &mut buf);
    assert_eq!(n, 103);
    assert!(buf[0..100].iter().all(|&b| b == 0));
    assert_eq!(&buf[100..103], b"end");
    assert_eq!(pool.fstat(&handle.vnode).unwrap().size, 103);
}

#[test]
fn mkdir_rmdir_round_trip() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let before = pool.fstat(&root).unwrap();

    pool.mkdir(&root, "/d", 0o755).unwrap();
    let d = pool.resolve(&root, "/d").unwrap().target.unwrap();
    let d_stat = pool.fstat(&d).unwrap();
    assert_eq!(d_stat.nlink, 2);
    let root_after_mkdir = pool.fstat(&root).unwrap();
    assert_eq!(root_after_mkdir.nlink, before.nlink + 1);

    pool.rmdir(&root, "/d").unwrap();
    let root_after_rmdir = pool.fstat(&root).unwrap();
    assert_eq!(root_after_rmdir.nlink, before.nlink);
    assert!(pool.resolve(&root, "/d").unwrap().target.is_none());
}

#[test]
fn duplicate_create_fails_exists() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::EXCLUSIVE;
    pool.open(&root, "/f", flags, 0o644).unwrap();
    let err = pool.open(&root, "/f", flags, 0o644).unwrap_err();
    assert_eq!(err, pmemfs::PmemfsError::Exists);
}

#[test]
fn oversized_name_fails_without_allocating() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let before = pool.stats().inodes;
    let long_name = "x".repeat(300);
    let path = format!("/{long_name}");
    let err = pool
        .open(&root, &path, OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap_err();
    assert_eq!(err, pmemfs::PmemfsError::NameTooLong);
    assert_eq!(pool.stats().inodes, before);
}

#[test]
fn link_then_unlink_leaves_original_untouched() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let handle = pool
        .open(&root, "/a", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap();
    write_all(&pool, &handle, 0, b"abc");
    drop(handle);

    pool.link(&root, "/a", "/b").unwrap();
    pool.unlink(&root, "/b").unwrap();

    let handle = pool.open(&root, "/a", OpenFlags::READ_ONLY, 0).unwrap();
    let mut buf = [0u8; 3];
    let n = read_all(&pool, &handle, 0, &mut buf);
    assert_eq!(n, 3);
    assert_eq!(&buf, b"abc");
    let stat = pool.fstat(&handle.vnode).unwrap();
    assert_eq!(stat.nlink, 1);
}

#[test]
fn unlink_while_open_keeps_data_until_close() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let handle = pool
        .open(&root, "/f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap();
    write_all(&pool, &handle, 0, b"data");
    let read_handle = pool.open(&root, "/f", OpenFlags::READ_ONLY, 0).unwrap();
    pool.close(handle).unwrap();

    pool.unlink(&root, "/f").unwrap();
    assert!(pool.resolve(&root, "/f").unwrap().target.is_none());

    let mut buf = [0u8; 4];
    let n = read_all(&pool, &read_handle, 0, &mut buf);
    assert_eq!(n, 4);
    assert_eq!(&buf, b"data");

    let stats_before_close = pool.stats();
    pool.close(read_handle).unwrap();
    let stats_after_close = pool.stats();
    assert_eq!(stats_after_close.inodes, stats_before_close.inodes - 1);
    assert_eq!(
        stats_after_close.block_array_pages,
        stats_before_close.block_array_pages - 1
    );
}

#[test]
fn lseek_data_and_hole_follow_offset_size_rule() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let handle = pool
        .open(&root, "/f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap();
    write_all(&pool, &handle, 0, b"hello");
    let size = pool.fstat(&handle.vnode).unwrap().size as i64;

    assert_eq!(pool.lseek(&handle, 2, pmemfs::Whence::Set).unwrap(), 2);
    assert_eq!(pool.lseek(&handle, 1, pmemfs::Whence::Current).unwrap(), 3);
    assert_eq!(pool.lseek(&handle, 0, pmemfs::Whence::End).unwrap(), size as u64);
    assert_eq!(pool.lseek(&handle, 2, pmemfs::Whence::Data).unwrap(), 2);
    assert_eq!(pool.lseek(&handle, size, pmemfs::Whence::Hole).unwrap(), size as u64);
    assert_eq!(
        pool.lseek(&handle, size + 1, pmemfs::Whence::Data).unwrap_err(),
        pmemfs::PmemfsError::NoXsiData
    );
    assert_eq!(
        pool.lseek(&handle, size + 1, pmemfs::Whence::Hole).unwrap_err(),
        pmemfs::PmemfsError::NoXsiData
    );
}

#[test]
fn fcntl_getfl_reports_stored_flags() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::APPEND;
    let handle = pool.open(&root, "/f", flags, 0o644).unwrap();
    assert_eq!(pool.fcntl(&handle, pmemfs::FcntlOp::GetFl), flags.bits());
    assert_eq!(pool.fcntl(&handle, pmemfs::FcntlOp::SetLk), 0);
    assert_eq!(pool.fcntl(&handle, pmemfs::FcntlOp::Unlck), 0);
}

#[test]
fn getcwd_reports_absolute_path_after_chdir() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    assert_eq!(pool.getcwd().unwrap(), "/");

    pool.mkdir(&root, "/a", 0o755).unwrap();
    pool.mkdir(&root, "/a/b", 0o755).unwrap();
    pool.chdir("/a/b").unwrap();
    assert_eq!(pool.getcwd().unwrap(), "/a/b");
}

#[test]
fn directory_enumeration_sees_every_entry_once() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    for name in ["/f1", "/f2", "/f3"] {
        pool.open(&root, name, OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
            .unwrap();
    }
    let dir_head = pool
        .arena
        .with(root.inode_ref, |i: &DiskInode| i.dir_head())
        .unwrap()
        .unwrap();
    let entries = pmemfs::dir_engine::enumerate(&pool.arena, dir_head).unwrap();
    let names: Vec<String> = entries
        .iter()
        .map(|e| String::from_utf8(e.name.clone()).unwrap())
        .collect();
    for expect in ["f1", "f2", "f3", ".", ".."] {
        assert!(names.contains(&expect.to_string()), "missing {expect}");
    }

    let mut buf = vec![0u8; 4096];
    let (consumed, _) = pmemfs::dir_engine::encode_getdents64(&mut buf, &entries);
    assert_eq!(consumed, entries.len());
    let (consumed_again, written_again) = pmemfs::dir_engine::encode_getdents64(&mut buf, &[]);
    assert_eq!(consumed_again, 0);
    assert_eq!(written_again, 0);
}

#[test]
fn getdents_on_directory_handle_drains_every_entry_once() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    for name in ["/f1", "/f2"] {
        pool.open(&root, name, OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
            .unwrap();
    }
    let dir_handle = pool
        .open(&root, "/", OpenFlags::READ_ONLY | OpenFlags::DIRECTORY, 0)
        .unwrap();

    let mut buf = vec![0u8; 4096];
    let n = pool.getdents64(&dir_handle, &mut buf).unwrap();
    assert!(n > 0);
    // Offset now sits past every entry; a second call drains nothing.
    let n_again = pool.getdents64(&dir_handle, &mut buf).unwrap();
    assert_eq!(n_again, 0);
}

#[test]
fn truncate_via_pool_api_frees_blocks_and_resets_size() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let handle = pool
        .open(&root, "/f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap();
    write_all(&pool, &handle, 0, b"hello world");
    assert_eq!(pool.fstat(&handle.vnode).unwrap().size, 11);

    pool.truncate(&handle.vnode).unwrap();
    assert_eq!(pool.fstat(&handle.vnode).unwrap().size, 0);

    write_all(&pool, &handle, 0, b"new");
    let mut buf = [0u8; 3];
    let n = read_all(&pool, &handle, 0, &mut buf);
    assert_eq!(n, 3);
    assert_eq!(&buf, b"new");
}

#[test]
fn truncate_frees_chain_pages_but_keeps_the_head_page() {
    // An explicit small block size forces many blocks for one write, so it
    // spans more than one `BlockArrayPage` (32 slots per page); truncating
    // must then free every chained page beyond the head while the head page
    // itself survives — SPEC_FULL.md §8 scenario 6 "block-array pages freed
    // except the head".
    let config = Config {
        block_size: pmemfs::rw::BlockSizePolicy::Explicit(64 * 1024),
        ..Config::default()
    };
    let pool = Pool::format(POOL_BYTES, config).unwrap();
    let root = pool.root_vnode();
    let handle = pool
        .open(&root, "/f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap();
    let big = vec![3u8; 4 * 1024 * 1024];
    write_all(&pool, &handle, 0, &big);
    let stats_before = pool.stats();
    assert!(stats_before.block_array_pages > 1, "write should span multiple block-array pages");

    pool.truncate(&handle.vnode).unwrap();
    assert_eq!(pool.fstat(&handle.vnode).unwrap().size, 0);
    let stats_after = pool.stats();
    assert_eq!(stats_after.block_array_pages, 1, "head page survives truncate");
    assert_eq!(stats_after.block_data_regions, 0);

    write_all(&pool, &handle, 0, b"new");
    let mut buf = [0u8; 3];
    let n = read_all(&pool, &handle, 0, &mut buf);
    assert_eq!(n, 3);
    assert_eq!(&buf, b"new");
}

#[test]
fn unlink_while_open_reuses_orphan_slots_after_close() {
    // Every unlink-while-open followed by close must clear the orphan-list
    // slot it used; otherwise repeated cycles past one page's worth of slots
    // (`ORPHANS_PER_PAGE`) would keep allocating new orphan pages forever
    // instead of reusing cleared ones (SPEC_FULL.md §3).
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    for i in 0..(pmemfs::param::ORPHANS_PER_PAGE + 5) {
        let name = format!("/f{i}");
        let handle = pool
            .open(&root, &name, OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
            .unwrap();
        let read_handle = pool.open(&root, &name, OpenFlags::READ_ONLY, 0).unwrap();
        pool.unlink(&root, &name).unwrap();
        pool.close(handle).unwrap();
        pool.close(read_handle).unwrap();
    }
    assert_eq!(pool.stats().orphan_pages, 1);
}

#[test]
fn aborted_write_leaves_no_trace() {
    // A capacity too small to hold the second write's blocks forces
    // `write_at` to fail partway through; the transaction must then roll
    // back every allocation and mutation it made before the error, leaving
    // the inode exactly as it was before the call.
    let pool = Pool::format(48 * 1024, Config::default()).unwrap();
    let root = pool.root_vnode();
    let handle = pool
        .open(&root, "/f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap();
    write_all(&pool, &handle, 0, b"abc");

    let stat_before = pool.fstat(&handle.vnode).unwrap();
    let stats_before = pool.stats();

    ensure_block_index(&pool, &handle);
    let too_big = vec![9u8; 4 * 1024 * 1024];
    {
        // The write lock is taken before the transaction begins and dropped
        // only after the transaction has finished rolling back, matching the
        // unlock-on-commit/abort discipline `Pool::write` itself follows.
        let mut state = handle.vnode.lock.write();
        let mut tx = pool.arena.begin();
        let state_ref = &mut *state;
        let result = pmemfs::rw::write_at(
            &mut tx,
            handle.vnode.inode_ref,
            state_ref.block_index.as_mut().unwrap(),
            &mut state_ref.free_cursor,
            pool.config.block_size,
            stat_before.size,
            &too_big,
            Timestamp::default(),
        );
        assert!(result.is_err());
        // `tx` drops here without a `commit()` call, rolling back every
        // allocation and mutation the failed write made, before `state` drops.
        drop(tx);
    }

    let stat_after = pool.fstat(&handle.vnode).unwrap();
    assert_eq!(stat_after.size, stat_before.size);
    assert_eq!(stat_after.mtime.sec, stat_before.mtime.sec);
    let stats_after = pool.stats();
    assert_eq!(stats_after.inodes, stats_before.inodes);
    assert_eq!(stats_after.block_array_pages, stats_before.block_array_pages);
    assert_eq!(stats_after.block_data_regions, stats_before.block_data_regions);

    // The pool is still usable afterward: a small write should still succeed.
    write_all(&pool, &handle, stat_before.size, b"more");
    let mut buf = [0u8; 7];
    let n = read_all(&pool, &handle, 0, &mut buf);
    assert_eq!(n, 7);
    assert_eq!(&buf, b"abcmore");
}

#[test]
fn truncate_and_rewrite() {
    let pool = Pool::format(POOL_BYTES, Config::default()).unwrap();
    let root = pool.root_vnode();
    let handle = pool
        .open(&root, "/f", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o644)
        .unwrap();
    let big = vec![7u8; 1024 * 1024];
    write_all(&pool, &handle, 0, &big);
    drop(handle);

    let handle = pool
        .open(&root, "/f", OpenFlags::WRITE_ONLY | OpenFlags::TRUNCATE, 0)
        .unwrap();
    assert_eq!(pool.fstat(&handle.vnode).unwrap().size, 0);
    write_all(&pool, &handle, 0, b"abcd");
    assert_eq!(pool.fstat(&handle.vnode).unwrap().size, 4);
}
