//! Pool-wide tunables.
//!
//! Mirrors the source's `param.h` style: one flat module of constants that
//! every layer imports, rather than threading magic numbers through the call
//! stack. Values that the source treats as runtime-configurable knobs (block
//! size mode, relative-atime window) are *not* here — they live on
//! [`crate::pool::Config`] instead.

/// Maximum length of a single path component, not counting the NUL
/// terminator. Fixed at format time; part of the on-disk dirent layout.
pub const NAME_MAX: usize = 255;

/// Maximum number of dirent slots held inline in one directory page.
pub const DIRENTS_PER_PAGE: usize = 32;

/// Maximum number of block descriptor slots held inline in one block-array
/// page.
pub const BLOCKS_PER_PAGE: usize = 32;

/// Maximum number of inode-refs held inline in one orphan-list page.
pub const ORPHANS_PER_PAGE: usize = 64;

/// Auto block-size classes (mode 0), smallest to largest.
pub const AUTO_BLOCK_SIZES: [u64; 4] = [16 * 1024, 256 * 1024, 4 * 1024 * 1024, 64 * 1024 * 1024];

/// Remaining-write-length thresholds that select among [`AUTO_BLOCK_SIZES`].
pub const AUTO_BLOCK_THRESHOLDS: [u64; 3] = [4 * 1024, 64 * 1024, 1024 * 1024];

/// Lower clamp for power-of-two block sizing (mode 1) and the minimum
/// explicit allocation accepted anywhere in the block allocator.
pub const MIN_BLOCK_SIZE: u64 = 4 * 1024;

/// Upper clamp for power-of-two block sizing (mode 1).
pub const MAX_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Smallest explicit block size the allocator accepts.
pub const MIN_EXPLICIT_BLOCK_SIZE: u64 = 2;

/// Largest explicit block size the allocator accepts (2^31 - 1).
pub const MAX_EXPLICIT_BLOCK_SIZE: u64 = (1u64 << 31) - 1;

/// Fill byte used to poison freshly allocated block data in debug builds.
pub const DEBUG_POISON_BYTE: u8 = 0x66;

/// Default relative-atime window: an access timestamp is refreshed only if
/// it trails ctime, mtime, or "now" by at least this much.
pub const DEFAULT_RELATIME_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Root inode number, fixed by the pool formatter.
pub const ROOT_INODE: u64 = 1;

static_assertions::const_assert!(DIRENTS_PER_PAGE > 0);
static_assertions::const_assert!(BLOCKS_PER_PAGE > 0);
static_assertions::const_assert!(ORPHANS_PER_PAGE > 0);
static_assertions::const_assert_eq!(AUTO_BLOCK_SIZES.len(), AUTO_BLOCK_THRESHOLDS.len() + 1);
static_assertions::const_assert!(MIN_BLOCK_SIZE < MAX_BLOCK_SIZE);
static_assertions::const_assert!(MIN_EXPLICIT_BLOCK_SIZE < MAX_EXPLICIT_BLOCK_SIZE);
