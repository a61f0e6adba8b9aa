//! Error taxonomy.
//!
//! One enum for the whole crate, matching POSIX errno groupings: validation,
//! lookup, and resource errors are all distinguishable so callers can match
//! on them, but they all carry through the same `Result` plumbing.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PmemfsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotDirectory,
    #[error("is a directory")]
    IsDirectory,
    #[error("file exists")]
    Exists,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("bad file descriptor")]
    BadHandle,
    #[error("permission denied")]
    AccessDenied,
    #[error("name too long")]
    NameTooLong,
    #[error("directory not empty")]
    NotEmpty,
    #[error("no space left on device")]
    NoSpace,
    #[error("out of memory")]
    NoMemory,
    #[error("no such device or address")]
    NoXsiData,
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

pub type Result<T> = core::result::Result<T, PmemfsError>;

/// Installed at the public API boundary (every `Pool` method): turns a
/// fatal `Internal` invariant violation into a panic instead of letting it
/// propagate as an ordinary error return, matching SPEC_FULL.md §7's "fatal
/// errors abort the process" classification.
pub trait ResultExt<T> {
    fn or_abort(self) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn or_abort(self) -> Result<T> {
        if let Err(PmemfsError::Internal(msg)) = &self {
            panic!("pmemfs: internal invariant violated: {msg}");
        }
        self
    }
}

impl PmemfsError {
    /// Maps this error onto the POSIX errno mnemonic used throughout the
    /// external interface description, for callers that want a wire-shaped
    /// return code rather than a Rust enum.
    pub fn errno_name(self) -> &'static str {
        match self {
            PmemfsError::NotFound => "ENOENT",
            PmemfsError::NotDirectory => "ENOTDIR",
            PmemfsError::IsDirectory => "EISDIR",
            PmemfsError::Exists => "EEXIST",
            PmemfsError::InvalidArgument => "EINVAL",
            PmemfsError::BadHandle => "EBADF",
            PmemfsError::AccessDenied => "EACCES",
            PmemfsError::NameTooLong => "ENAMETOOLONG",
            PmemfsError::NotEmpty => "ENOTEMPTY",
            PmemfsError::NoSpace => "ENOSPC",
            PmemfsError::NoMemory => "ENOMEM",
            PmemfsError::NoXsiData => "ENXIO",
            PmemfsError::Internal(_) => "EFAULT",
        }
    }
}
