//! pmemfs: a user-space filesystem backed by a persistent-memory-style
//! transactional arena, addressed through object-ids rather than pointers.

pub mod arena;
pub mod block_index;
pub mod dir_engine;
pub mod error;
pub mod file;
pub mod fs;
pub mod lock;
pub mod param;
pub mod path;
pub mod pool;
pub mod rw;
pub mod stat;
pub mod vnode;

pub use error::{PmemfsError, Result};
pub use pool::{Config, FcntlOp, Pool, Whence};
