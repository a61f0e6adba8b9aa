//! Named locks.
//!
//! A thin wrapper over `parking_lot`'s primitives that keeps the source's
//! convention of giving every lock a `&'static str` name for debugging and
//! deadlock diagnosis, without the source's sleep/spin distinction: on a
//! preemptively scheduled host OS there is no kernel to park a thread in, so
//! a single parking_lot-backed implementation serves every lock class in
//! this crate (per-handle mutex, per-vnode rwlock, pool lock, §5).

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A named mutual-exclusion lock.
pub struct NamedMutex<T> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> NamedMutex<T> {
    pub const fn new(name: &'static str, data: T) -> Self {
        Self {
            name,
            inner: Mutex::new(data),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }
}

/// A named reader/writer lock.
pub struct NamedRwLock<T> {
    name: &'static str,
    inner: RwLock<T>,
}

impl<T> NamedRwLock<T> {
    pub const fn new(name: &'static str, data: T) -> Self {
        Self {
            name,
            inner: RwLock::new(data),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        log::trace!("{}: acquiring write lock", self.name);
        self.inner.write()
    }
}
