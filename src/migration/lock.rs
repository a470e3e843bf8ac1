//! Migrator lock state and the guard that scopes guarded operations

use crate::migration::{Migrator, Result};
use std::ops::{Deref, DerefMut};

/// Lock state owned by one migrator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Unlocked,
    Locked,
}

/// Lock guard that releases the migrator lock when dropped
///
/// Guarded operations run against the guard. The lock is released on every
/// exit path; [`MigratorLock::release`] surfaces the unlock error, while a
/// guard dropped during unwinding or early return can only log it.
pub(crate) struct MigratorLock<'m> {
    migrator: &'m mut Migrator,
    released: bool,
}

impl<'m> MigratorLock<'m> {
    /// Acquire the migrator lock and create guard
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::AlreadyLocked` if the lock is already held, or
    /// the database engine's error if its lock call fails.
    pub(crate) fn acquire(migrator: &'m mut Migrator) -> Result<Self> {
        migrator.lock()?;

        Ok(Self {
            migrator,
            released: false,
        })
    }

    /// Release the lock explicitly, returning any unlock failure
    pub(crate) fn release(mut self) -> Result<()> {
        self.released = true;
        self.migrator.unlock()
    }
}

impl Deref for MigratorLock<'_> {
    type Target = Migrator;

    fn deref(&self) -> &Migrator {
        &*self.migrator
    }
}

impl DerefMut for MigratorLock<'_> {
    fn deref_mut(&mut self) -> &mut Migrator {
        &mut *self.migrator
    }
}

impl Drop for MigratorLock<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // can't propagate from drop
        if let Err(e) = self.migrator.unlock() {
            log::error!("Failed to release migrator lock: {e}");
        }
    }
}
