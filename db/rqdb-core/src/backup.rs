///
/// # Snapshot and Restore
///
/// Both directions go through SQLite's online-backup API, which copies pages
/// from a live connection and works the same for file-backed and in-memory
/// sources.
///
/// `backup` holds the handle's connection lock while copying, so writers on
/// the same handle wait until the snapshot is complete and the copy reflects
/// the database exactly as of the call. Other processes writing the same
/// file are handled by the backup step loop, which sleeps `step_delay`
/// whenever the source is busy and restarts if the source changes.
///

use std::path::Path;
use std::thread;

use rusqlite::backup::{Backup, StepResult};
use rusqlite::{Connection, OpenFlags};

use crate::config::BackupConfig;
use crate::db::Database;
use crate::dsn::MEMORY_PATH;
use crate::errors::{DbError, Result};

impl Database {
    /// Writes a consistent snapshot of the database to `destination`.
    ///
    /// An existing database at `destination` is overwritten.
    pub fn backup(&self, destination: impl AsRef<Path>) -> Result<()> {
        let destination = destination.as_ref();
        let dest = destination.to_string_lossy().into_owned();
        let backup_err = |e: rusqlite::Error| DbError::Backup {
            path: dest.clone(),
            reason: e.to_string(),
        };

        tracing::info!(source = %self.path(), destination = %dest, "starting backup");

        let mut dst = Connection::open(destination).map_err(backup_err)?;
        self.with_conn(|src| copy_pages(src, &mut dst, &self.backup).map_err(backup_err))?;
        dst.close().map_err(|(_, e)| backup_err(e))?;

        tracing::info!(destination = %dest, "backup complete");
        Ok(())
    }

    /// Opens an in-memory database and loads into it the contents of the
    /// database file at `path`.
    pub fn load_in_memory_with_dsn(path: impl AsRef<Path>, dsn: &str) -> Result<Self> {
        let path = path.as_ref();
        let src = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|e| {
            DbError::Open {
                locator: path.to_string_lossy().into_owned(),
                reason: e.to_string(),
            }
        })?;

        let db = Self::open_locator(MEMORY_PATH.to_string(), dsn, true)?;
        {
            let mut guard = db.lock()?;
            let dst = guard.as_mut().ok_or_else(DbError::closed)?;
            copy_pages(&src, dst, &db.backup).map_err(|e| DbError::Open {
                locator: path.to_string_lossy().into_owned(),
                reason: e.to_string(),
            })?;
        }

        tracing::info!(source = %path.display(), "loaded database into memory");
        Ok(db)
    }
}

/// Copies every page of `src` into `dst`. A negative `pages_per_step`
/// copies the whole database in a single step.
fn copy_pages(src: &Connection, dst: &mut Connection, config: &BackupConfig) -> rusqlite::Result<()> {
    let backup = Backup::new(src, dst)?;
    loop {
        match backup.step(config.pages_per_step)? {
            StepResult::Done => return Ok(()),
            StepResult::More => {}
            _ => thread::sleep(config.step_delay()),
        }
    }
}
