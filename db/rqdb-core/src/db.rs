///
/// # Connection Handle
///
/// `Database` owns exactly one SQLite connection: a file, a private in-memory
/// database, or either of those qualified with driver parameters through the
/// DSN composer.
///
/// ## Locking
///
/// The connection sits behind a `Mutex<Option<Connection>>`. Transactional
/// batches and backups hold the lock for their whole run, so two transactions
/// never interleave on one handle. Non-transactional batches take it once per
/// statement. `None` marks a closed handle.
///
/// ## Lifecycle
///
/// The connection is released when the handle is dropped, or earlier by
/// `close()`. A connection that fails its post-open probe is dropped before
/// `open` returns, so a failed open leaves nothing behind.
///

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rqdb_stats::{Counters, StatsSink};
use rusqlite::Connection;

use crate::config::{BackupConfig, DbConfig};
use crate::dsn::{fqdsn, MEMORY_PATH};
use crate::errors::{DbError, Result};

const FK_CHECKS: &str = "PRAGMA foreign_keys";
const FK_CHECKS_ENABLED: &str = "PRAGMA foreign_keys=ON";
const FK_CHECKS_DISABLED: &str = "PRAGMA foreign_keys=OFF";

/// Version of the linked SQLite library.
pub fn sqlite_version() -> &'static str {
    rusqlite::version()
}

pub struct Database {
    path: String,
    dsn: Option<String>,
    memory: bool,
    conn: Mutex<Option<Connection>>,
    pub(crate) stats: Arc<dyn StatsSink>,
    pub(crate) backup: BackupConfig,
}

impl Database {
    /// Opens a file-backed database, creating it if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_dsn(path, "")
    }

    pub fn open_with_dsn(path: impl AsRef<Path>, dsn: &str) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        Self::open_locator(path, dsn, false)
    }

    /// Opens a private in-memory database. Its contents are gone once the
    /// handle is closed.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_dsn("")
    }

    pub fn open_in_memory_with_dsn(dsn: &str) -> Result<Self> {
        Self::open_locator(MEMORY_PATH.to_string(), dsn, true)
    }

    /// Opens a handle as described by `config`, reporting counters to `stats`.
    pub fn from_config(config: &DbConfig, stats: Arc<dyn StatsSink>) -> Result<Self> {
        config.validate()?;
        let db = if config.memory {
            Self::open_in_memory_with_dsn(&config.dsn)?
        } else {
            Self::open_with_dsn(&config.path, &config.dsn)?
        };
        let mut db = db.with_stats(stats);
        db.backup = config.backup.clone();
        if let Some(enabled) = config.fk_constraints {
            db.enable_fk_constraints(enabled)?;
        }
        Ok(db)
    }

    pub(crate) fn open_locator(path: String, dsn: &str, memory: bool) -> Result<Self> {
        let locator = fqdsn(&path, dsn);
        let open_err = |e: rusqlite::Error| DbError::Open {
            locator: locator.clone(),
            reason: e.to_string(),
        };

        let conn = Connection::open(&locator).map_err(open_err)?;
        // SQLite opens lazily; reading the header here surfaces unwritable
        // paths and non-database files before the handle is handed out.
        conn.query_row("PRAGMA schema_version", [], |row| row.get::<_, i64>(0))
            .map_err(open_err)?;
        // Some SQLite builds enforce foreign keys by default. Handles start
        // with enforcement off until `enable_fk_constraints` says otherwise.
        conn.execute_batch(FK_CHECKS_DISABLED).map_err(open_err)?;

        tracing::info!(locator = %locator, memory, "opened database");

        Ok(Self {
            path,
            dsn: if dsn.is_empty() { None } else { Some(dsn.to_string()) },
            memory,
            conn: Mutex::new(Some(conn)),
            stats: Arc::new(Counters::new()),
            backup: BackupConfig::default(),
        })
    }

    /// Replaces the counter sink this handle reports to.
    pub fn with_stats(mut self, stats: Arc<dyn StatsSink>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_backup_config(mut self, backup: BackupConfig) -> Self {
        self.backup = backup;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn dsn(&self) -> Option<&str> {
        self.dsn.as_deref()
    }

    pub fn is_memory(&self) -> bool {
        self.memory
    }

    /// The locator the connection was opened with.
    pub fn locator(&self) -> String {
        fqdsn(&self.path, self.dsn.as_deref().unwrap_or(""))
    }

    pub fn is_closed(&self) -> bool {
        match self.conn.lock() {
            Ok(guard) => guard.is_none(),
            Err(_) => true,
        }
    }

    /// Closes the underlying connection. Closing a closed handle is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        let Some(conn) = guard.take() else {
            return Ok(());
        };
        match conn.close() {
            Ok(()) => {
                tracing::info!(path = %self.path, "closed database");
                Ok(())
            }
            Err((conn, e)) => {
                *guard = Some(conn);
                Err(DbError::engine(e))
            }
        }
    }

    /// Turns foreign-key enforcement on or off for this connection.
    pub fn enable_fk_constraints(&self, enabled: bool) -> Result<()> {
        let sql = if enabled { FK_CHECKS_ENABLED } else { FK_CHECKS_DISABLED };
        self.with_conn(|conn| {
            conn.execute_batch(sql)
                .map_err(|e| DbError::Config(e.to_string()))
        })?;
        tracing::debug!(enabled, "set foreign key constraints");
        Ok(())
    }

    /// Reads the enforcement state back from the engine.
    pub fn fk_constraints(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.query_row(FK_CHECKS, [], |row| row.get::<_, i64>(0))
                .map(|v| v != 0)
                .map_err(DbError::engine)
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| DbError::Engine("connection lock poisoned".to_string()))
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or_else(DbError::closed)?;
        f(conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("dsn", &self.dsn)
            .field("memory", &self.memory)
            .field("closed", &self.is_closed())
            .finish()
    }
}
