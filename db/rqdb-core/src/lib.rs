///
/// # rqdb-core — Batch SQL execution over embedded SQLite
///
/// This crate is the layer a replicated store uses to apply statement batches
/// to local state and to answer reads. It owns one SQLite connection per
/// handle and returns plain, serializable result structures that a transport
/// layer can ship as JSON.
///
/// ## Library Usage
///
/// ```rust,ignore
/// use rqdb_core::Database;
///
/// let db = Database::open_in_memory()?;
/// db.execute(&["CREATE TABLE t(id INT, v TEXT)"], false, false)?;
/// db.execute(&["INSERT INTO t VALUES(1, 'a')"], true, true)?;
/// let rows = db.query(&["SELECT * FROM t"], false, false)?;
/// ```
///
/// ## Batch Semantics
///
/// - Transactional batches stop at the first failing statement and roll
///   back everything before it.
/// - Non-transactional batches run every statement and report each outcome.
/// - Per-statement failures are reported inline in the results; only
///   connection-level failures surface as `Err`.
///

pub mod backup;
pub mod config;
pub mod db;
pub mod dsn;
pub mod errors;
pub mod execute;
pub mod normalize;
pub mod query;
pub mod result;
pub mod value;

pub use config::{BackupConfig, DbConfig};
pub use db::{sqlite_version, Database};
pub use dsn::fqdsn;
pub use errors::{DbError, Result};
pub use normalize::{is_text_type, normalize_row};
pub use result::{ExecutionResult, RowSet};
pub use value::Value;

pub use rqdb_stats::{Counter, Counters, NoopSink, StatsSink, StatsSnapshot};
