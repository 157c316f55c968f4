///
/// # Execution Engine
///
/// Runs batches of statements that modify the database and reports one
/// `ExecutionResult` per attempted statement.
///
/// ## Transactional Batches
///
/// The whole batch runs inside one transaction while holding the connection
/// lock. The first failing statement ends the batch: the transaction is
/// rolled back, the failing statement's result carries the error, and the
/// statements after it are not attempted. If every statement succeeds the
/// transaction commits. A statement that would commit or roll back the
/// wrapping transaction (`COMMIT`, `END`, `ROLLBACK`) is refused as a
/// failure before it runs. Should the transaction end anyway, the batch stops
/// there and that statement is reported as failed.
///
/// A statement string may hold several `;`-separated statements. They all
/// run, and the result reports the summed row count and the last rowid.
///
/// ## Non-transactional Batches
///
/// Each statement runs on its own, with the lock taken per statement. A
/// failure is recorded and the batch moves on.
///
/// ## Counters
///
/// `executions` grows by the batch size up front, `execute_transactions` by
/// one per transactional batch, and `execution_errors` by one per failure.
///

use rqdb_stats::{counters, Stopwatch};
use rusqlite::{Batch, Connection, Statement};

use crate::db::Database;
use crate::errors::{DbError, Result};
use crate::result::ExecutionResult;

impl Database {
    pub fn execute<S: AsRef<str>>(
        &self,
        statements: &[S],
        use_transaction: bool,
        record_timing: bool,
    ) -> Result<Vec<ExecutionResult>> {
        self.stats.increment(counters::EXECUTIONS, statements.len() as i64);
        if use_transaction {
            self.stats.increment(counters::EXECUTE_TRANSACTIONS, 1);
            self.execute_in_transaction(statements, record_timing)
        } else {
            self.execute_each(statements, record_timing)
        }
    }

    fn execute_in_transaction<S: AsRef<str>>(
        &self,
        statements: &[S],
        record_timing: bool,
    ) -> Result<Vec<ExecutionResult>> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or_else(DbError::closed)?;
        let tx = conn.transaction().map_err(DbError::engine)?;

        let mut results = Vec::with_capacity(statements.len());
        for sql in statements {
            let result = self.run_one(&tx, sql.as_ref(), true, record_timing);
            let failed = result.is_error();
            if !failed && tx.is_autocommit() {
                self.stats.increment(counters::EXECUTION_ERRORS, 1);
                results.push(ExecutionResult::failed(TRANSACTION_ENDED.to_string()));
                tracing::warn!(attempted = results.len(), "transaction ended inside execute batch");
                return Ok(results);
            }
            results.push(result);
            if failed {
                if tx.is_autocommit() {
                    // The engine already rolled back, e.g. ON CONFLICT ROLLBACK.
                    drop(tx);
                } else {
                    tx.rollback().map_err(DbError::engine)?;
                }
                tracing::warn!(
                    attempted = results.len(),
                    total = statements.len(),
                    "execute batch failed, transaction rolled back"
                );
                return Ok(results);
            }
        }

        tx.commit().map_err(DbError::engine)?;
        tracing::debug!(statements = statements.len(), "execute batch committed");
        Ok(results)
    }

    fn execute_each<S: AsRef<str>>(
        &self,
        statements: &[S],
        record_timing: bool,
    ) -> Result<Vec<ExecutionResult>> {
        let mut results = Vec::with_capacity(statements.len());
        for sql in statements {
            let result = self.with_conn(|conn| Ok(self.run_one(conn, sql.as_ref(), false, record_timing)))?;
            results.push(result);
        }
        Ok(results)
    }

    fn run_one(
        &self,
        conn: &Connection,
        sql: &str,
        in_transaction: bool,
        record_timing: bool,
    ) -> ExecutionResult {
        let sw = Stopwatch::start();
        match exec_statement(conn, sql, in_transaction) {
            Ok((last_insert_id, rows_affected)) => ExecutionResult {
                last_insert_id,
                rows_affected,
                error: None,
                time: record_timing.then(|| sw.elapsed_secs()),
            },
            Err(e) => {
                self.stats.increment(counters::EXECUTION_ERRORS, 1);
                let message = e.into_message();
                tracing::debug!(sql, error = %message, "statement failed");
                ExecutionResult::failed(message)
            }
        }
    }
}

pub(crate) const TRANSACTION_ENDED: &str = "transaction ended inside batch";
pub(crate) const TRANSACTION_CONTROL: &str =
    "cannot commit or roll back the enclosing transaction inside a batch";

/// Runs every statement in `sql` to completion, discarding any rows they
/// produce. Returns the last inserted rowid and the number of rows changed,
/// both zero when nothing was written.
fn exec_statement(conn: &Connection, sql: &str, in_transaction: bool) -> Result<(i64, i64)> {
    if sql.trim().is_empty() {
        return Ok((0, 0));
    }
    tracing::debug!(sql, "execute");

    let mut last_insert_id = 0;
    let mut rows_affected = 0;
    let mut batch = Batch::new(conn, sql);
    while let Some(mut stmt) = batch.next().map_err(DbError::statement)? {
        if in_transaction && ends_transaction(&stmt) {
            return Err(DbError::Statement(TRANSACTION_CONTROL.to_string()));
        }
        // changes() and last_insert_rowid() keep the values of the last
        // write on the connection, so only trust them if this statement wrote.
        let before = total_changes(conn)?;
        {
            let mut rows = stmt.query([]).map_err(DbError::statement)?;
            while rows.next().map_err(DbError::statement)?.is_some() {}
        }
        if total_changes(conn)? != before {
            rows_affected += conn.changes() as i64;
            last_insert_id = conn.last_insert_rowid();
        }
    }
    Ok((last_insert_id, rows_affected))
}

fn total_changes(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT total_changes()", [], |row| row.get(0))
        .map_err(DbError::statement)
}

/// Whether a prepared statement commits or rolls back the open transaction.
/// `ROLLBACK TO` only unwinds to a savepoint and is allowed.
pub(crate) fn ends_transaction(stmt: &Statement<'_>) -> bool {
    stmt.expanded_sql()
        .is_some_and(|sql| is_transaction_end(&sql))
}

fn is_transaction_end(sql: &str) -> bool {
    let mut words = skip_comments(sql)
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_uppercase);
    match words.next().as_deref() {
        Some("COMMIT") | Some("END") => true,
        Some("ROLLBACK") => {
            let mut next = words.next();
            if next.as_deref() == Some("TRANSACTION") {
                next = words.next();
            }
            next.as_deref() != Some("TO")
        }
        _ => false,
    }
}

fn skip_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return sql;
        }
    }
}
