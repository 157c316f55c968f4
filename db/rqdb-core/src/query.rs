///
/// # Query Engine
///
/// Runs batches of read statements and returns one `RowSet` per attempted
/// statement. Batching, transaction and timing rules are the same as for
/// `execute`: a transactional batch stops and rolls back at the first
/// failure, a non-transactional batch reports every statement. Each entry
/// must hold exactly one statement, and a transactional batch refuses
/// statements that would commit or roll back its transaction.
///
/// Column types are the declared types from the table schema, lowercased, or
/// `""` for expressions. Every row is passed through the normalizer against
/// those types before it is stored.
///

use rqdb_stats::{counters, Stopwatch};
use rusqlite::{Batch, Connection};

use crate::db::Database;
use crate::errors::{DbError, Result};
use crate::execute::{ends_transaction, TRANSACTION_CONTROL, TRANSACTION_ENDED};
use crate::normalize::normalize_row;
use crate::result::RowSet;
use crate::value::Value;

impl Database {
    pub fn query<S: AsRef<str>>(
        &self,
        statements: &[S],
        use_transaction: bool,
        record_timing: bool,
    ) -> Result<Vec<RowSet>> {
        self.stats.increment(counters::QUERIES, statements.len() as i64);
        if use_transaction {
            self.stats.increment(counters::QUERY_TRANSACTIONS, 1);
            self.query_in_transaction(statements, record_timing)
        } else {
            self.query_each(statements, record_timing)
        }
    }

    fn query_in_transaction<S: AsRef<str>>(
        &self,
        statements: &[S],
        record_timing: bool,
    ) -> Result<Vec<RowSet>> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or_else(DbError::closed)?;
        let tx = conn.transaction().map_err(DbError::engine)?;

        let mut all_rows = Vec::with_capacity(statements.len());
        for sql in statements {
            let rows = run_one(&tx, sql.as_ref(), true, record_timing);
            let failed = rows.is_error();
            if !failed && tx.is_autocommit() {
                all_rows.push(RowSet::failed(TRANSACTION_ENDED.to_string()));
                tracing::warn!(attempted = all_rows.len(), "transaction ended inside query batch");
                return Ok(all_rows);
            }
            all_rows.push(rows);
            if failed {
                if tx.is_autocommit() {
                    drop(tx);
                } else {
                    tx.rollback().map_err(DbError::engine)?;
                }
                tracing::warn!(
                    attempted = all_rows.len(),
                    total = statements.len(),
                    "query batch failed, transaction rolled back"
                );
                return Ok(all_rows);
            }
        }

        tx.commit().map_err(DbError::engine)?;
        Ok(all_rows)
    }

    fn query_each<S: AsRef<str>>(&self, statements: &[S], record_timing: bool) -> Result<Vec<RowSet>> {
        let mut all_rows = Vec::with_capacity(statements.len());
        for sql in statements {
            let rows = self.with_conn(|conn| Ok(run_one(conn, sql.as_ref(), false, record_timing)))?;
            all_rows.push(rows);
        }
        Ok(all_rows)
    }
}

fn run_one(conn: &Connection, sql: &str, in_transaction: bool, record_timing: bool) -> RowSet {
    let sw = Stopwatch::start();
    match query_statement(conn, sql, in_transaction) {
        Ok(mut rows) => {
            rows.time = record_timing.then(|| sw.elapsed_secs());
            rows
        }
        Err(e) => {
            let message = e.into_message();
            tracing::debug!(sql, error = %message, "query failed");
            RowSet::failed(message)
        }
    }
}

fn query_statement(conn: &Connection, sql: &str, in_transaction: bool) -> Result<RowSet> {
    if sql.trim().is_empty() {
        return Ok(RowSet::default());
    }
    tracing::debug!(sql, "query");

    let mut batch = Batch::new(conn, sql);
    let Some(mut stmt) = batch.next().map_err(DbError::statement)? else {
        return Ok(RowSet::default());
    };
    if batch.next().map_err(DbError::statement)?.is_some() {
        return Err(DbError::Statement(
            "multiple statements in one query are not supported".to_string(),
        ));
    }
    if in_transaction && ends_transaction(&stmt) {
        return Err(DbError::Statement(TRANSACTION_CONTROL.to_string()));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let types: Vec<String> = stmt
        .columns()
        .iter()
        .map(|c| c.decl_type().unwrap_or("").to_ascii_lowercase())
        .collect();

    let mut values = Vec::new();
    let mut rows = stmt.query([]).map_err(DbError::statement)?;
    while let Some(row) = rows.next().map_err(DbError::statement)? {
        let raw = (0..columns.len())
            .map(|i| row.get_ref(i).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(DbError::statement)?;
        values.push(normalize_row(raw, &types));
    }

    Ok(RowSet {
        columns,
        types,
        values,
        error: None,
        time: None,
    })
}
