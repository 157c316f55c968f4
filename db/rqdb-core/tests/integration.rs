///
/// # Integration Tests for rqdb-core
///
/// End-to-end flows through the public API: create/insert/select round trips,
/// all-or-nothing transactional batches verified by checksumming a full dump,
/// independent statement batches, counter accounting through an injected
/// sink, backups taken while writes continue, and concurrent batches on one
/// shared handle.
///

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::json;
use tempfile::TempDir;

use rqdb_core::{Counter, Counters, Database, DbConfig, StatsSink, Value};

/// Records every increment so tests can assert on the exact calls.
#[derive(Default)]
struct RecordingSink {
    totals: Mutex<HashMap<String, i64>>,
    calls: Mutex<Vec<(String, i64)>>,
}

impl RecordingSink {
    fn total(&self, name: &str) -> i64 {
        self.totals.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl StatsSink for RecordingSink {
    fn increment(&self, name: &str, delta: i64) {
        *self.totals.lock().unwrap().entry(name.to_string()).or_insert(0) += delta;
        self.calls.lock().unwrap().push((name.to_string(), delta));
    }
}

/// Hash of every row of every user table, in a stable order.
fn checksum(db: &Database) -> String {
    let tables = db
        .query(
            &["SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name"],
            false,
            false,
        )
        .expect("Failed to list tables");

    let mut hasher = blake3::Hasher::new();
    for row in &tables[0].values {
        let name = row[0].as_str().expect("table name should be text");
        let sql = format!("SELECT * FROM {} ORDER BY rowid", name);
        let dump = db.query(&[sql], false, false).expect("Failed to dump table");
        hasher.update(name.as_bytes());
        hasher.update(serde_json::to_string(&dump[0]).unwrap().as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn count(db: &Database, table: &str) -> i64 {
    let rows = db
        .query(&[format!("SELECT COUNT(*) FROM {}", table)], false, false)
        .expect("Failed to count rows");
    rows[0].values[0][0].as_i64().expect("count should be an integer")
}

#[test]
fn test_create_insert_select_scenario() {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");

    db.execute(&["CREATE TABLE t(id INT, v TEXT)"], false, false)
        .expect("Failed to create table");
    let results = db
        .execute(
            &["INSERT INTO t VALUES(1,'a')", "INSERT INTO t VALUES(2,'b')"],
            true,
            false,
        )
        .expect("Failed to insert rows");
    assert!(results.iter().all(|r| r.error.is_none()));

    let rows = db
        .query(&["SELECT * FROM t ORDER BY id"], false, false)
        .expect("Failed to query rows");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].columns, vec!["id", "v"]);
    assert_eq!(rows[0].types, vec!["int", "text"]);
    assert_eq!(
        rows[0].values,
        vec![
            vec![Value::Integer(1), Value::from("a")],
            vec![Value::Integer(2), Value::from("b")],
        ]
    );
    assert_eq!(
        serde_json::to_value(&rows[0]).unwrap(),
        json!({
            "columns": ["id", "v"],
            "types": ["int", "text"],
            "values": [[1, "a"], [2, "b"]]
        })
    );
}

#[test]
fn test_failed_transaction_rolls_back_scenario() {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    db.execute(
        &[
            "CREATE TABLE t(id INT, v TEXT)",
            "INSERT INTO t VALUES(1,'a')",
            "INSERT INTO t VALUES(2,'b')",
        ],
        false,
        false,
    )
    .expect("Failed to seed table");

    let before = checksum(&db);
    let results = db
        .execute(
            &["INSERT INTO t VALUES(3,'c')", "INSERT INTO nonexistent VALUES(1)"],
            true,
            false,
        )
        .expect("Batch should not fail wholesale");

    assert_eq!(results.len(), 2);
    assert!(results[0].error.is_none());
    assert!(results[1].error.is_some());

    let rows = db
        .query(&["SELECT * FROM t WHERE id = 3"], false, false)
        .expect("Failed to query");
    assert!(rows[0].values.is_empty(), "row 3 should have been rolled back");
    assert_eq!(checksum(&db), before, "state must be identical after rollback");
}

#[test]
fn test_rollback_restores_every_kind_of_change() {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    db.execute(
        &[
            "CREATE TABLE a(id INTEGER PRIMARY KEY, v TEXT)",
            "INSERT INTO a(v) VALUES('one')",
            "INSERT INTO a(v) VALUES('two')",
        ],
        true,
        false,
    )
    .unwrap();
    let before = checksum(&db);

    let results = db
        .execute(
            &[
                "UPDATE a SET v = 'changed'",
                "DELETE FROM a WHERE id = 1",
                "CREATE TABLE b(x INT)",
                "INSERT INTO b VALUES(1)",
                "INSERT INTO a(id, v) VALUES(2, 'duplicate')",
            ],
            true,
            false,
        )
        .unwrap();

    assert_eq!(results.len(), 5);
    assert!(results[..4].iter().all(|r| r.error.is_none()));
    assert!(results[4].error.is_some());
    assert_eq!(checksum(&db), before);
}

#[test]
fn test_non_transactional_batch_applies_around_failure() {
    let db = Database::open_in_memory().unwrap();
    db.execute(&["CREATE TABLE t(id INT)"], false, false).unwrap();

    let results = db
        .execute(
            &[
                "INSERT INTO t VALUES(1)",
                "INSERT INTO t VALUES(2)",
                "INSERT INTO nonexistent VALUES(1)",
                "INSERT INTO t VALUES(3)",
            ],
            false,
            false,
        )
        .unwrap();

    let errors: Vec<bool> = results.iter().map(|r| r.error.is_some()).collect();
    assert_eq!(errors, vec![false, false, true, false]);
    assert_eq!(count(&db, "t"), 3);
}

#[test]
fn test_counters_through_injected_sink() {
    let sink = Arc::new(RecordingSink::default());
    let db = Database::open_in_memory().unwrap().with_stats(sink.clone());

    db.execute(&["CREATE TABLE t(id INT)"], false, false).unwrap();
    db.execute(&["INSERT INTO t VALUES(1)", "INSERT INTO t VALUES(2)"], true, false)
        .unwrap();
    db.execute(&["INSERT INTO nope VALUES(1)", "INSERT INTO t VALUES(3)"], false, false)
        .unwrap();
    db.query(&["SELECT * FROM t", "SELECT 1"], true, false).unwrap();
    db.query(&["SELECT * FROM t"], false, false).unwrap();

    assert_eq!(sink.total("executions"), 5);
    assert_eq!(sink.total("execute_transactions"), 1);
    assert_eq!(sink.total("execution_errors"), 1);
    assert_eq!(sink.total("queries"), 3);
    assert_eq!(sink.total("query_transactions"), 1);
    assert!(sink.calls.lock().unwrap().iter().all(|(_, delta)| *delta >= 0));
}

#[test]
fn test_executions_counter_is_monotonic() {
    let counters = Arc::new(Counters::new());
    let db = Database::open_in_memory().unwrap().with_stats(counters.clone());
    db.execute(&["CREATE TABLE t(id INT)"], false, false).unwrap();

    let mut expected = 1;
    let mut last = counters.get(Counter::Executions);
    for k in 1..=5 {
        let batch: Vec<String> = (0..k).map(|i| format!("INSERT INTO t VALUES({})", i)).collect();
        db.execute(&batch, k % 2 == 0, false).unwrap();
        expected += k;
        let now = counters.get(Counter::Executions);
        assert!(now >= last);
        assert_eq!(now, expected);
        last = now;
    }
}

#[test]
fn test_backup_is_point_in_time() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let source_path = dir.path().join("source.db");
    let backup_path = dir.path().join("backup.db");

    let db = Database::open(&source_path).expect("Failed to open source");
    db.execute(
        &[
            "CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)",
            "INSERT INTO t(v) VALUES('before-1')",
            "INSERT INTO t(v) VALUES('before-2')",
        ],
        true,
        false,
    )
    .unwrap();
    let at_backup = checksum(&db);

    db.backup(&backup_path).expect("Failed to back up");
    db.execute(&["INSERT INTO t(v) VALUES('after')", "DELETE FROM t WHERE id = 1"], true, false)
        .unwrap();

    let copy = Database::open(&backup_path).expect("Failed to open backup");
    assert_eq!(checksum(&copy), at_backup);
    assert_eq!(count(&copy, "t"), 2);
    assert_ne!(checksum(&db), at_backup);
}

#[test]
fn test_backup_with_configured_stepping() {
    let dir = TempDir::new().unwrap();
    let config = DbConfig::from_toml_str("[backup]\npages_per_step = 1\nstep_delay_ms = 1").unwrap();
    let db = Database::from_config(&config, Arc::new(Counters::new())).unwrap();

    db.execute(&["CREATE TABLE t(id INTEGER PRIMARY KEY, payload BLOB)"], false, false)
        .unwrap();
    let inserts: Vec<String> = (0..200)
        .map(|_| "INSERT INTO t(payload) VALUES(randomblob(512))".to_string())
        .collect();
    db.execute(&inserts, true, false).unwrap();

    let path = dir.path().join("stepped.db");
    db.backup(&path).unwrap();
    let copy = Database::open(&path).unwrap();
    assert_eq!(count(&copy, "t"), 200);
    assert_eq!(checksum(&copy), checksum(&db));
}

#[test]
fn test_in_memory_data_discarded_on_close() {
    let db = Database::open_in_memory().unwrap();
    db.execute(&["CREATE TABLE t(id INT)"], false, false).unwrap();
    db.close().unwrap();
    db.close().unwrap();

    let fresh = Database::open_in_memory().unwrap();
    let rows = fresh.query(&["SELECT * FROM t"], false, false).unwrap();
    assert!(rows[0].error.as_deref().unwrap().contains("no such table"));
}

#[test]
fn test_file_database_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("durable.db");

    {
        let db = Database::open(&path).unwrap();
        db.execute(&["CREATE TABLE t(id INT)", "INSERT INTO t VALUES(7)"], true, false)
            .unwrap();
        db.close().unwrap();
    }

    let db = Database::open_with_dsn(&path, "mode=ro").unwrap();
    assert_eq!(count(&db, "t"), 1);
    let results = db.execute(&["INSERT INTO t VALUES(8)"], false, false).unwrap();
    assert!(results[0].error.as_deref().unwrap().contains("readonly"));
}

#[test]
fn test_concurrent_transactions_do_not_interleave() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.execute(
        &["CREATE TABLE c(id INTEGER PRIMARY KEY, n INT)", "INSERT INTO c VALUES(1, 0)"],
        false,
        false,
    )
    .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for _ in 0..25 {
                    let results = db
                        .execute(
                            &[
                                "UPDATE c SET n = n + 1 WHERE id = 1",
                                "UPDATE c SET n = n + 1 WHERE id = 1",
                            ],
                            true,
                            false,
                        )
                        .unwrap();
                    assert!(results.iter().all(|r| r.error.is_none()));
                    let rows = db.query(&["SELECT n FROM c WHERE id = 1"], false, false).unwrap();
                    let n = rows[0].values[0][0].as_i64().unwrap();
                    assert_eq!(n % 2, 0, "observed a half-applied transaction");
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("worker panicked");
    }

    let rows = db.query(&["SELECT n FROM c WHERE id = 1"], false, false).unwrap();
    assert_eq!(rows[0].values[0][0], Value::Integer(200));
}

#[test]
fn test_results_serialize_for_transport() {
    let db = Database::open_in_memory().unwrap();
    let results = db
        .execute(
            &["CREATE TABLE t(id INTEGER PRIMARY KEY, b BLOB)", "INSERT INTO t(b) VALUES(x'00ff')", "BAD SQL"],
            false,
            false,
        )
        .unwrap();

    let encoded = serde_json::to_value(&results).unwrap();
    assert_eq!(encoded[0], json!({}));
    assert_eq!(encoded[1], json!({"last_insert_id": 1, "rows_affected": 1}));
    assert!(encoded[2]["error"].as_str().unwrap().contains("syntax error"));

    let rows = db.query(&["SELECT b FROM t"], false, false).unwrap();
    assert_eq!(serde_json::to_value(&rows[0]).unwrap()["values"], json!([["AP8="]]));
}
