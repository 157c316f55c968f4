///
/// Named monotonic counters.
///
/// `Counters` holds one `AtomicI64` per known counter. Increments are lock-free
/// and use relaxed ordering: readers only need eventually-consistent totals for
/// introspection, never cross-counter atomicity.
///
/// Counters only ever grow. A negative delta or an unknown counter name is
/// dropped with a warning instead of corrupting the totals.
///

use std::sync::atomic::{AtomicI64, Ordering};

use serde::Serialize;

pub const EXECUTIONS: &str = "executions";
pub const EXECUTION_ERRORS: &str = "execution_errors";
pub const QUERIES: &str = "queries";
pub const EXECUTE_TRANSACTIONS: &str = "execute_transactions";
pub const QUERY_TRANSACTIONS: &str = "query_transactions";

/// Receiver for counter increments emitted by the database layer.
pub trait StatsSink: Send + Sync {
    fn increment(&self, name: &str, delta: i64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    Executions,
    ExecutionErrors,
    Queries,
    ExecuteTransactions,
    QueryTransactions,
}

impl Counter {
    pub const ALL: [Counter; 5] = [
        Counter::Executions,
        Counter::ExecutionErrors,
        Counter::Queries,
        Counter::ExecuteTransactions,
        Counter::QueryTransactions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Counter::Executions => EXECUTIONS,
            Counter::ExecutionErrors => EXECUTION_ERRORS,
            Counter::Queries => QUERIES,
            Counter::ExecuteTransactions => EXECUTE_TRANSACTIONS,
            Counter::QueryTransactions => QUERY_TRANSACTIONS,
        }
    }

    pub fn from_name(name: &str) -> Option<Counter> {
        Counter::ALL.into_iter().find(|c| c.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    values: [AtomicI64; 5],
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: Counter) -> i64 {
        self.values[counter.index()].load(Ordering::Relaxed)
    }

    pub fn add(&self, counter: Counter, delta: i64) {
        if delta < 0 {
            tracing::warn!(counter = counter.name(), delta, "ignoring negative counter delta");
            return;
        }
        self.values[counter.index()].fetch_add(delta, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            executions: self.get(Counter::Executions),
            execution_errors: self.get(Counter::ExecutionErrors),
            queries: self.get(Counter::Queries),
            execute_transactions: self.get(Counter::ExecuteTransactions),
            query_transactions: self.get(Counter::QueryTransactions),
        }
    }
}

impl StatsSink for Counters {
    fn increment(&self, name: &str, delta: i64) {
        match Counter::from_name(name) {
            Some(counter) => self.add(counter, delta),
            None => tracing::warn!(name, "increment of unknown counter"),
        }
    }
}

/// Sink that discards every increment.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl StatsSink for NoopSink {
    fn increment(&self, _name: &str, _delta: i64) {}
}

/// Point-in-time copy of all counters, shaped for an introspection endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub executions: i64,
    pub execution_errors: i64,
    pub queries: i64,
    pub execute_transactions: i64,
    pub query_transactions: i64,
}
