//!
//! rqdb-stats - Statistics Counters and Timing
//!
//! The database layer reports activity through the [`StatsSink`] trait rather
//! than a process-wide registry, so every handle can be wired to its own
//! collector and tests can substitute a recording fake.
//!
//! ## Counters
//!
//! - `executions` - statements submitted to `execute`
//! - `execution_errors` - statements that failed inside `execute`
//! - `queries` - statements submitted to `query`
//! - `execute_transactions` - transactional `execute` batches
//! - `query_transactions` - transactional `query` batches
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rqdb_stats::{Counter, Counters, StatsSink};
//!
//! let counters = Arc::new(Counters::new());
//! counters.increment(Counter::Executions.name(), 3);
//! assert_eq!(counters.get(Counter::Executions), 3);
//! ```
//!

pub mod counters;
pub mod timing;

pub use counters::{Counter, Counters, NoopSink, StatsSink, StatsSnapshot};
pub use timing::Stopwatch;
