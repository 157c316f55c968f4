///
/// Per-statement result structures.
///
/// These are the serialization contract handed to the transport layer.
/// Fields that are logically unset are skipped, never written as `null` or
/// zero, so a successful INSERT with timing off encodes as
/// `{"last_insert_id":1,"rows_affected":1}` and a failure as
/// `{"error":"..."}`.
///

use serde::Serialize;

use crate::value::Value;

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// Outcome of one statement in an `execute` batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    #[serde(skip_serializing_if = "is_zero")]
    pub last_insert_id: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub rows_affected: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

impl ExecutionResult {
    pub fn failed(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Rows returned by one statement in a `query` batch.
///
/// `types` runs parallel to `columns`, and every row in `values` has one
/// entry per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

impl RowSet {
    pub fn failed(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
