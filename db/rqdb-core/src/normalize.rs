///
/// Affinity-aware value normalization.
///
/// SQLite happily stores a BLOB in a column declared `TEXT`, and the driver
/// hands it back as bytes. Whether those bytes are text or binary can only be
/// decided from the column's declared type, using SQLite's affinity rules:
/// <http://www.sqlite.org/datatype3.html>
///
/// Columns with text affinity have byte values converted to strings. Every
/// other column, BLOB included, passes through untouched.
///

use crate::value::Value;

const TEXT_PREFIXES: [&str; 6] = [
    "varchar",
    "varying character",
    "nchar",
    "native character",
    "nvarchar",
    "clob",
];

/// Returns whether a declared column type carries text affinity.
pub fn is_text_type(decl: &str) -> bool {
    let decl = decl.to_ascii_lowercase();
    decl.is_empty() || decl == "text" || TEXT_PREFIXES.iter().any(|p| decl.starts_with(p))
}

pub fn normalize_value(value: Value, decl: &str) -> Value {
    match value {
        Value::Blob(bytes) if is_text_type(decl) => match String::from_utf8(bytes) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        },
        other => other,
    }
}

/// Normalizes a row against the declared types of its columns.
///
/// A column with no entry in `types` is treated as untyped, which has text
/// affinity.
pub fn normalize_row<T: AsRef<str>>(row: Vec<Value>, types: &[T]) -> Vec<Value> {
    row.into_iter()
        .enumerate()
        .map(|(i, v)| normalize_value(v, types.get(i).map(|t| t.as_ref()).unwrap_or("")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_affinity_types() {
        for decl in [
            "text",
            "",
            "varchar(32)",
            "VARCHAR(255)",
            "varying character(10)",
            "nchar(55)",
            "native character(70)",
            "nvarchar(100)",
            "clob",
            "TEXT",
        ] {
            assert!(is_text_type(decl), "{} should have text affinity", decl);
        }
    }

    #[test]
    fn test_non_text_types() {
        for decl in ["blob", "int", "integer", "real", "numeric", "double", "boolean", "texts"] {
            assert!(!is_text_type(decl), "{} should not have text affinity", decl);
        }
    }

    #[test]
    fn test_varchar_bytes_become_string() {
        let row = normalize_row(vec![Value::Blob(b"hello".to_vec())], &["varchar(32)"]);
        assert_eq!(row, vec![Value::Text("hello".to_string())]);
    }

    #[test]
    fn test_blob_bytes_unchanged() {
        let row = normalize_row(vec![Value::Blob(b"hello".to_vec())], &["blob"]);
        assert_eq!(row, vec![Value::Blob(b"hello".to_vec())]);
    }

    #[test]
    fn test_non_byte_values_pass_through() {
        let row = vec![Value::Integer(1), Value::Float(0.5), Value::Null, Value::from("x")];
        let types = ["text", "text", "text", "int"];
        assert_eq!(normalize_row(row.clone(), &types), row);
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let row = normalize_row(vec![Value::Blob(vec![0x68, 0xff, 0x69])], &["text"]);
        assert_eq!(row, vec![Value::Text("h\u{fffd}i".to_string())]);
    }

    #[test]
    fn test_idempotent() {
        let types = ["int", "blob", "real", "text", "varchar(8)"];
        let row = vec![
            Value::Integer(9),
            Value::Blob(vec![1, 2, 3]),
            Value::Float(3.5),
            Value::Blob(b"abc".to_vec()),
            Value::Null,
        ];
        let once = normalize_row(row, &types);
        let twice = normalize_row(once.clone(), &types);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_type_treated_as_untyped() {
        let row = normalize_row(vec![Value::Blob(b"a".to_vec())], &[] as &[&str]);
        assert_eq!(row, vec![Value::Text("a".to_string())]);
    }
}
