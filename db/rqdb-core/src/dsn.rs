///
/// Data-source locator composition.
///
/// Driver parameters are attached with SQLite's URI syntax. Neither the path
/// nor the parameter string is escaped; callers supply a well-formed query
/// string such as `mode=ro&cache=shared`.
///

/// Name SQLite uses for a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Returns the fully-qualified locator for `path` with optional `dsn` parameters.
pub fn fqdsn(path: &str, dsn: &str) -> String {
    if dsn.is_empty() {
        return path.to_string();
    }
    format!("file:{}?{}", path, dsn)
}
