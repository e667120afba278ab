//! SQL helpers for building common statements.
//!
//! Each helper returns the statement text together with named parameters,
//! a pair that converts straight into a packed `Query`:
//!
//! ```
//! use indexmap::IndexMap;
//! use rusqlite::types::Value;
//! use sweetsql::{sql, Connection};
//!
//! let conn = Connection::open_in_memory().unwrap();
//! conn.execute("CREATE TABLE users (name TEXT)", ()).unwrap();
//!
//! let mut fields = IndexMap::new();
//! fields.insert("name".to_string(), Value::Text("John Smith".to_string()));
//! assert_eq!(conn.execute(sql::insert("users", fields), ()).unwrap(), 1);
//! ```
//!
//! Table names, column names and criteria are pasted into the statement
//! verbatim. They must never come from untrusted input.
use crate::core::db::Params;
use indexmap::IndexMap;
use rusqlite::types::Value;

/// Builds `INSERT INTO <table>(<cols>) VALUES (:<cols>)`
///
/// Columns appear in the insertion order of `fields`.
pub fn insert(table: &str, fields: IndexMap<String, Value>) -> (String, Params) {
    values_statement("INSERT INTO", table, fields)
}

/// Builds `REPLACE INTO <table>(<cols>) VALUES (:<cols>)`
pub fn replace(table: &str, fields: IndexMap<String, Value>) -> (String, Params) {
    values_statement("REPLACE INTO", table, fields)
}

fn values_statement(operator: &str, table: &str, fields: IndexMap<String, Value>) -> (String, Params) {
    let columns = fields.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
    let placeholders = fields
        .keys()
        .map(|name| format!(":{}", name))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("{} {}({}) VALUES ({})", operator, table, columns, placeholders);
    (sql, Params::Named(fields))
}

/// Builds `UPDATE <table> SET col=:col, ... [WHERE <criteria>]`
///
/// `criteria` is raw SQL without the `WHERE` keyword. It is left out when
/// `None` or empty.
pub fn update(table: &str, fields: IndexMap<String, Value>, criteria: Option<&str>) -> (String, Params) {
    let assignments = fields
        .keys()
        .map(|name| format!("{}=:{}", name, name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("UPDATE {} SET {}", table, assignments);
    if let Some(criteria) = criteria.filter(|c| !c.is_empty()) {
        sql.push_str(" WHERE ");
        sql.push_str(criteria);
    }
    (sql, Params::Named(fields))
}
