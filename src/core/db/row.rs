/// Result Row Module
///
/// A `Row` is one materialized record of a result set. Its fields are fixed
/// when it is fetched; reading a field the result did not contain is an error
/// rather than a silent null.
use crate::core::{Result, SweetError};
use rusqlite::types::{FromSql, Value, ValueRef};
use std::sync::Arc;

/// One result row with named-field access
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new Row; `values` must line up with `columns`
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Row { columns, values }
    }

    /// Reads a row from the driver's current cursor position
    pub(crate) fn from_driver(columns: &Arc<[String]>, row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let values = (0..columns.len())
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Row::new(Arc::clone(columns), values))
    }

    /// Returns the value of a named field
    ///
    /// When several columns share the name, the last one wins, matching
    /// `to_json`.
    ///
    /// # Errors
    ///
    /// Returns `SweetError::FieldAccess` if the row has no such field.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.columns
            .iter()
            .rposition(|column| column == name)
            .map(|i| &self.values[i])
            .ok_or_else(|| SweetError::FieldAccess(name.to_string()))
    }

    /// Returns a named field converted to a Rust type
    pub fn try_get<T: FromSql>(&self, name: &str) -> Result<T> {
        let value = self.get(name)?;
        T::column_result(ValueRef::from(value))
            .map_err(|e| SweetError::Usage(format!("field {} cannot be converted: {}", name, e)))
    }

    /// Returns the value at a column position
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts the row into a JSON object keyed by column name
    pub fn to_json(&self) -> serde_json::Value {
        let object = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| (column.clone(), json_value(value)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(object)
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(t) => serde_json::Value::String(t.clone()),
        Value::Blob(b) => serde_json::Value::String(format!("<BLOB: {} bytes>", b.len())),
    }
}
