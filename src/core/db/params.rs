/// Statement Parameters Module
///
/// This module holds the two calling conventions accepted by every data
/// operation: a statement with separate parameters, or a packed
/// `(statement, parameters)` pair. It also binds parameters onto prepared
/// statements.
use crate::core::{Result, SweetError};
use indexmap::IndexMap;
use rusqlite::types::Value;
use rusqlite::Statement;
use tracing::debug;

/// Parameters bound to a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Values for `?` placeholders, in order
    Positional(Vec<Value>),
    /// Values for named placeholders, keyed by name with or without the `:` prefix
    Named(IndexMap<String, Value>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    /// Empty parameter list
    pub fn none() -> Self {
        Params::default()
    }

    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Binds these parameters onto a prepared statement
    ///
    /// The number of values must match the statement's placeholder count.
    /// Named keys without a `:`, `@` or `$` prefix are looked up as `:key`.
    pub(crate) fn bind(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<()> {
        let expected = stmt.parameter_count();
        if self.len() != expected {
            return Err(rusqlite::Error::InvalidParameterCount(self.len(), expected));
        }

        match self {
            Params::Positional(values) => {
                for (i, value) in values.iter().enumerate() {
                    stmt.raw_bind_parameter(i + 1, value)?;
                }
            }
            Params::Named(values) => {
                for (name, value) in values {
                    let placeholder = placeholder_name(name);
                    let index = stmt
                        .parameter_index(&placeholder)?
                        .ok_or(rusqlite::Error::InvalidParameterName(placeholder))?;
                    stmt.raw_bind_parameter(index, value)?;
                }
            }
        }
        Ok(())
    }
}

fn placeholder_name(name: &str) -> String {
    if name.starts_with([':', '@', '$']) {
        name.to_string()
    } else {
        format!(":{}", name)
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::none()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl<const N: usize> From<[Value; N]> for Params {
    fn from(values: [Value; N]) -> Self {
        Params::Positional(values.into())
    }
}

impl From<IndexMap<String, Value>> for Params {
    fn from(values: IndexMap<String, Value>) -> Self {
        Params::Named(values)
    }
}

/// A single scalar becomes a one-element positional list
impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Params::Positional(vec![value])
    }
}

impl From<&str> for Params {
    fn from(value: &str) -> Self {
        Params::from(Value::Text(value.to_string()))
    }
}

macro_rules! scalar_params {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Params {
                fn from(value: $ty) -> Self {
                    Params::from(Value::from(value))
                }
            }
        )*
    };
}

scalar_params!(String, i32, i64, f64, bool);

/// The statement argument of a data operation
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Statement text; parameters are supplied separately
    Sql(String),
    /// Statement text packed together with its parameters
    Packed(String, Params),
}

impl Query {
    /// Builds a packed query from a dynamic list of parts
    ///
    /// Element 0 must be the statement text and element 1 its parameter,
    /// bound as a one-element positional list. Further elements are ignored.
    pub fn from_parts(parts: Vec<Value>) -> Result<Self> {
        if parts.len() < 2 {
            return Err(SweetError::Usage(format!(
                "a packed statement needs at least 2 elements (statement text and parameters), got {}",
                parts.len()
            )));
        }
        if parts.len() > 2 {
            debug!("Ignoring {} trailing elements of a packed statement", parts.len() - 2);
        }
        let mut parts = parts.into_iter();
        match (parts.next(), parts.next()) {
            (Some(Value::Text(sql)), Some(param)) => Ok(Query::Packed(sql, Params::from(param))),
            (other, _) => Err(SweetError::Usage(format!(
                "element 0 of a packed statement must be statement text, got {:?}",
                other
            ))),
        }
    }

    /// Statement text regardless of convention
    pub fn sql(&self) -> &str {
        match self {
            Query::Sql(sql) | Query::Packed(sql, _) => sql,
        }
    }

    /// Unpacks the statement and reconciles it with separately supplied parameters
    ///
    /// A packed query must not be combined with non-empty separate parameters.
    pub(crate) fn normalize(self, params: Params) -> Result<(String, Params)> {
        match self {
            Query::Sql(sql) => Ok((sql, params)),
            Query::Packed(sql, packed) => {
                if !params.is_empty() {
                    return Err(SweetError::Usage(
                        "statement is packed with its parameters, separate parameters must be empty"
                            .to_string(),
                    ));
                }
                Ok((sql, packed))
            }
        }
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Query::Sql(sql.to_string())
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Query::Sql(sql)
    }
}

impl From<&String> for Query {
    fn from(sql: &String) -> Self {
        Query::Sql(sql.clone())
    }
}

impl<P: Into<Params>> From<(String, P)> for Query {
    fn from((sql, params): (String, P)) -> Self {
        Query::Packed(sql, params.into())
    }
}

impl<P: Into<Params>> From<(&str, P)> for Query {
    fn from((sql, params): (&str, P)) -> Self {
        Query::Packed(sql.to_string(), params.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_scalar_is_wrapped() {
        assert_eq!(Params::from(5i64), Params::Positional(vec![Value::Integer(5)]));
        assert_eq!(
            Params::from("abc"),
            Params::Positional(vec![Value::Text("abc".to_string())])
        );
        assert!(Params::from(()).is_empty());
    }

    #[test]
    fn test_packed_query_unpacks() {
        let query = Query::from(("SELECT * FROM t WHERE id = ?", 7i64));
        let (sql, params) = query.normalize(Params::none()).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id = ?");
        assert_eq!(params, Params::Positional(vec![Value::Integer(7)]));
    }

    #[test]
    fn test_packed_query_rejects_separate_params() {
        let query = Query::from(("SELECT ?", 1i64));
        match query.normalize(Params::from(2i64)) {
            Err(SweetError::Usage(_)) => {}
            other => panic!("Expected Usage error, got {:?}", other),
        }
    }

    #[test]
    fn test_packed_query_accepts_empty_separate_params() {
        let query = Query::from(("SELECT ?", 1i64));
        assert!(query.normalize(Params::Named(IndexMap::new())).is_ok());
    }

    #[test]
    fn test_from_parts() {
        let query = Query::from_parts(vec![Value::Text("SELECT ?".to_string()), Value::Integer(1)]).unwrap();
        assert_eq!(query, Query::Packed("SELECT ?".to_string(), Params::from(1i64)));
        assert_eq!(query.sql(), "SELECT ?");

        match Query::from_parts(vec![Value::Text("SELECT 1".to_string())]) {
            Err(SweetError::Usage(msg)) => assert!(msg.contains("at least 2")),
            other => panic!("Expected Usage error, got {:?}", other),
        }

        let query = Query::from_parts(vec![
            Value::Text("SELECT ?".to_string()),
            Value::Integer(7),
            Value::Integer(99),
            Value::Null,
        ])
        .unwrap();
        assert_eq!(query, Query::Packed("SELECT ?".to_string(), Params::from(7i64)));

        match Query::from_parts(vec![Value::Integer(1), Value::Integer(2)]) {
            Err(SweetError::Usage(msg)) => assert!(msg.contains("statement text")),
            other => panic!("Expected Usage error, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_named_with_and_without_prefix() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :a + :b").unwrap();

        let mut named = IndexMap::new();
        named.insert("a".to_string(), Value::Integer(2));
        named.insert(":b".to_string(), Value::Integer(3));
        Params::Named(named).bind(&mut stmt).unwrap();

        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get::<_, i64>(0).unwrap(), 5);
    }

    #[test]
    fn test_bind_rejects_count_mismatch_and_unknown_names() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT ?").unwrap();
        assert!(matches!(
            Params::none().bind(&mut stmt),
            Err(rusqlite::Error::InvalidParameterCount(0, 1))
        ));

        let mut stmt = conn.prepare("SELECT :a").unwrap();
        let mut named = IndexMap::new();
        named.insert("missing".to_string(), Value::Null);
        assert!(matches!(
            Params::Named(named).bind(&mut stmt),
            Err(rusqlite::Error::InvalidParameterName(name)) if name == ":missing"
        ));
    }
}
