/// Database Error Module
///
/// `DatabaseError` is the diagnostic value produced whenever the driver fails
/// to prepare, execute or fetch. The structured fields are always available;
/// how much of them ends up in the rendered message depends on `Verbosity`.
use crate::core::db::params::Params;
use serde::Deserialize;
use thiserror::Error;

/// SQL state reported for generic driver failures
pub const SQLSTATE_GENERAL_ERROR: &str = "HY000";

/// SQL state reported when parameters do not match the statement's placeholders
pub const SQLSTATE_INVALID_PARAMETER: &str = "HY093";

/// How much context a `DatabaseError` renders into its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Driver state, code and message only
    ErrorOnly,
    /// Driver diagnostics plus the statement text
    WithStatement,
    /// Driver diagnostics, statement text and a dump of the parameters
    #[default]
    Full,
}

/// A failure reported by the database driver.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DatabaseError {
    sql_state: String,
    driver_code: i32,
    driver_message: String,
    statement: String,
    params: Params,
    verbosity: Verbosity,
    message: String,
}

impl DatabaseError {
    /// Creates a new DatabaseError, rendering its message once for the given verbosity
    pub fn new(
        sql_state: impl Into<String>,
        driver_code: i32,
        driver_message: impl Into<String>,
        statement: impl Into<String>,
        params: Params,
        verbosity: Verbosity,
    ) -> Self {
        let sql_state = sql_state.into();
        let driver_message = driver_message.into();
        let statement = statement.into();

        let mut message = format!(
            "Database error [{}]: {}, driver error code is {}",
            sql_state, driver_message, driver_code
        );
        if verbosity != Verbosity::ErrorOnly {
            message.push_str(&format!(" SQL: {}", statement));
        }
        if verbosity == Verbosity::Full {
            message.push_str(&format!(" Arguments: {:?}", params));
        }

        DatabaseError {
            sql_state,
            driver_code,
            driver_message,
            statement,
            params,
            verbosity,
            message,
        }
    }

    /// Builds a DatabaseError from a rusqlite failure
    ///
    /// SQLite has no native SQL states, so failures are classified as
    /// `HY093` for parameter mismatches and `HY000` for everything else.
    /// The driver code is SQLite's extended result code, or 0 when the
    /// failure did not come from the SQLite library itself.
    pub fn from_driver(
        err: &rusqlite::Error,
        statement: impl Into<String>,
        params: &Params,
        verbosity: Verbosity,
    ) -> Self {
        let (sql_state, driver_code, driver_message) = match err {
            rusqlite::Error::SqliteFailure(failure, msg) => (
                SQLSTATE_GENERAL_ERROR,
                failure.extended_code,
                msg.clone().unwrap_or_else(|| failure.to_string()),
            ),
            rusqlite::Error::InvalidParameterCount(..) | rusqlite::Error::InvalidParameterName(_) => {
                (SQLSTATE_INVALID_PARAMETER, 0, err.to_string())
            }
            other => (SQLSTATE_GENERAL_ERROR, 0, other.to_string()),
        };

        DatabaseError::new(
            sql_state,
            driver_code,
            driver_message,
            statement,
            params.clone(),
            verbosity,
        )
    }

    /// SQL state code of the failure
    pub fn sql_state(&self) -> &str {
        &self.sql_state
    }

    /// Driver-specific error code
    pub fn driver_code(&self) -> i32 {
        self.driver_code
    }

    /// Error description as reported by the driver
    pub fn driver_message(&self) -> &str {
        &self.driver_message
    }

    /// Statement text that caused the failure
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Parameters that were bound to the statement
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// The rendered, human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use rusqlite::types::Value;

    fn sample(verbosity: Verbosity) -> DatabaseError {
        DatabaseError::new(
            "HY000",
            1,
            "no such table: users",
            "SELECT * FROM users WHERE id = ?",
            Params::from(Value::Integer(42)),
            verbosity,
        )
    }

    #[test]
    fn test_error_only_rendering() {
        let err = sample(Verbosity::ErrorOnly);
        assert_snapshot!(
            err.to_string(),
            @"Database error [HY000]: no such table: users, driver error code is 1"
        );
        assert!(!err.to_string().contains("SELECT"));
        assert!(!err.to_string().contains("Arguments"));
    }

    #[test]
    fn test_with_statement_rendering() {
        let err = sample(Verbosity::WithStatement);
        assert_snapshot!(
            err.to_string(),
            @"Database error [HY000]: no such table: users, driver error code is 1 SQL: SELECT * FROM users WHERE id = ?"
        );
    }

    #[test]
    fn test_full_rendering() {
        let err = sample(Verbosity::Full);
        assert_snapshot!(
            err.to_string(),
            @"Database error [HY000]: no such table: users, driver error code is 1 SQL: SELECT * FROM users WHERE id = ? Arguments: Positional([Integer(42)])"
        );
    }

    #[test]
    fn test_fields_survive_low_verbosity() {
        let err = sample(Verbosity::ErrorOnly);
        assert_eq!(err.sql_state(), "HY000");
        assert_eq!(err.driver_code(), 1);
        assert_eq!(err.driver_message(), "no such table: users");
        assert_eq!(err.statement(), "SELECT * FROM users WHERE id = ?");
        assert_eq!(err.params(), &Params::from(Value::Integer(42)));
        assert_eq!(err.verbosity(), Verbosity::ErrorOnly);
    }

    #[test]
    fn test_from_driver_classifies_parameter_errors() {
        let driver_err = rusqlite::Error::InvalidParameterCount(2, 1);
        let err = DatabaseError::from_driver(&driver_err, "SELECT ?", &Params::none(), Verbosity::Full);
        assert_eq!(err.sql_state(), SQLSTATE_INVALID_PARAMETER);
        assert_eq!(err.driver_code(), 0);

        let driver_err = rusqlite::Error::QueryReturnedNoRows;
        let err = DatabaseError::from_driver(&driver_err, "SELECT 1", &Params::none(), Verbosity::Full);
        assert_eq!(err.sql_state(), SQLSTATE_GENERAL_ERROR);
    }

    #[test]
    fn test_verbosity_deserializes_from_snake_case() {
        #[derive(Deserialize)]
        struct Holder {
            verbosity: Verbosity,
        }
        let holder: Holder = toml::from_str("verbosity = \"with_statement\"").unwrap();
        assert_eq!(holder.verbosity, Verbosity::WithStatement);
    }
}
