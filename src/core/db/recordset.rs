/// Recordset Module
///
/// A `Recordset` presents the result of a prepared statement as a forward-only
/// sequence of rows. Creating one executes the statement once and positions
/// the cursor before the first row. Rows are fetched from the driver one at a
/// time by `advance`, so a failure on a late row surfaces there rather than
/// when the recordset is created.
///
/// `restart` runs the statement again with the same parameters; it does not
/// rewind over earlier results, so a query using volatile functions may yield
/// different rows after a restart.
///
/// A Recordset owns its statement exclusively and must not be shared between
/// callers without external synchronization.
use crate::core::db::error::{DatabaseError, Verbosity};
use crate::core::db::params::Params;
use crate::core::db::row::Row;
use crate::core::{Result, SweetError};
use ouroboros::self_referencing;
use rusqlite::{Rows, Statement};
use std::sync::Arc;
use tracing::{debug, error};

/// A statement together with the rows of its current execution
#[self_referencing]
struct Cursor<'c> {
    stmt: Statement<'c>,
    #[borrows(mut stmt)]
    #[not_covariant]
    rows: Rows<'this>,
}

enum State<'c> {
    /// Statement is reset; nothing left to fetch
    Idle(Statement<'c>),
    Fetching(Cursor<'c>),
}

/// Forward-only, restartable cursor over a statement's result
pub struct Recordset<'c> {
    state: Option<State<'c>>,
    sql: String,
    params: Params,
    columns: Arc<[String]>,
    verbosity: Verbosity,
    current: Option<Row>,
    position: usize,
    row_count: usize,
}

impl<'c> Recordset<'c> {
    /// Wraps a prepared statement and executes it once
    pub(crate) fn new(stmt: Statement<'c>, sql: String, params: Params, verbosity: Verbosity) -> Result<Self> {
        let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
        let mut recordset = Recordset {
            state: Some(State::Idle(stmt)),
            sql,
            params,
            columns,
            verbosity,
            current: None,
            position: 0,
            row_count: 0,
        };
        recordset.execute()?;
        Ok(recordset)
    }

    fn execute(&mut self) -> Result<()> {
        let mut stmt = self.take_statement()?;
        self.current = None;
        self.position = 0;
        self.row_count = 0;

        if self.columns.is_empty() {
            let affected = self.params.bind(&mut stmt).and_then(|()| stmt.raw_execute());
            self.state = Some(State::Idle(stmt));
            self.row_count = affected.map_err(|e| self.database_error(&e))?;
            debug!("Recordset affected {} rows: {}", self.row_count, self.sql);
            return Ok(());
        }

        let params = &self.params;
        let started = Cursor::try_new_or_recover(stmt, |stmt| match params.bind(stmt) {
            Ok(()) => Ok(stmt.raw_query()),
            Err(e) => Err(e),
        });
        match started {
            Ok(cursor) => {
                self.state = Some(State::Fetching(cursor));
                debug!("Recordset executed: {}", self.sql);
                Ok(())
            }
            Err((e, heads)) => {
                self.state = Some(State::Idle(heads.stmt));
                Err(self.database_error(&e))
            }
        }
    }

    fn take_statement(&mut self) -> Result<Statement<'c>> {
        match self.state.take() {
            Some(State::Idle(stmt)) => Ok(stmt),
            Some(State::Fetching(cursor)) => Ok(cursor.into_heads().stmt),
            None => Err(SweetError::Usage(format!("recordset statement is unavailable: {}", self.sql))),
        }
    }

    /// Drops the pending rows, which resets the statement
    fn release(&mut self) {
        self.state = match self.state.take() {
            Some(State::Fetching(cursor)) => Some(State::Idle(cursor.into_heads().stmt)),
            other => other,
        };
    }

    fn database_error(&self, err: &rusqlite::Error) -> SweetError {
        error!("Recordset failed: {} ({})", err, self.sql);
        DatabaseError::from_driver(err, self.sql.as_str(), &self.params, self.verbosity).into()
    }

    /// Re-executes the statement with its original parameters
    ///
    /// The cursor returns to the position it had right after creation.
    pub fn restart(&mut self) -> Result<()> {
        self.execute()
    }

    /// Fetches the next row and returns it, or `None` once exhausted
    ///
    /// Every produced row increments `position` by one. A failed fetch ends
    /// the current execution; later calls return `None` until `restart`.
    ///
    /// # Errors
    ///
    /// Returns `SweetError::Database` if the driver fails to produce the row.
    pub fn advance(&mut self) -> Result<Option<&Row>> {
        let columns = &self.columns;
        let fetched = match self.state.as_mut() {
            Some(State::Fetching(cursor)) => cursor.with_rows_mut(|rows| match rows.next() {
                Ok(Some(row)) => Row::from_driver(columns, row).map(Some),
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            }),
            _ => Ok(None),
        };

        match fetched {
            Ok(Some(row)) => {
                self.position += 1;
                self.row_count += 1;
                self.current = Some(row);
                Ok(self.current.as_ref())
            }
            Ok(None) => {
                self.current = None;
                self.release();
                Ok(None)
            }
            Err(e) => {
                self.current = None;
                self.release();
                Err(self.database_error(&e))
            }
        }
    }

    /// Row produced by the last `advance`
    pub fn current(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// Number of rows produced since the last execution
    pub fn position(&self) -> usize {
        self.position
    }

    /// True while the last `advance` produced a row
    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    /// Best-effort row count
    ///
    /// Rows affected for statements that return no columns. For row-returning
    /// statements, the rows fetched so far in the current execution, which is
    /// the full result size once the recordset is exhausted.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Releases the pending rows; further `advance` calls yield nothing until
    /// `restart`. Calling it again has no effect.
    pub fn close(&mut self) {
        self.release();
        self.current = None;
    }
}

impl Iterator for Recordset<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(row)) => Some(Ok(row.clone())),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::fmt::Debug for Recordset<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recordset")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .field("columns", &self.columns)
            .field("fetching", &matches!(self.state, Some(State::Fetching(_))))
            .field("position", &self.position)
            .field("row_count", &self.row_count)
            .finish()
    }
}
