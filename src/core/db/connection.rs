/// Connection Management Module
///
/// `Connection` is the single point of access to the database. It owns the
/// driver handle, normalizes the calling conventions of every data operation
/// and brackets each operation with optional lifecycle events.
use crate::core::db::error::{DatabaseError, Verbosity};
use crate::core::db::params::{Params, Query};
use crate::core::db::recordset::Recordset;
use crate::core::db::row::Row;
use crate::core::{Result, SweetError};
use crate::events::{Event, EventArgs, EventResult, EventSink, Operation};
use indexmap::IndexMap;
use rusqlite::types::Value;
use rusqlite::{OpenFlags, Statement};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Connection string prefix selecting the SQLite driver
pub const SQLITE_SCHEME: &str = "sqlite";

const QUOTE_SQL: &str = "SELECT quote(?1)";

/// Driver options applied when a connection is opened
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Open the database read-only
    pub read_only: bool,
    /// Create the database file if it does not exist
    pub create: bool,
    /// How long to wait on a locked database before failing
    pub busy_timeout_ms: Option<u64>,
    /// Pragmas applied right after opening, in order
    pub pragmas: IndexMap<String, String>,
    /// How much context database errors render into their message
    pub error_verbosity: Verbosity,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        let mut pragmas = IndexMap::new();
        pragmas.insert("foreign_keys".to_string(), "ON".to_string());
        ConnectOptions {
            read_only: false,
            create: true,
            busy_timeout_ms: None,
            pragmas,
            error_verbosity: Verbosity::default(),
        }
    }
}

impl ConnectOptions {
    fn open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.read_only {
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
            if self.create {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
        }
        flags
    }
}

/// Driver options applied when a statement is prepared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatementOptions {
    /// Reject statements that could modify the database
    pub read_only: bool,
}

/// A database connection with lifecycle events
///
/// The connection owns its driver handle exclusively. Once closed, every
/// further statement operation fails with `SweetError::Connection`. The
/// handle is released when the connection is dropped.
pub struct Connection {
    handle: Option<rusqlite::Connection>,
    sink: Option<Arc<dyn EventSink>>,
    verbosity: Verbosity,
}

impl Connection {
    /// Opens a connection
    ///
    /// # Arguments
    ///
    /// * `connection_string` - A path, `:memory:`, or either prefixed with `sqlite:`
    /// * `username` - Passed through to events; SQLite has no authentication
    /// * `password` - Passed through to events; SQLite has no authentication
    /// * `options` - Driver options for the session
    /// * `sink` - Receiver of lifecycle events, `None` to disable them
    ///
    /// # Errors
    ///
    /// Returns `SweetError::Connection` if the driver cannot establish the session.
    pub fn open(
        connection_string: &str,
        username: &str,
        password: &str,
        options: ConnectOptions,
        sink: Option<Arc<dyn EventSink>>,
    ) -> Result<Self> {
        let mut connection = Connection {
            handle: None,
            verbosity: options.error_verbosity,
            sink,
        };

        let mut connection_string = connection_string.to_string();
        let mut username = username.to_string();
        let mut password = password.to_string();
        let mut options = options;

        connection.notify(Event::started(
            Operation::Connect,
            EventArgs::Connect {
                connection_string: &mut connection_string,
                username: &mut username,
                password: &mut password,
                options: &mut options,
            },
        ));

        let handle = open_handle(&connection_string, &options)?;
        connection.verbosity = options.error_verbosity;
        info!("Opened connection to {}", connection_string);

        connection.notify(Event::finished(
            Operation::Connect,
            EventArgs::Connect {
                connection_string: &mut connection_string,
                username: &mut username,
                password: &mut password,
                options: &mut options,
            },
            EventResult::Connected(&handle),
        ));

        connection.handle = Some(handle);
        Ok(connection)
    }

    /// Opens a private in-memory database with default options and no events
    pub fn open_in_memory() -> Result<Self> {
        Connection::open(":memory:", "", "", ConnectOptions::default(), None)
    }

    /// Executes a statement that returns no data
    ///
    /// # Returns
    ///
    /// The number of rows affected. For statements that return rows, the
    /// number of rows returned.
    ///
    /// # Errors
    ///
    /// `SweetError::Usage` if a packed query is combined with separate
    /// parameters, `SweetError::Database` if the driver rejects the statement.
    pub fn execute(&self, query: impl Into<Query>, params: impl Into<Params>) -> Result<usize> {
        self.execute_with_options(query, params, StatementOptions::default())
    }

    pub fn execute_with_options(
        &self,
        query: impl Into<Query>,
        params: impl Into<Params>,
        options: StatementOptions,
    ) -> Result<usize> {
        self.handle()?;
        let (mut sql, mut params) = query.into().normalize(params.into())?;
        let mut options = options;

        self.notify(Event::started(Operation::Execute, statement_args(&mut sql, &mut params, &mut options)));

        let mut stmt = self.prepare(&sql, &params, &options)?;
        let affected = run(&mut stmt, &params).map_err(|e| self.database_error(&e, &sql, &params))?;

        self.notify(Event::finished(
            Operation::Execute,
            statement_args(&mut sql, &mut params, &mut options),
            EventResult::AffectedRows(affected),
        ));
        Ok(affected)
    }

    /// Executes a query and returns a recordset over its result
    ///
    /// The statement is executed once before the recordset is returned; the
    /// recordset itself is not iterated.
    pub fn select(&self, query: impl Into<Query>, params: impl Into<Params>) -> Result<Recordset<'_>> {
        self.select_with_options(query, params, StatementOptions::default())
    }

    pub fn select_with_options(
        &self,
        query: impl Into<Query>,
        params: impl Into<Params>,
        options: StatementOptions,
    ) -> Result<Recordset<'_>> {
        self.handle()?;
        let (mut sql, mut params) = query.into().normalize(params.into())?;
        let mut options = options;

        self.notify(Event::started(Operation::Select, statement_args(&mut sql, &mut params, &mut options)));

        let stmt = self.prepare(&sql, &params, &options)?;
        let recordset = Recordset::new(stmt, sql.clone(), params.clone(), self.verbosity)?;

        self.notify(Event::finished(
            Operation::Select,
            statement_args(&mut sql, &mut params, &mut options),
            EventResult::Recordset {
                columns: recordset.columns(),
                row_count: recordset.row_count(),
            },
        ));

        Ok(recordset)
    }

    /// Returns the first column of the first row, or `None` if the query
    /// produced no rows
    pub fn get_one_value(&self, query: impl Into<Query>, params: impl Into<Params>) -> Result<Option<Value>> {
        self.get_one_value_with_options(query, params, StatementOptions::default())
    }

    pub fn get_one_value_with_options(
        &self,
        query: impl Into<Query>,
        params: impl Into<Params>,
        options: StatementOptions,
    ) -> Result<Option<Value>> {
        self.handle()?;
        let (mut sql, mut params) = query.into().normalize(params.into())?;
        let mut options = options;

        self.notify(Event::started(
            Operation::GetOneValue,
            statement_args(&mut sql, &mut params, &mut options),
        ));

        let mut stmt = self.prepare(&sql, &params, &options)?;
        let value = first_row(&mut stmt, &params, |row| row.get::<_, Value>(0))
            .map_err(|e| self.database_error(&e, &sql, &params))?;

        self.notify(Event::finished(
            Operation::GetOneValue,
            statement_args(&mut sql, &mut params, &mut options),
            EventResult::Value(value.as_ref()),
        ));

        Ok(value)
    }

    /// Returns the first row, or `None` if the query produced no rows
    pub fn get_one_row(&self, query: impl Into<Query>, params: impl Into<Params>) -> Result<Option<Row>> {
        self.get_one_row_with_options(query, params, StatementOptions::default())
    }

    pub fn get_one_row_with_options(
        &self,
        query: impl Into<Query>,
        params: impl Into<Params>,
        options: StatementOptions,
    ) -> Result<Option<Row>> {
        self.handle()?;
        let (mut sql, mut params) = query.into().normalize(params.into())?;
        let mut options = options;

        self.notify(Event::started(
            Operation::GetOneRow,
            statement_args(&mut sql, &mut params, &mut options),
        ));

        let mut stmt = self.prepare(&sql, &params, &options)?;
        let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
        let row = first_row(&mut stmt, &params, |row| Row::from_driver(&columns, row))
            .map_err(|e| self.database_error(&e, &sql, &params))?;

        self.notify(Event::finished(
            Operation::GetOneRow,
            statement_args(&mut sql, &mut params, &mut options),
            EventResult::Row(row.as_ref()),
        ));

        Ok(row)
    }

    /// Begins a transaction
    ///
    /// Returns `false` without touching the driver if a transaction is
    /// already active.
    pub fn begin_transaction(&self) -> Result<bool> {
        self.transaction(Operation::BeginTransaction, "BEGIN", true)
    }

    /// Commits the active transaction; `false` if none is active
    pub fn commit_transaction(&self) -> Result<bool> {
        self.transaction(Operation::CommitTransaction, "COMMIT", false)
    }

    /// Rolls back the active transaction; `false` if none is active
    pub fn rollback_transaction(&self) -> Result<bool> {
        self.transaction(Operation::RollbackTransaction, "ROLLBACK", false)
    }

    fn transaction(&self, operation: Operation, sql: &str, requires_autocommit: bool) -> Result<bool> {
        let handle = self.handle()?;
        self.notify(Event::started(operation, EventArgs::None));

        let applicable = handle.is_autocommit() == requires_autocommit;
        if applicable {
            handle
                .execute_batch(sql)
                .map_err(|e| self.database_error(&e, sql, &Params::none()))?;
            debug!("{} succeeded", sql);
        } else {
            debug!("{} skipped, transaction state does not allow it", sql);
        }

        self.notify(Event::finished(operation, EventArgs::None, EventResult::Transaction(applicable)));
        Ok(applicable)
    }

    /// Checks whether a transaction is in progress
    pub fn in_transaction(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_autocommit())
            .unwrap_or(false)
    }

    /// Returns the rowid of the last inserted row
    ///
    /// SQLite has no sequences; a sequence name is accepted and ignored.
    pub fn last_insert_id(&self, sequence: Option<&str>) -> Result<i64> {
        if let Some(name) = sequence {
            debug!("Ignoring sequence name {} for last insert id", name);
        }
        Ok(self.handle()?.last_insert_rowid())
    }

    /// Quotes a string for safe inclusion in a statement, using SQLite's
    /// own `quote()` function
    pub fn quote(&self, value: &str) -> Result<String> {
        self.handle()?
            .query_row(QUOTE_SQL, [value], |row| row.get::<_, String>(0))
            .map_err(|e| self.database_error(&e, QUOTE_SQL, &Params::from(value)))
    }

    /// Closes the connection. Closing an already closed connection does nothing.
    pub fn close(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            if let Err((handle, e)) = handle.close() {
                self.handle = Some(handle);
                return Err(SweetError::Connection(format!("failed to close connection: {}", e)));
            }
            info!("Connection closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    fn handle(&self) -> Result<&rusqlite::Connection> {
        self.handle
            .as_ref()
            .ok_or_else(|| SweetError::Connection("connection is closed".to_string()))
    }

    fn prepare(&self, sql: &str, params: &Params, options: &StatementOptions) -> Result<Statement<'_>> {
        let stmt = self
            .handle()?
            .prepare(sql)
            .map_err(|e| self.database_error(&e, sql, params))?;

        if options.read_only && !stmt.readonly() {
            return Err(SweetError::Usage(format!(
                "statement is not read-only: {}",
                sql
            )));
        }
        Ok(stmt)
    }

    fn database_error(&self, err: &rusqlite::Error, sql: &str, params: &Params) -> SweetError {
        error!("Statement failed: {} ({})", err, sql);
        DatabaseError::from_driver(err, sql, params, self.verbosity).into()
    }

    fn notify(&self, mut event: Event<'_>) {
        if let Some(sink) = &self.sink {
            sink.notify(&mut event);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("{}", e);
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.is_closed())
            .field("events", &self.sink.is_some())
            .field("verbosity", &self.verbosity)
            .finish()
    }
}

fn statement_args<'a>(
    sql: &'a mut String,
    params: &'a mut Params,
    options: &'a mut StatementOptions,
) -> EventArgs<'a> {
    EventArgs::Statement { sql, params, options }
}

/// Resolves a connection string to the path handed to SQLite
fn database_path(connection_string: &str) -> Result<&str> {
    if let Some(rest) = connection_string.strip_prefix(SQLITE_SCHEME).and_then(|r| r.strip_prefix(':')) {
        return Ok(rest);
    }
    if connection_string == ":memory:" || connection_string.starts_with("file:") {
        return Ok(connection_string);
    }
    // Single letters are drive names, not driver schemes
    match connection_string.split_once(':') {
        Some((scheme, _))
            if scheme.len() > 1 && scheme.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            Err(SweetError::Connection(format!("unsupported driver: {}", scheme)))
        }
        _ => Ok(connection_string),
    }
}

fn open_handle(connection_string: &str, options: &ConnectOptions) -> Result<rusqlite::Connection> {
    let path = database_path(connection_string)?;
    let handle = rusqlite::Connection::open_with_flags(path, options.open_flags())
        .map_err(|e| SweetError::Connection(format!("failed to open {}: {}", connection_string, e)))?;

    if let Some(ms) = options.busy_timeout_ms {
        handle
            .busy_timeout(Duration::from_millis(ms))
            .map_err(|e| SweetError::Connection(format!("failed to set busy timeout: {}", e)))?;
    }

    for (name, value) in &options.pragmas {
        apply_pragma(&handle, name, value)
            .map_err(|e| SweetError::Connection(format!("failed to apply pragma {}: {}", name, e)))?;
    }
    Ok(handle)
}

// Some pragmas report their new value as a row, so results are drained
fn apply_pragma(handle: &rusqlite::Connection, name: &str, value: &str) -> rusqlite::Result<()> {
    let mut stmt = handle.prepare(&format!("PRAGMA {} = {}", name, value))?;
    let mut rows = stmt.raw_query();
    while rows.next()?.is_some() {}
    Ok(())
}

/// Binds and runs a statement, returning affected rows, or returned rows for
/// statements that produce them
fn run(stmt: &mut Statement<'_>, params: &Params) -> rusqlite::Result<usize> {
    params.bind(stmt)?;
    if stmt.column_count() == 0 {
        return stmt.raw_execute();
    }
    let mut count = 0;
    let mut rows = stmt.raw_query();
    while rows.next()?.is_some() {
        count += 1;
    }
    Ok(count)
}

fn first_row<T>(
    stmt: &mut Statement<'_>,
    params: &Params,
    read: impl FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Option<T>> {
    params.bind(stmt)?;
    let mut rows = stmt.raw_query();
    match rows.next()? {
        Some(row) => read(row).map(Some),
        None => Ok(None),
    }
}
