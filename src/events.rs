//! Lifecycle events fired around connection operations.
//!
//! When a `Connection` is given an `EventSink`, every data operation and
//! transaction call is bracketed by a `started` and a `finished` event.
//! Started events hand the sink mutable references to the inputs, so a sink
//! can inspect or rewrite them before the driver sees them. Finished events
//! carry the same inputs plus the result. Events are for observation only;
//! they never affect control flow.
use crate::core::db::{ConnectOptions, Params, Row, StatementOptions};
use rusqlite::types::Value;
use tracing::{debug, info};

/// Prefix shared by all event names
pub const EVENT_PREFIX: &str = "sweetsql";

/// The operation an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Execute,
    Select,
    GetOneValue,
    GetOneRow,
    BeginTransaction,
    CommitTransaction,
    RollbackTransaction,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Execute => "execute",
            Operation::Select => "select",
            Operation::GetOneValue => "get_one_value",
            Operation::GetOneRow => "get_one_row",
            Operation::BeginTransaction => "begin_transaction",
            Operation::CommitTransaction => "commit_transaction",
            Operation::RollbackTransaction => "rollback_transaction",
        }
    }
}

/// Whether an event precedes or follows the driver call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Started,
    Finished,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Started => "started",
            Phase::Finished => "finished",
        }
    }
}

/// Inputs of the operation, borrowed mutably from the caller's frame
#[derive(Debug)]
pub enum EventArgs<'a> {
    Connect {
        connection_string: &'a mut String,
        username: &'a mut String,
        password: &'a mut String,
        options: &'a mut ConnectOptions,
    },
    Statement {
        sql: &'a mut String,
        params: &'a mut Params,
        options: &'a mut StatementOptions,
    },
    /// Transaction control takes no inputs
    None,
}

/// Outcome carried by `finished` events
#[derive(Debug, Clone, Copy)]
pub enum EventResult<'a> {
    /// The driver session that was opened
    Connected(&'a rusqlite::Connection),
    /// Rows affected by `execute`
    AffectedRows(usize),
    /// A recordset was created by `select`
    Recordset { columns: &'a [String], row_count: usize },
    /// First column of the first row, if any
    Value(Option<&'a Value>),
    /// First row, if any
    Row(Option<&'a Row>),
    /// Success flag of a transaction call
    Transaction(bool),
}

/// A single lifecycle notification
#[derive(Debug)]
pub struct Event<'a> {
    operation: Operation,
    phase: Phase,
    pub args: EventArgs<'a>,
    pub result: Option<EventResult<'a>>,
}

impl<'a> Event<'a> {
    pub fn started(operation: Operation, args: EventArgs<'a>) -> Self {
        Event {
            operation,
            phase: Phase::Started,
            args,
            result: None,
        }
    }

    pub fn finished(operation: Operation, args: EventArgs<'a>, result: EventResult<'a>) -> Self {
        Event {
            operation,
            phase: Phase::Finished,
            args,
            result: Some(result),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Full event name, e.g. `sweetsql.execute.started`
    pub fn name(&self) -> String {
        format!("{}.{}.{}", EVENT_PREFIX, self.operation.as_str(), self.phase.as_str())
    }
}

/// Receiver of lifecycle events
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &mut Event<'_>);
}

impl<F> EventSink for F
where
    F: Fn(&mut Event<'_>) + Send + Sync,
{
    fn notify(&self, event: &mut Event<'_>) {
        self(event)
    }
}

/// Sink that logs every event through `tracing`
///
/// Started events are logged at debug level, finished events at info level.
/// Passwords are never logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn notify(&self, event: &mut Event<'_>) {
        let name = event.name();
        let inputs = match &event.args {
            EventArgs::Connect {
                connection_string,
                username,
                ..
            } => format!("dsn={} user={}", connection_string, username),
            EventArgs::Statement { sql, params, .. } => format!("sql={} params={:?}", sql, params),
            EventArgs::None => String::new(),
        };

        match (event.phase, &event.result) {
            (Phase::Finished, Some(result)) => {
                info!(event = %name, inputs = %inputs, result = %describe(result))
            }
            _ => debug!(event = %name, inputs = %inputs),
        }
    }
}

fn describe(result: &EventResult<'_>) -> String {
    match result {
        EventResult::Connected(_) => "connected".to_string(),
        EventResult::AffectedRows(n) => format!("{} rows affected", n),
        EventResult::Recordset { row_count, .. } => format!("recordset with {} rows", row_count),
        EventResult::Value(Some(value)) => format!("{:?}", value),
        EventResult::Row(Some(row)) => format!("row with {} fields", row.len()),
        EventResult::Value(None) | EventResult::Row(None) => "no result".to_string(),
        EventResult::Transaction(ok) => ok.to_string(),
    }
}
