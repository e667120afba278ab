// Core infrastructure modules
pub mod core;

// Feature-specific modules
pub mod config;
pub mod events;
pub mod sql;

pub use crate::core::db::{
    ConnectOptions, Connection, DatabaseError, Params, Query, Recordset, Row, StatementOptions, Verbosity,
};
pub use crate::core::{Result, SweetError};
pub use crate::events::{Event, EventArgs, EventResult, EventSink, Operation, Phase, TracingSink};
pub use rusqlite::types::Value;
