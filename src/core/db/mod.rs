/// Database Module
///
/// This module wraps the SQLite driver with a small convenience layer,
/// organized into focused submodules.
///
/// ## Architecture
///
/// - **Connection** (`connection.rs`): owns the driver handle, normalizes arguments, fires events
/// - **Recordset** (`recordset.rs`): forward-only, restartable cursor over a prepared statement
/// - **Row** (`row.rs`): one materialized result row with strict field access
/// - **Parameters** (`params.rs`): positional/named parameters and the packed statement convention
/// - **Errors** (`error.rs`): `DatabaseError` carrying the driver's diagnostics
///
/// ## Error Handling
///
/// Driver failures surface as `SweetError::Database`; nothing is retried.
pub mod connection;
pub mod error;
pub mod params;
pub mod recordset;
pub mod row;

pub use connection::*;
pub use error::{DatabaseError, Verbosity};
pub use params::{Params, Query};
pub use recordset::Recordset;
pub use row::Row;
