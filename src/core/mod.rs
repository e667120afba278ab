/// Core Module for sweetsql
///
/// This module contains the database layer and the shared error type.
/// Everything a caller touches to talk to the driver lives below here.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{Result, SweetError};
