//! Data models for the stored-procedure adapter.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod value;

// Re-export commonly used types
pub use connection::{DatabaseType, mask_connection_string};
pub use query::{ProcedureArgs, ProcedureCall, Row};
pub use value::{ParamType, SqlValue};
