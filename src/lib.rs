//! Stored-procedure data adapter.
//!
//! Calls named stored procedures on PostgreSQL or MySQL and hydrates the
//! result rows into scalars or record types declared with [`record!`],
//! without hand-written mapping code.

pub mod config;
pub mod db;
pub mod error;
pub mod global;
pub mod models;

pub use config::{AdapterOptions, Config};
pub use db::{DataAdapter, Hydrate, MockDriver, SqlxDriver};
pub use error::{DbError, DbResult};
pub use global::{configure, execute, query_many, query_one, register_connection};
pub use models::{ProcedureArgs, Row, SqlValue};
