//! Process-wide adapter.
//!
//! Free functions over one lazily created [`DataAdapter`] backed by
//! [`SqlxDriver`]. It reads `appsettings.json` on first use unless
//! connections were configured or registered before.
//!
//! Calls block the current thread; from async code, run them on a blocking
//! thread.

use crate::db::{DataAdapter, Hydrate, SqlxDriver};
use crate::error::DbResult;
use crate::models::ProcedureArgs;
use std::path::Path;
use std::sync::OnceLock;

static ADAPTER: OnceLock<DataAdapter> = OnceLock::new();

/// The process-wide adapter.
pub fn adapter() -> &'static DataAdapter {
    ADAPTER.get_or_init(|| DataAdapter::new(SqlxDriver::new()))
}

/// Load connection strings eagerly. See [`DataAdapter::configure`].
pub fn configure(path: Option<&Path>) -> DbResult<usize> {
    adapter().configure(path)
}

/// See [`DataAdapter::register_connection`].
pub fn register_connection(
    name: impl Into<String>,
    connection_string: impl Into<String>,
) -> Option<String> {
    adapter().register_connection(name, connection_string)
}

/// See [`DataAdapter::query_many`].
pub fn query_many<T: Hydrate>(
    procedure: &str,
    args: impl Into<ProcedureArgs>,
    connection: Option<&str>,
) -> DbResult<Vec<T>> {
    adapter().query_many(procedure, args, connection)
}

/// See [`DataAdapter::query_one`].
pub fn query_one<T: Hydrate>(
    procedure: &str,
    args: impl Into<ProcedureArgs>,
    connection: Option<&str>,
) -> DbResult<Option<T>> {
    adapter().query_one(procedure, args, connection)
}

/// See [`DataAdapter::execute`].
pub fn execute(
    procedure: &str,
    args: impl Into<ProcedureArgs>,
    connection: Option<&str>,
) -> DbResult<u64> {
    adapter().execute(procedure, args, connection)
}
