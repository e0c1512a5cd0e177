//! Procedure execution engine.
//!
//! `DataAdapter` ties the pieces together: it makes sure connections are
//! configured, resolves the connection string, opens one connection per call,
//! runs the procedure, and hydrates every row before the connection is closed.
//!
//! Results are fully materialized; no cursor outlives the call.

use crate::config::{AdapterOptions, ConnectionStrings};
use crate::db::driver::{ConnectionGuard, DataReader, Driver};
use crate::db::hydrate::{Hydrate, hydrate};
use crate::db::registry::ConnectionRegistry;
use crate::db::sqlx_driver::SqlxDriver;
use crate::error::{DbError, DbResult, DriverError};
use crate::models::{ProcedureArgs, ProcedureCall, Row, mask_connection_string};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Executes stored procedures against registered connections.
pub struct DataAdapter {
    registry: ConnectionRegistry,
    driver: Arc<dyn Driver>,
    options: AdapterOptions,
}

impl std::fmt::Debug for DataAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataAdapter")
            .field("connections", &self.registry.names())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl DataAdapter {
    /// Create an adapter with an empty registry.
    pub fn new(driver: impl Driver + 'static) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            driver: Arc::new(driver),
            options: AdapterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AdapterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Load connection strings from the settings file.
    ///
    /// Uses `path` when given, otherwise the configured default. Entries
    /// already registered are kept (first write wins). Returns the number of
    /// entries added.
    pub fn configure(&self, path: Option<&Path>) -> DbResult<usize> {
        let path = path.unwrap_or(&self.options.settings_path);
        info!(path = %path.display(), section = %self.options.section, "Loading connection strings");
        let section = ConnectionStrings::from_file(path, &self.options.section)?;
        self.registry.load(&section)
    }

    /// Register a connection directly, replacing any entry with the same name.
    pub fn register_connection(
        &self,
        name: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Option<String> {
        self.registry.register(name, connection_string)
    }

    /// Run a procedure and hydrate every result row into `T`.
    ///
    /// With no `connection` name the first registered connection is used.
    pub fn query_many<T: Hydrate>(
        &self,
        procedure: &str,
        args: impl Into<ProcedureArgs>,
        connection: Option<&str>,
    ) -> DbResult<Vec<T>> {
        self.read_all(procedure, args.into(), connection, |reader| {
            hydrate::<T, _>(reader)
        })
    }

    /// Like [`query_many`](Self::query_many), keeping only the first result.
    ///
    /// Zero rows is `Ok(None)`, not an error.
    pub fn query_one<T: Hydrate>(
        &self,
        procedure: &str,
        args: impl Into<ProcedureArgs>,
        connection: Option<&str>,
    ) -> DbResult<Option<T>> {
        Ok(self
            .query_many::<T>(procedure, args, connection)?
            .into_iter()
            .next())
    }

    /// Run a procedure and return its rows untyped.
    pub fn query_rows(
        &self,
        procedure: &str,
        args: impl Into<ProcedureArgs>,
        connection: Option<&str>,
    ) -> DbResult<Vec<Row>> {
        self.read_all(procedure, args.into(), connection, |reader| {
            (0..reader.field_count())
                .map(|idx| (reader.name(idx).to_string(), reader.value(idx).clone()))
                .collect::<Row>()
        })
    }

    /// Run a procedure for its side effects. Returns the affected-row count.
    pub fn execute(
        &self,
        procedure: &str,
        args: impl Into<ProcedureArgs>,
        connection: Option<&str>,
    ) -> DbResult<u64> {
        let (call, mut guard) = self.prepare(procedure, args.into(), connection)?;

        let affected = guard
            .connection()
            .execute_non_query(&call)
            .map_err(execution_error)?;

        close(guard);
        debug!(procedure = %call.procedure, affected, "Procedure executed");
        Ok(affected)
    }

    fn read_all<T>(
        &self,
        procedure: &str,
        args: ProcedureArgs,
        connection: Option<&str>,
        mut map: impl FnMut(&dyn DataReader) -> T,
    ) -> DbResult<Vec<T>> {
        let (call, mut guard) = self.prepare(procedure, args, connection)?;

        let items = {
            let mut reader = guard
                .connection()
                .execute_reader(&call)
                .map_err(execution_error)?;
            let mut items = Vec::new();
            while reader.read().map_err(execution_error)? {
                items.push(map(&*reader));
            }
            items
        };

        close(guard);
        debug!(procedure = %call.procedure, rows = items.len(), "Procedure returned");
        Ok(items)
    }

    /// Configure if needed, build the invocation and open its connection.
    fn prepare(
        &self,
        procedure: &str,
        args: ProcedureArgs,
        connection: Option<&str>,
    ) -> DbResult<(ProcedureCall, ConnectionGuard)> {
        self.ensure_configured()?;
        let connection_string = self.registry.resolve(connection)?;
        let call = ProcedureCall::new(procedure, args)?;

        debug!(
            procedure = %call.procedure,
            connection = connection.unwrap_or("<default>"),
            target = %mask_connection_string(&connection_string),
            "Opening connection for procedure"
        );

        let connection = self
            .driver
            .open(&connection_string)
            .map_err(|e| open_error(e, &connection_string))?;
        Ok((call, ConnectionGuard::new(connection)))
    }

    /// Load the default settings when nothing is registered yet.
    fn ensure_configured(&self) -> DbResult<()> {
        if self.registry.is_configured() {
            return Ok(());
        }
        debug!("No connections registered, loading default settings");
        self.configure(None).map(|_| ())
    }
}

impl Default for DataAdapter {
    fn default() -> Self {
        Self::new(SqlxDriver::new())
    }
}

fn close(guard: ConnectionGuard) {
    if let Err(e) = guard.close() {
        warn!(error = %e, "Failed to close connection");
    }
}

// A driver may report one of our own errors (e.g. an unsupported call
// context); those pass through unchanged.
fn execution_error(error: DriverError) -> DbError {
    match error.downcast::<DbError>() {
        Ok(err) => *err,
        Err(source) => DbError::execution(source),
    }
}

fn open_error(error: DriverError, connection_string: &str) -> DbError {
    match error.downcast::<DbError>() {
        Ok(err) => *err,
        Err(source) => DbError::connection(
            format!(
                "Failed to open connection to {}: {source}",
                mask_connection_string(connection_string)
            ),
            "Check that the server is reachable and the credentials are valid",
        ),
    }
}
