//! Database driver abstraction.
//!
//! The adapter talks to a database only through these traits: open a
//! connection from a connection string, execute a procedure invocation, and
//! walk the resulting rows. `SqlxDriver` is the production implementation;
//! `MockDriver` is the scripted one used in tests.

use crate::db::hydrate::RowCursor;
use crate::error::DriverError;
use crate::models::{ProcedureCall, Row, SqlValue};
use std::collections::VecDeque;
use tracing::warn;

/// Opens connections. Shared by every caller of an adapter.
pub trait Driver: Send + Sync {
    fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>, DriverError>;
}

/// A single open connection.
pub trait Connection: Send {
    /// Execute a procedure that returns rows.
    fn execute_reader(
        &mut self,
        call: &ProcedureCall,
    ) -> Result<Box<dyn DataReader + '_>, DriverError>;

    /// Execute a procedure for its side effects, returning the affected-row count.
    fn execute_non_query(&mut self, call: &ProcedureCall) -> Result<u64, DriverError>;

    fn close(&mut self) -> Result<(), DriverError>;
}

/// Forward-only reader over a result set.
///
/// `read` advances to the next row and returns false once results are exhausted.
/// Cell access through `RowCursor` is only valid after `read` returned true.
pub trait DataReader: RowCursor {
    fn read(&mut self) -> Result<bool, DriverError>;
}

/// A `DataReader` over rows that were already fetched.
#[derive(Debug, Default)]
pub struct RowSet {
    pending: VecDeque<Row>,
    current: Option<Row>,
}

static NULL: SqlValue = SqlValue::Null;

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            pending: rows.into(),
            current: None,
        }
    }
}

impl RowCursor for RowSet {
    fn field_count(&self) -> usize {
        self.current.as_ref().map_or(0, Row::len)
    }

    fn name(&self, index: usize) -> &str {
        self.current
            .as_ref()
            .and_then(|row| row.columns().get(index))
            .map_or("", String::as_str)
    }

    fn value(&self, index: usize) -> &SqlValue {
        self.current
            .as_ref()
            .and_then(|row| row.values().get(index))
            .unwrap_or(&NULL)
    }
}

impl DataReader for RowSet {
    fn read(&mut self) -> Result<bool, DriverError> {
        self.current = self.pending.pop_front();
        Ok(self.current.is_some())
    }
}

/// Scoped connection that is always closed.
///
/// Call [`ConnectionGuard::close`] on the success path; on every other path
/// (early return, error, panic) `Drop` closes the connection.
pub struct ConnectionGuard {
    connection: Box<dyn Connection>,
    closed: bool,
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl ConnectionGuard {
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection,
            closed: false,
        }
    }

    /// Get the underlying connection.
    pub fn connection(&mut self) -> &mut dyn Connection {
        self.connection.as_mut()
    }

    /// Explicitly close the connection (preferred over relying on Drop).
    pub fn close(mut self) -> Result<(), DriverError> {
        self.closed = true;
        self.connection.close()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        if let Err(e) = self.connection.close() {
            warn!(error = %e, "Failed to close connection released via Drop");
        }
    }
}
