//! Mock driver for testing.
//!
//! Serves canned result sets per procedure name and records every call, so
//! the adapter can be exercised without a database server.

use crate::db::driver::{Connection, DataReader, Driver, RowSet};
use crate::error::DriverError;
use crate::models::{ProcedureCall, Row};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Error raised by the mock driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MockDriverError(pub String);

#[derive(Debug, Clone)]
enum MockResponse {
    Rows(Vec<Row>),
    Affected(u64),
    Fail(String),
}

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, MockResponse>,
    calls: Vec<(String, ProcedureCall)>,
    open_failure: Option<String>,
}

/// Scripted driver. Clones share state, so a test can keep a handle after
/// moving the driver into an adapter.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MockDriver {
    /// Creates a new mock driver with no scripted procedures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `rows` whenever `procedure` is read.
    pub fn with_rows(self, procedure: impl Into<String>, rows: Vec<Row>) -> Self {
        self.script(procedure, MockResponse::Rows(rows));
        self
    }

    /// Report `count` affected rows whenever `procedure` is executed.
    pub fn with_affected(self, procedure: impl Into<String>, count: u64) -> Self {
        self.script(procedure, MockResponse::Affected(count));
        self
    }

    /// Fail execution of `procedure` with `message`.
    pub fn with_failure(self, procedure: impl Into<String>, message: impl Into<String>) -> Self {
        self.script(procedure, MockResponse::Fail(message.into()));
        self
    }

    /// Fail every attempt to open a connection.
    pub fn failing_open(self, message: impl Into<String>) -> Self {
        self.lock().open_failure = Some(message.into());
        self
    }

    /// Calls received so far, as (connection string, invocation).
    pub fn calls(&self) -> Vec<(String, ProcedureCall)> {
        self.lock().calls.clone()
    }

    /// Number of successfully opened connections.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of connections closed.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn script(&self, procedure: impl Into<String>, response: MockResponse) {
        self.lock().responses.insert(procedure.into(), response);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Driver for MockDriver {
    fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>, DriverError> {
        if let Some(message) = self.lock().open_failure.clone() {
            return Err(Box::new(MockDriverError(message)));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            driver: self.clone(),
            connection_string: connection_string.to_string(),
            open: true,
        }))
    }
}

struct MockConnection {
    driver: MockDriver,
    connection_string: String,
    open: bool,
}

impl MockConnection {
    fn respond(&self, call: &ProcedureCall) -> Result<MockResponse, DriverError> {
        if !self.open {
            return Err(Box::new(MockDriverError("connection is closed".to_string())));
        }
        let mut state = self.driver.lock();
        state
            .calls
            .push((self.connection_string.clone(), call.clone()));
        match state.responses.get(&call.procedure) {
            Some(MockResponse::Fail(message)) => Err(Box::new(MockDriverError(message.clone()))),
            Some(response) => Ok(response.clone()),
            None => Err(Box::new(MockDriverError(format!(
                "Could not find stored procedure '{}'",
                call.procedure
            )))),
        }
    }
}

impl Connection for MockConnection {
    fn execute_reader(
        &mut self,
        call: &ProcedureCall,
    ) -> Result<Box<dyn DataReader + '_>, DriverError> {
        let rows = match self.respond(call)? {
            MockResponse::Rows(rows) => rows,
            _ => Vec::new(),
        };
        Ok(Box::new(RowSet::new(rows)))
    }

    fn execute_non_query(&mut self, call: &ProcedureCall) -> Result<u64, DriverError> {
        match self.respond(call)? {
            MockResponse::Affected(count) => Ok(count),
            MockResponse::Rows(rows) => Ok(rows.len() as u64),
            MockResponse::Fail(_) => Ok(0),
        }
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if self.open {
            self.open = false;
            self.driver.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
