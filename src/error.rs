//! Error types for the stored-procedure adapter.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Configuration and connection failures carry actionable messages; driver failures
//! during execution are kept as their original error so callers can inspect them.

use thiserror::Error;

/// Boxed error produced by a database driver.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Connection not found: {connection_id}")]
    ConnectionNotFound { connection_id: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    /// Raised by the driver while executing a command. Displayed verbatim.
    #[error("{source}")]
    Execution {
        #[source]
        source: DriverError,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection not found error.
    pub fn connection_not_found(connection_id: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            connection_id: connection_id.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Wrap a driver error raised while executing a command.
    pub fn execution(source: impl Into<DriverError>) -> Self {
        Self::Execution {
            source: source.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Configuration { .. } => {
                Some("Provide a settings file with a non-empty ConnectionStrings section")
            }
            Self::ConnectionNotFound { .. } => {
                Some("Register the connection or add it to the ConnectionStrings section")
            }
            _ => None,
        }
    }

    /// The driver error behind an execution failure.
    pub fn driver_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Execution { source } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// Vendor error code (SQLSTATE) of an execution failure, e.g. "23505".
    pub fn sql_state(&self) -> Option<String> {
        match self.driver_error()?.downcast_ref::<sqlx::Error>()? {
            sqlx::Error::Database(db_err) => db_err.code().map(|c| c.to_string()),
            _ => None,
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("duplicate key value violates unique constraint")]
    struct FakeDriverError;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::connection("refused", "Check the server is running");
        assert_eq!(err.suggestion(), Some("Check the server is running"));
        assert!(DbError::configuration("empty").suggestion().is_some());
        assert!(DbError::internal("oops").suggestion().is_none());
    }

    #[test]
    fn test_execution_error_is_verbatim() {
        let err = DbError::execution(FakeDriverError);
        assert_eq!(
            err.to_string(),
            "duplicate key value violates unique constraint"
        );
        let inner = err.driver_error().unwrap();
        assert!(inner.downcast_ref::<FakeDriverError>().is_some());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_sql_state_absent_for_non_sqlx_errors() {
        let err = DbError::execution(FakeDriverError);
        assert_eq!(err.sql_state(), None);
        assert_eq!(DbError::configuration("x").sql_state(), None);
    }

    #[test]
    fn test_sql_state_absent_for_protocol_errors() {
        let err = DbError::execution(sqlx::Error::Protocol("bad packet".to_string()));
        assert_eq!(err.sql_state(), None);
        assert!(err.to_string().contains("bad packet"));
    }

    #[test]
    fn test_configuration_display() {
        let err = DbError::configuration("No connections configured.");
        assert_eq!(
            err.to_string(),
            "Configuration error: No connections configured."
        );
    }
}
