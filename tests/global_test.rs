//! Integration test for the process-wide adapter functions.
//!
//! Kept in its own test binary because the global adapter is shared state.

use sproc_adapter::{DbError, ProcedureArgs};
use std::path::Path;

#[test]
fn test_global_adapter_lifecycle() {
    let err = sproc_adapter::configure(Some(Path::new("/nonexistent/appsettings.json")))
        .unwrap_err();
    assert!(matches!(err, DbError::Configuration { .. }));

    assert_eq!(
        sproc_adapter::register_connection("legacy", "sqlite:legacy.db"),
        None
    );
    assert!(sproc_adapter::global::adapter().registry().is_configured());

    // Unsupported scheme is rejected by the driver when opening.
    let err = sproc_adapter::query_many::<i32>("GetCount", ProcedureArgs::new(), None)
        .unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }));

    let err = sproc_adapter::query_one::<String>("GetName", ProcedureArgs::new(), Some("other"))
        .unwrap_err();
    assert!(matches!(err, DbError::ConnectionNotFound { .. }));

    let err = sproc_adapter::execute("Touch", None::<ProcedureArgs>, Some("legacy")).unwrap_err();
    assert!(matches!(err, DbError::Connection { .. }));
}
