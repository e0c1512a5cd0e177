//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Target type classification and value coercion
//! - Row hydration into scalars and records
//! - The connection registry
//! - Driver traits, the sqlx driver and a scripted mock driver
//! - Procedure execution

pub mod coerce;
pub mod driver;
pub mod executor;
pub mod hydrate;
#[macro_use]
pub mod macros;
pub mod mock;
pub mod registry;
pub mod sqlx_driver;
pub mod types;

pub use coerce::{CoercionError, FromCell, coerce, coerce_to, try_coerce};
pub use driver::{Connection, ConnectionGuard, DataReader, Driver, RowSet};
pub use executor::DataAdapter;
pub use hydrate::{
    Field, Hydrate, RowCursor, hydrate, hydrate_record, hydrate_scalar, writable_fields,
};
pub use mock::{MockDriver, MockDriverError};
pub use registry::ConnectionRegistry;
pub use sqlx_driver::SqlxDriver;
pub use types::{TargetType, TypeCategory, categorize_type, is_struct_type};
