//! Blocking driver over sqlx.
//!
//! Each `open` makes one dedicated connection (no pool). The async sqlx calls
//! are driven to completion on a private multi-thread tokio runtime, so the
//! driver must be called from plain threads, never from inside a runtime.
//!
//! # Architecture
//!
//! Database-specific code lives in parallel submodules:
//! - `postgres`: named-argument procedure calls and PostgreSQL decoders
//! - `mysql`: positional `CALL` statements and MySQL decoders

use crate::db::driver::{Connection, DataReader, Driver, RowSet};
use crate::db::types::{RawDecimal, TypeCategory, categorize_type};
use crate::error::{DbError, DriverError};
use crate::models::{
    DatabaseType, ParamType, ProcedureCall, Row, SqlValue, mask_connection_string,
};
use sqlx::Connection as _;
use sqlx::mysql::MySqlConnection;
use sqlx::postgres::PgConnection;
use sqlx::{Column, Row as _, TypeInfo};
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, trace};

/// Production driver for PostgreSQL and MySQL connection strings.
#[derive(Debug, Default)]
pub struct SqlxDriver {
    runtime: OnceLock<Runtime>,
}

impl SqlxDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self) -> Result<Handle, DriverError> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime.handle().clone());
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("sproc-sqlx")
            .enable_all()
            .build()?;
        // A concurrent caller may have won the race; its runtime is kept.
        Ok(self.runtime.get_or_init(|| runtime).handle().clone())
    }
}

fn ensure_blocking_context() -> Result<(), DriverError> {
    if Handle::try_current().is_ok() {
        return Err(Box::new(DbError::internal(
            "The blocking driver was called from inside an async runtime; \
             move the call onto a blocking thread (e.g. tokio::task::spawn_blocking)",
        )));
    }
    Ok(())
}

impl Driver for SqlxDriver {
    fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>, DriverError> {
        ensure_blocking_context()?;

        let Some(db_type) = DatabaseType::from_connection_string(connection_string) else {
            return Err(Box::new(DbError::connection(
                format!(
                    "Unsupported connection string: {}",
                    mask_connection_string(connection_string)
                ),
                "Use a postgres:// or mysql:// connection URL",
            )));
        };

        let handle = self.handle()?;
        debug!(
            database = %db_type,
            connection = %mask_connection_string(connection_string),
            "Opening connection"
        );

        let backend = match db_type {
            DatabaseType::PostgreSQL => {
                Backend::Postgres(handle.block_on(PgConnection::connect(connection_string))?)
            }
            DatabaseType::MySQL => {
                let url = match connection_string.strip_prefix("mariadb://") {
                    Some(rest) => format!("mysql://{rest}"),
                    None => connection_string.to_string(),
                };
                Backend::MySql(handle.block_on(MySqlConnection::connect(&url))?)
            }
        };

        Ok(Box::new(SqlxConnection {
            handle,
            backend: Some(backend),
        }))
    }
}

enum Backend {
    Postgres(PgConnection),
    MySql(MySqlConnection),
}

struct SqlxConnection {
    handle: Handle,
    /// None once closed.
    backend: Option<Backend>,
}

impl SqlxConnection {
    fn block_on<F: Future>(&self, future: F) -> Result<F::Output, DriverError> {
        ensure_blocking_context()?;
        Ok(self.handle.block_on(future))
    }

    fn backend(&mut self) -> Result<&mut Backend, DriverError> {
        self.backend
            .as_mut()
            .ok_or_else(|| "connection is closed".into())
    }
}

fn log_call(call: &ProcedureCall, sql: &str) {
    debug!(
        procedure = %call.procedure,
        sql = %sql,
        params = call.args.len(),
        "Executing procedure"
    );
    for (name, value) in call.args.iter() {
        trace!(param = name, kind = ?value.parameter_type(), null = value.is_null(), "Bound parameter");
    }
}

impl Connection for SqlxConnection {
    fn execute_reader(
        &mut self,
        call: &ProcedureCall,
    ) -> Result<Box<dyn DataReader + '_>, DriverError> {
        let handle = self.handle.clone();
        ensure_blocking_context()?;

        let rows = match self.backend()? {
            Backend::Postgres(conn) => {
                let sql = postgres::reader_sql(call);
                log_call(call, &sql);
                let mut query = sqlx::query(&sql);
                for (_, value) in call.args.iter() {
                    query = postgres::bind_param(query, value);
                }
                let rows = handle.block_on(query.fetch_all(&mut *conn))?;
                rows.iter().map(postgres::decode_row).collect()
            }
            Backend::MySql(conn) => {
                let sql = mysql::call_sql(call);
                log_call(call, &sql);
                let mut query = sqlx::query(&sql);
                for (_, value) in call.args.iter() {
                    query = mysql::bind_param(query, value);
                }
                let rows = handle.block_on(query.fetch_all(&mut *conn))?;
                rows.iter().map(mysql::decode_row).collect()
            }
        };

        Ok(Box::new(RowSet::new(rows)))
    }

    fn execute_non_query(&mut self, call: &ProcedureCall) -> Result<u64, DriverError> {
        let handle = self.handle.clone();
        ensure_blocking_context()?;

        let result = match self.backend()? {
            Backend::Postgres(conn) => {
                let sql = postgres::non_query_sql(call);
                log_call(call, &sql);
                let mut query = sqlx::query(&sql);
                for (_, value) in call.args.iter() {
                    query = postgres::bind_param(query, value);
                }
                handle.block_on(query.execute(&mut *conn))?.rows_affected()
            }
            Backend::MySql(conn) => {
                let sql = mysql::call_sql(call);
                log_call(call, &sql);
                let mut query = sqlx::query(&sql);
                for (_, value) in call.args.iter() {
                    query = mysql::bind_param(query, value);
                }
                handle.block_on(query.execute(&mut *conn))?.rows_affected()
            }
        };

        Ok(result)
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let Some(backend) = self.backend.take() else {
            return Ok(());
        };
        match backend {
            Backend::Postgres(conn) => self.block_on(conn.close())??,
            Backend::MySql(conn) => self.block_on(conn.close())??,
        }
        Ok(())
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn decode_failed(column: &str, type_name: &str, error: sqlx::Error) -> SqlValue {
    trace!(column, type_name, error = %error, "Cell could not be decoded, using NULL");
    SqlValue::Null
}

fn unsigned_value(v: u64) -> SqlValue {
    i64::try_from(v).map_or_else(|_| SqlValue::Text(v.to_string()), SqlValue::Int)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.

mod postgres {
    use super::*;
    use sqlx::encode::IsNull;
    use sqlx::error::BoxDynError;
    use sqlx::postgres::types::Oid;
    use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo};

    /// A NULL argument with no declared type.
    ///
    /// Sent with oid 0, so the server takes the type from the matching
    /// procedure parameter. A typed NULL (e.g. `text`) would only match
    /// parameters reachable from that type by implicit cast.
    pub struct UntypedNull;

    impl sqlx::Type<sqlx::Postgres> for UntypedNull {
        fn type_info() -> PgTypeInfo {
            PgTypeInfo::with_oid(Oid(0))
        }
    }

    impl sqlx::Encode<'_, sqlx::Postgres> for UntypedNull {
        fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
            Ok(IsNull::Yes)
        }
    }

    /// `SELECT * FROM proc(a => $1, b => $2)`
    pub fn reader_sql(call: &ProcedureCall) -> String {
        format!("SELECT * FROM {}({})", call.procedure, named_args(call))
    }

    /// `CALL proc(a => $1, b => $2)`
    pub fn non_query_sql(call: &ProcedureCall) -> String {
        format!("CALL {}({})", call.procedure, named_args(call))
    }

    fn named_args(call: &ProcedureCall) -> String {
        call.args
            .iter()
            .enumerate()
            .map(|(idx, (name, _))| format!("{name} => ${}", idx + 1))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn bind_param<'q>(
        query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
        value: &'q SqlValue,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
        match (value, value.parameter_type()) {
            (SqlValue::Null, _) => query.bind(UntypedNull),
            (SqlValue::Bool(v), _) => query.bind(*v),
            (SqlValue::Int(v), ParamType::SmallInt) => query.bind(*v as i16),
            (SqlValue::Int(v), ParamType::Int) => query.bind(*v as i32),
            (SqlValue::Int(v), _) => query.bind(*v),
            (SqlValue::Float(v), _) => query.bind(*v),
            (SqlValue::Text(v), _) => query.bind(v.as_str()),
            (SqlValue::DateTime(v), _) => query.bind(*v),
            (SqlValue::Uuid(v), _) => query.bind(*v),
            (SqlValue::Bytes(v), _) => query.bind(v.as_slice()),
        }
    }

    pub fn decode_row(row: &PgRow) -> Row {
        row.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::PostgreSQL);
                let value = decode_column(row, idx, col.name(), type_name, category);
                (col.name().to_string(), value)
            })
            .collect()
    }

    fn decode_column(
        row: &PgRow,
        idx: usize,
        column: &str,
        type_name: &str,
        category: TypeCategory,
    ) -> SqlValue {
        let decoded = match category {
            TypeCategory::Decimal => row
                .try_get::<Option<RawDecimal>, _>(idx)
                .map(|v| v.map(|d| SqlValue::Text(d.0))),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row.try_get::<Option<bool>, _>(idx).map(|v| v.map(SqlValue::Bool)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .map(|v| v.map(SqlValue::Bytes)),
            TypeCategory::Json => row
                .try_get::<Option<serde_json::Value>, _>(idx)
                .map(|v| v.map(|j| SqlValue::Text(j.to_string()))),
            TypeCategory::Uuid => row
                .try_get::<Option<uuid::Uuid>, _>(idx)
                .map(|v| v.map(SqlValue::Uuid)),
            TypeCategory::DateTime => decode_datetime(row, idx),
            TypeCategory::Date => row
                .try_get::<Option<chrono::NaiveDate>, _>(idx)
                .map(|v| v.map(|d| SqlValue::DateTime(d.and_time(chrono::NaiveTime::MIN)))),
            TypeCategory::Text | TypeCategory::Unknown => row
                .try_get::<Option<String>, _>(idx)
                .map(|v| v.map(SqlValue::Text)),
        };

        match decoded {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => decode_failed(column, type_name, e),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(v.map(SqlValue::from));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(v.map(SqlValue::from));
        }
        row.try_get::<Option<i64>, _>(idx).map(|v| v.map(SqlValue::Int))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(v.map(SqlValue::Float));
        }
        row.try_get::<Option<f32>, _>(idx).map(|v| v.map(SqlValue::from))
    }

    fn decode_datetime(row: &PgRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return Ok(v.map(SqlValue::DateTime));
        }
        row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map(|v| v.map(|dt| SqlValue::DateTime(dt.naive_utc())))
    }
}

mod mysql {
    use super::*;
    use sqlx::mysql::{MySqlArguments, MySqlRow};

    /// `CALL proc(?, ?)`, arguments bound positionally in declaration order.
    pub fn call_sql(call: &ProcedureCall) -> String {
        let placeholders = vec!["?"; call.args.len()].join(", ");
        format!("CALL {}({placeholders})", call.procedure)
    }

    pub fn bind_param<'q>(
        query: sqlx::query::Query<'q, sqlx::MySql, MySqlArguments>,
        value: &'q SqlValue,
    ) -> sqlx::query::Query<'q, sqlx::MySql, MySqlArguments> {
        match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::DateTime(v) => query.bind(*v),
            // No native uuid type; stored as CHAR(36)
            SqlValue::Uuid(v) => query.bind(v.to_string()),
            SqlValue::Bytes(v) => query.bind(v.as_slice()),
        }
    }

    pub fn decode_row(row: &MySqlRow) -> Row {
        row.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::MySQL);
                let value = decode_column(row, idx, col.name(), type_name, category);
                (col.name().to_string(), value)
            })
            .collect()
    }

    fn decode_column(
        row: &MySqlRow,
        idx: usize,
        column: &str,
        type_name: &str,
        category: TypeCategory,
    ) -> SqlValue {
        let decoded = match category {
            TypeCategory::Decimal => row
                .try_get::<Option<RawDecimal>, _>(idx)
                .map(|v| v.map(|d| SqlValue::Text(d.0))),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => row.try_get::<Option<bool>, _>(idx).map(|v| v.map(SqlValue::Bool)),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .map(|v| v.map(SqlValue::Bytes)),
            TypeCategory::Json => row
                .try_get::<Option<serde_json::Value>, _>(idx)
                .map(|v| v.map(|j| SqlValue::Text(j.to_string()))),
            TypeCategory::DateTime => decode_datetime(row, idx),
            TypeCategory::Date => row
                .try_get::<Option<chrono::NaiveDate>, _>(idx)
                .map(|v| v.map(|d| SqlValue::DateTime(d.and_time(chrono::NaiveTime::MIN)))),
            TypeCategory::Uuid | TypeCategory::Text | TypeCategory::Unknown => row
                .try_get::<Option<String>, _>(idx)
                .map(|v| v.map(SqlValue::Text)),
        };

        match decoded {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => decode_failed(column, type_name, e),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
        // Try signed types
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return Ok(v.map(SqlValue::from));
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(v.map(SqlValue::from));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(v.map(SqlValue::from));
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(v.map(SqlValue::Int));
        }
        // Try unsigned types
        if let Ok(v) = row.try_get::<Option<u8>, _>(idx) {
            return Ok(v.map(SqlValue::from));
        }
        if let Ok(v) = row.try_get::<Option<u16>, _>(idx) {
            return Ok(v.map(SqlValue::from));
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return Ok(v.map(SqlValue::from));
        }
        row.try_get::<Option<u64>, _>(idx).map(|v| v.map(unsigned_value))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(v.map(SqlValue::Float));
        }
        row.try_get::<Option<f32>, _>(idx).map(|v| v.map(SqlValue::from))
    }

    fn decode_datetime(row: &MySqlRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
        if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
            return Ok(v.map(SqlValue::DateTime));
        }
        row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map(|v| v.map(|dt| SqlValue::DateTime(dt.naive_utc())))
    }
}
