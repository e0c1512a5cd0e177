//! Best-effort value coercion.
//!
//! Converts an untyped `SqlValue` cell into a requested Rust type. The
//! conversion itself is fallible (`try_coerce`), but the hydration path only
//! ever calls `coerce`, which absorbs the failure and yields the target's
//! default value. Malformed cell data degrades a single field, never a row.

use crate::db::types::TargetType;
use crate::models::SqlValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::trace;
use uuid::Uuid;

/// Why a cell could not be converted. Never surfaced to callers of the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {found} to {target}: {reason}")]
pub struct CoercionError {
    pub target: &'static str,
    pub found: &'static str,
    pub reason: String,
}

impl CoercionError {
    fn new(target: &'static str, value: &SqlValue, reason: impl Into<String>) -> Self {
        Self {
            target,
            found: value.type_name(),
            reason: reason.into(),
        }
    }

    fn mismatch(target: &'static str, value: &SqlValue) -> Self {
        Self::new(target, value, "incompatible type")
    }
}

/// Conversion from a single cell.
pub trait FromCell: Sized {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError>;
}

/// Convert a cell, reporting failures.
pub fn try_coerce<T: FromCell>(value: &SqlValue) -> Result<T, CoercionError> {
    T::from_cell(value)
}

/// Convert a cell, falling back to `T::default()` on any failure.
pub fn coerce<T: FromCell + Default>(value: &SqlValue) -> T {
    match try_coerce(value) {
        Ok(v) => v,
        Err(e) => {
            trace!(error = %e, "Coercion failed, using default value");
            T::default()
        }
    }
}

/// Convert a cell to a runtime-described target.
///
/// Text targets always receive the cell's textual form. Scalar targets get a
/// value of the matching kind, or that kind's default on failure. An absent or
/// non-scalar target yields `Null`.
pub fn coerce_to(target: Option<TargetType>, value: &SqlValue) -> SqlValue {
    match target {
        Some(TargetType::Text) => SqlValue::Text(value.to_string()),
        Some(TargetType::Int16) => SqlValue::from(coerce::<i16>(value)),
        Some(TargetType::Int32) => SqlValue::from(coerce::<i32>(value)),
        Some(TargetType::Int64) => SqlValue::from(coerce::<i64>(value)),
        Some(TargetType::Float32) => SqlValue::from(coerce::<f32>(value)),
        Some(TargetType::Float64) => SqlValue::from(coerce::<f64>(value)),
        Some(TargetType::DateTime) => SqlValue::from(coerce::<NaiveDateTime>(value)),
        Some(TargetType::Uuid) => SqlValue::from(coerce::<Uuid>(value)),
        Some(TargetType::Other(_)) | None => SqlValue::Null,
    }
}

// =============================================================================
// Numeric Conversions
// =============================================================================

/// Round half to even, then range-check into the target integer.
fn float_to_int<T: TryFrom<i64>>(
    target: &'static str,
    value: &SqlValue,
    f: f64,
) -> Result<T, CoercionError> {
    let rounded = f.round_ties_even();
    if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
        return Err(CoercionError::new(target, value, "out of range"));
    }
    T::try_from(rounded as i64).map_err(|_| CoercionError::new(target, value, "out of range"))
}

macro_rules! impl_from_cell_int {
    ($($ty:ty),+) => {
        $(
            impl FromCell for $ty {
                fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
                    let target = stringify!($ty);
                    match value {
                        SqlValue::Int(v) => <$ty>::try_from(*v)
                            .map_err(|_| CoercionError::new(target, value, "out of range")),
                        SqlValue::Float(f) => float_to_int(target, value, *f),
                        SqlValue::Bool(b) => Ok(<$ty>::from(*b)),
                        SqlValue::Text(s) => s
                            .trim()
                            .parse::<$ty>()
                            .map_err(|e| CoercionError::new(target, value, e.to_string())),
                        _ => Err(CoercionError::mismatch(target, value)),
                    }
                }
            }
        )+
    };
}

impl_from_cell_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromCell for f64 {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Float(f) => Ok(*f),
            SqlValue::Int(v) => Ok(*v as f64),
            SqlValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            SqlValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| CoercionError::new("f64", value, e.to_string())),
            _ => Err(CoercionError::mismatch("f64", value)),
        }
    }
}

impl FromCell for f32 {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Text(s) => s
                .trim()
                .parse::<f32>()
                .map_err(|e| CoercionError::new("f32", value, e.to_string())),
            _ => f64::from_cell(value)
                .map(|f| f as f32)
                .map_err(|_| CoercionError::mismatch("f32", value)),
        }
    }
}

impl FromCell for bool {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Int(v) => Ok(*v != 0),
            SqlValue::Float(f) => Ok(*f != 0.0),
            SqlValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    trimmed
                        .parse::<i64>()
                        .map(|v| v != 0)
                        .map_err(|_| CoercionError::new("bool", value, "not a boolean"))
                }
            }
            _ => Err(CoercionError::mismatch("bool", value)),
        }
    }
}

// =============================================================================
// Text, Temporal and Identifier Conversions
// =============================================================================

impl FromCell for String {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
        Ok(value.to_string())
    }
}

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl FromCell for NaiveDateTime {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::DateTime(dt) => Ok(*dt),
            SqlValue::Text(s) => parse_datetime(s.trim())
                .ok_or_else(|| CoercionError::new("NaiveDateTime", value, "unrecognized format")),
            _ => Err(CoercionError::mismatch("NaiveDateTime", value)),
        }
    }
}

impl FromCell for NaiveDate {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
        NaiveDateTime::from_cell(value)
            .map(|dt| dt.date())
            .map_err(|e| CoercionError { target: "NaiveDate", ..e })
    }
}

impl FromCell for Uuid {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Uuid(u) => Ok(*u),
            SqlValue::Text(s) => {
                Uuid::parse_str(s.trim()).map_err(|e| CoercionError::new("Uuid", value, e.to_string()))
            }
            SqlValue::Bytes(b) => {
                Uuid::from_slice(b).map_err(|e| CoercionError::new("Uuid", value, e.to_string()))
            }
            _ => Err(CoercionError::mismatch("Uuid", value)),
        }
    }
}

impl FromCell for Vec<u8> {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Bytes(b) => Ok(b.clone()),
            SqlValue::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(CoercionError::mismatch("Vec<u8>", value)),
        }
    }
}

impl FromCell for SqlValue {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
        Ok(value.clone())
    }
}

impl<T: FromCell> FromCell for Option<T> {
    fn from_cell(value: &SqlValue) -> Result<Self, CoercionError> {
        match value {
            SqlValue::Null => Ok(None),
            _ => T::from_cell(value).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_datetime() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(8, 15, 30)
            .unwrap()
    }

    #[test]
    fn test_scalar_identity() {
        let dt = sample_datetime();
        let id = Uuid::new_v4();

        assert_eq!(coerce::<i16>(&SqlValue::Int(12)), 12);
        assert_eq!(coerce::<i32>(&SqlValue::Int(-7)), -7);
        assert_eq!(coerce::<i64>(&SqlValue::Int(i64::MAX)), i64::MAX);
        assert_eq!(coerce::<f32>(&SqlValue::Float(1.5)), 1.5);
        assert_eq!(coerce::<f64>(&SqlValue::Float(2.25)), 2.25);
        assert_eq!(coerce::<NaiveDateTime>(&SqlValue::DateTime(dt)), dt);
        assert_eq!(coerce::<Uuid>(&SqlValue::Uuid(id)), id);
        assert_eq!(coerce::<String>(&SqlValue::from("hi")), "hi");
    }

    #[test]
    fn test_text_target_is_stringification() {
        assert_eq!(coerce::<String>(&SqlValue::Int(7)), "7");
        assert_eq!(coerce::<String>(&SqlValue::Null), "");
        assert_eq!(
            coerce_to(Some(TargetType::Text), &SqlValue::Float(0.5)),
            SqlValue::Text("0.5".to_string())
        );
    }

    #[test]
    fn test_text_to_number() {
        assert_eq!(coerce::<i32>(&SqlValue::from("7")), 7);
        assert_eq!(coerce::<i64>(&SqlValue::from(" 42 ")), 42);
        assert_eq!(coerce::<f64>(&SqlValue::from("3.5")), 3.5);
    }

    #[test]
    fn test_malformed_text_defaults() {
        assert_eq!(coerce::<i32>(&SqlValue::from("abc")), 0);
        assert_eq!(coerce::<f64>(&SqlValue::from("n/a")), 0.0);
        assert_eq!(
            coerce::<NaiveDateTime>(&SqlValue::from("yesterday")),
            NaiveDateTime::default()
        );
        assert_eq!(coerce::<Uuid>(&SqlValue::from("not-a-uuid")), Uuid::nil());
        assert!(try_coerce::<i32>(&SqlValue::from("abc")).is_err());
    }

    #[test]
    fn test_null_defaults_for_non_option_targets() {
        assert_eq!(coerce::<i32>(&SqlValue::Null), 0);
        assert!(!coerce::<bool>(&SqlValue::Null));
        assert_eq!(coerce::<Option<i32>>(&SqlValue::Null), None);
        assert_eq!(coerce::<Option<i32>>(&SqlValue::from("5")), Some(5));
    }

    #[test]
    fn test_integer_range_checks() {
        assert_eq!(coerce::<i16>(&SqlValue::Int(70_000)), 0);
        assert!(try_coerce::<i16>(&SqlValue::Int(70_000)).is_err());
        assert_eq!(coerce::<u8>(&SqlValue::Int(-1)), 0);
    }

    #[test]
    fn test_float_to_int_rounds_half_to_even() {
        assert_eq!(coerce::<i32>(&SqlValue::Float(2.5)), 2);
        assert_eq!(coerce::<i32>(&SqlValue::Float(3.5)), 4);
        assert_eq!(coerce::<i32>(&SqlValue::Float(-1.6)), -2);
        assert_eq!(coerce::<i32>(&SqlValue::Float(f64::NAN)), 0);
        assert_eq!(coerce::<i32>(&SqlValue::Float(1e20)), 0);
    }

    #[test]
    fn test_bool_conversions() {
        assert!(coerce::<bool>(&SqlValue::Int(1)));
        assert!(coerce::<bool>(&SqlValue::from("TRUE")));
        assert!(!coerce::<bool>(&SqlValue::from("false")));
        assert!(!coerce::<bool>(&SqlValue::from("maybe")));
        assert_eq!(coerce::<i32>(&SqlValue::Bool(true)), 1);
    }

    #[test]
    fn test_datetime_text_formats() {
        let dt = sample_datetime();
        assert_eq!(coerce::<NaiveDateTime>(&SqlValue::from("2024-05-17 08:15:30")), dt);
        assert_eq!(coerce::<NaiveDateTime>(&SqlValue::from("2024-05-17T08:15:30")), dt);
        assert_eq!(
            coerce::<NaiveDateTime>(&SqlValue::from("2024-05-17T10:15:30+02:00")),
            dt
        );
        assert_eq!(
            coerce::<NaiveDate>(&SqlValue::from("2024-05-17")),
            dt.date()
        );
    }

    #[test]
    fn test_uuid_from_text_and_bytes() {
        let id = Uuid::new_v4();
        assert_eq!(coerce::<Uuid>(&SqlValue::Text(id.to_string())), id);
        assert_eq!(coerce::<Uuid>(&SqlValue::Bytes(id.as_bytes().to_vec())), id);
        assert_eq!(coerce::<Uuid>(&SqlValue::Bytes(vec![1, 2, 3])), Uuid::nil());
    }

    #[test]
    fn test_datetime_is_not_an_integer() {
        let err = try_coerce::<i64>(&SqlValue::DateTime(sample_datetime())).unwrap_err();
        assert_eq!(err.target, "i64");
        assert_eq!(err.found, "datetime");
    }

    #[test]
    fn test_coerce_to_dynamic_targets() {
        assert_eq!(
            coerce_to(Some(TargetType::Int32), &SqlValue::from("9")),
            SqlValue::Int(9)
        );
        assert_eq!(
            coerce_to(Some(TargetType::Int16), &SqlValue::from("oops")),
            SqlValue::Int(0)
        );
        assert_eq!(
            coerce_to(Some(TargetType::Float32), &SqlValue::Int(2)),
            SqlValue::Float(2.0)
        );
        assert_eq!(coerce_to(None, &SqlValue::Int(1)), SqlValue::Null);
        assert_eq!(
            coerce_to(Some(TargetType::Other("User")), &SqlValue::Int(1)),
            SqlValue::Null
        );
    }
}
