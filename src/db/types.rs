//! Type classification.
//!
//! Two classifications live here:
//! 1. `TargetType` decides how a requested Rust output type is hydrated:
//!    scalars come from a single cell, everything else is filled field by field.
//! 2. `TypeCategory` classifies database column type names so drivers can pick
//!    a decoder for each cell.

use crate::models::DatabaseType;
use sqlx::mysql::{MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgTypeInfo, PgValueRef};
use sqlx::{Decode, Type, TypeInfo};

// =============================================================================
// Target Classification
// =============================================================================

/// Descriptor of a requested output type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    DateTime,
    Uuid,
    Text,
    /// Anything outside the scalar set, by type name.
    Other(&'static str),
}

impl TargetType {
    /// The fixed scalar set.
    pub const SCALARS: [TargetType; 8] = [
        TargetType::Int16,
        TargetType::Int32,
        TargetType::Int64,
        TargetType::Float32,
        TargetType::Float64,
        TargetType::DateTime,
        TargetType::Uuid,
        TargetType::Text,
    ];

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::DateTime => "NaiveDateTime",
            Self::Uuid => "Uuid",
            Self::Text => "String",
            Self::Other(name) => *name,
        }
    }
}

/// Whether a target is hydrated from exactly one cell.
///
/// An absent descriptor counts as scalar.
pub fn is_struct_type(target: Option<&TargetType>) -> bool {
    target.is_none_or(TargetType::is_scalar)
}

// =============================================================================
// Column Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    DateTime,
    Date,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    // Date/time
    if lower.starts_with("timestamp") || lower == "datetime" {
        return TypeCategory::DateTime;
    }
    if lower == "date" {
        return TypeCategory::Date;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // "interval" and "point" contain "int" but are not integers
    if lower == "interval" || lower == "point" {
        return TypeCategory::Unknown;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
        return TypeCategory::Integer;
    }

    // Float types
    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    // JSON types
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    // UUID is native only on PostgreSQL
    if lower == "uuid" && db == DatabaseType::PostgreSQL {
        return TypeCategory::Uuid;
    }

    // Binary types
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    // Default to text decoding for everything else (time, enums, etc.)
    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_scalar_is_struct_type() {
        for target in TargetType::SCALARS {
            assert!(is_struct_type(Some(&target)), "{target:?}");
        }
    }

    #[test]
    fn test_absent_target_is_struct_type() {
        assert!(is_struct_type(None));
    }

    #[test]
    fn test_other_types_are_records() {
        assert!(!is_struct_type(Some(&TargetType::Other("User"))));
        assert!(!is_struct_type(Some(&TargetType::Other("bool"))));
    }

    #[test]
    fn test_target_names() {
        assert_eq!(TargetType::Int32.name(), "i32");
        assert_eq!(TargetType::Other("Order").name(), "Order");
    }

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYINT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INT4", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::PostgreSQL),
            TypeCategory::Decimal
        );
    }

    #[test]
    fn test_categorize_type_temporal() {
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::DateTime
        );
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::MySQL),
            TypeCategory::DateTime
        );
        assert_eq!(
            categorize_type("DATE", DatabaseType::MySQL),
            TypeCategory::Date
        );
        assert_eq!(
            categorize_type("TIME", DatabaseType::MySQL),
            TypeCategory::Unknown
        );
        assert_eq!(
            categorize_type("INTERVAL", DatabaseType::PostgreSQL),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_categorize_type_misc() {
        assert_eq!(
            categorize_type("jsonb", DatabaseType::PostgreSQL),
            TypeCategory::Json
        );
        assert_eq!(
            categorize_type("UUID", DatabaseType::PostgreSQL),
            TypeCategory::Uuid
        );
        assert_eq!(
            categorize_type("BYTEA", DatabaseType::PostgreSQL),
            TypeCategory::Binary
        );
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::MySQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("BOOL", DatabaseType::PostgreSQL),
            TypeCategory::Boolean
        );
    }
}
