//! Wire-level cell and parameter values.
//!
//! `SqlValue` is what a driver hands back for each cell of a result row and
//! what callers pass as procedure arguments.

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

/// A single untyped cell or parameter value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    /// NULL value
    #[default]
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Uuid(Uuid),
    Bytes(Vec<u8>),
}

/// Vendor parameter category for a bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Int,
    BigInt,
    SmallInt,
    Float,
    VarBinary,
    DateTime2,
    UniqueIdentifier,
    VarChar,
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::DateTime(_) => "datetime",
            Self::Uuid(_) => "uuid",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Parameter category used when binding this value.
    ///
    /// Integers are sized by magnitude; anything without a dedicated
    /// category (null, booleans, text) binds as `VarChar`.
    pub fn parameter_type(&self) -> ParamType {
        match self {
            Self::Int(v) if i16::try_from(*v).is_ok() => ParamType::SmallInt,
            Self::Int(v) if i32::try_from(*v).is_ok() => ParamType::Int,
            Self::Int(_) => ParamType::BigInt,
            Self::Float(_) => ParamType::Float,
            Self::Bytes(_) => ParamType::VarBinary,
            Self::DateTime(_) => ParamType::DateTime2,
            Self::Uuid(_) => ParamType::UniqueIdentifier,
            Self::Null | Self::Bool(_) | Self::Text(_) => ParamType::VarChar,
        }
    }

    /// Render this value as JSON for display.
    ///
    /// Binary data is base64 encoded; non-finite floats become strings.
    pub fn to_json(&self) -> JsonValue {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Int(v) => JsonValue::Number((*v).into()),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string())),
            Self::Text(v) => JsonValue::String(v.clone()),
            Self::DateTime(v) => JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Self::Uuid(v) => JsonValue::String(v.to_string()),
            Self::Bytes(v) => JsonValue::String(STANDARD.encode(v)),
        }
    }
}

/// Textual form of a cell. This is what text coercion produces.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::DateTime(v) => write!(f, "{v}"),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Bytes(v) => f.write_str(&STANDARD.encode(v)),
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    Self::Int(i64::from(v))
                }
            }
        )+
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}
