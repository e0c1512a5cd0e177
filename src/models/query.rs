//! Procedure invocation and result row models.

use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use std::collections::HashMap;

/// Named input arguments for a stored procedure, in declaration order.
///
/// A `Null` value is still bound as a parameter, never omitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcedureArgs {
    params: Vec<(String, SqlValue)>,
}

impl ProcedureArgs {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument. A later argument with the same name replaces the earlier value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.params.push((name, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for ProcedureArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (name, value) in iter {
            args.insert(name, value);
        }
        args
    }
}

impl From<HashMap<String, SqlValue>> for ProcedureArgs {
    fn from(map: HashMap<String, SqlValue>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Option<ProcedureArgs>> for ProcedureArgs {
    fn from(args: Option<ProcedureArgs>) -> Self {
        args.unwrap_or_default()
    }
}

/// One stored-procedure invocation: a validated procedure name plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureCall {
    pub procedure: String,
    pub args: ProcedureArgs,
}

impl ProcedureCall {
    /// Build an invocation, validating the procedure and parameter identifiers.
    ///
    /// Parameter names may carry a leading `@`, which is stripped.
    pub fn new(procedure: impl Into<String>, args: ProcedureArgs) -> DbResult<Self> {
        let procedure = procedure.into();
        if !is_qualified_identifier(&procedure) {
            return Err(DbError::invalid_input(format!(
                "Invalid procedure name: '{procedure}'"
            )));
        }

        let mut normalized = ProcedureArgs::new();
        for (name, value) in args.params {
            let bare = name.strip_prefix('@').unwrap_or(&name);
            if !is_identifier(bare) {
                return Err(DbError::invalid_input(format!(
                    "Invalid parameter name: '{name}'"
                )));
            }
            normalized.insert(bare, value);
        }

        Ok(Self {
            procedure,
            args: normalized,
        })
    }
}

/// `name` or `schema.name`, each part a plain identifier.
fn is_qualified_identifier(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_identifier)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// A materialized result row: ordered column names and their values.
///
/// Column names are not required to be unique; lookup by name returns the first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.push(column.into());
        self.values.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// First value whose column name matches exactly.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Render as a JSON object. Later duplicate columns do not overwrite earlier ones.
    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::with_capacity(self.len());
        for (column, value) in self.columns.iter().zip(&self.values) {
            if !map.contains_key(column) {
                map.insert(column.clone(), value.to_json());
            }
        }
        map
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
    }
}
