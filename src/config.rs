//! Configuration handling.
//!
//! Two layers: the settings document that supplies connection strings to a
//! `DataAdapter`, and the CLI arguments of the `sproc` binary.

use crate::error::{DbError, DbResult};
use crate::models::{ProcedureArgs, SqlValue};
use clap::Parser;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_SETTINGS_PATH: &str = "appsettings.json";
pub const CONNECTION_STRINGS_SECTION: &str = "ConnectionStrings";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Where a `DataAdapter` reads its connection strings from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Settings document loaded by implicit configuration.
    pub settings_path: PathBuf,
    /// Name of the object holding name → connection string entries.
    pub section: String,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            section: CONNECTION_STRINGS_SECTION.to_string(),
        }
    }
}

impl AdapterOptions {
    pub fn with_settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = path.into();
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }
}

/// The connection-strings section of a settings document, in document order.
///
/// Entries whose value is null or not a string are kept with no value so the
/// registry can report and skip them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStrings {
    entries: Vec<(String, Option<String>)>,
}

impl ConnectionStrings {
    /// Read `section` from the JSON settings file at `path`.
    pub fn from_file(path: &Path, section: &str) -> DbResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DbError::configuration(format!(
                "Unable to load connection strings from {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&content, section).map_err(|e| match e {
            DbError::Configuration { message } => {
                DbError::configuration(format!("{message} ({})", path.display()))
            }
            other => other,
        })
    }

    /// Parse `section` out of a JSON settings document.
    pub fn from_json_str(json: &str, section: &str) -> DbResult<Self> {
        let document: JsonValue = serde_json::from_str(json).map_err(|e| {
            DbError::configuration(format!("Unable to load connection strings: {e}"))
        })?;

        let object = document
            .get(section)
            .and_then(JsonValue::as_object)
            .ok_or_else(|| {
                DbError::configuration(format!(
                    "Unable to load connection strings: section '{section}' is missing or not an object"
                ))
            })?;

        let entries = object
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    JsonValue::String(s) => Some(s.clone()),
                    JsonValue::Null => None,
                    other => {
                        warn!(connection = %name, kind = json_kind(other), "Connection string is not text");
                        None
                    }
                };
                (name.clone(), value)
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Parse a `name=value` procedure argument.
///
/// The value is typed by its text: `null`, `true`/`false`, an integer, a
/// float, and otherwise plain text. Quote-free text only; `name=` is an
/// empty string.
pub fn parse_arg(s: &str) -> DbResult<(String, SqlValue)> {
    let (name, raw) = s.split_once('=').ok_or_else(|| {
        DbError::invalid_input(format!("Invalid argument '{s}': expected name=value"))
    })?;

    let name = name.trim();
    if name.is_empty() {
        return Err(DbError::invalid_input(format!(
            "Invalid argument '{s}': parameter name is empty"
        )));
    }

    let value = if raw.eq_ignore_ascii_case("null") {
        SqlValue::Null
    } else if raw.eq_ignore_ascii_case("true") {
        SqlValue::Bool(true)
    } else if raw.eq_ignore_ascii_case("false") {
        SqlValue::Bool(false)
    } else if let Ok(i) = raw.parse::<i64>() {
        SqlValue::Int(i)
    } else if let Some(f) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
        SqlValue::Float(f)
    } else {
        SqlValue::Text(raw.to_string())
    };

    Ok((name.to_string(), value))
}

/// Command-line configuration for `sproc`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sproc",
    about = "Run a stored procedure and print its result rows as JSON lines",
    version,
    author
)]
pub struct Config {
    /// Settings file holding the ConnectionStrings section
    #[arg(
        short,
        long,
        value_name = "PATH",
        default_value = DEFAULT_SETTINGS_PATH,
        env = "SPROC_SETTINGS"
    )]
    pub settings: PathBuf,

    /// Named connection to use (default: first configured)
    #[arg(short, long, value_name = "NAME", env = "SPROC_CONNECTION")]
    pub connection: Option<String>,

    /// Procedure argument as name=value. Can be specified multiple times.
    #[arg(short, long = "arg", value_name = "NAME=VALUE")]
    pub args: Vec<String>,

    /// Execute for side effects and print the affected-row count
    #[arg(short = 'x', long)]
    pub execute: bool,

    /// Stored procedure to call
    #[arg(value_name = "PROCEDURE")]
    pub procedure: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "SPROC_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "SPROC_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output on stderr (disabled by default to keep output clean)
    #[arg(long, env = "SPROC_ENABLE_LOGS")]
    pub enable_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            settings: PathBuf::from(DEFAULT_SETTINGS_PATH),
            connection: None,
            args: Vec::new(),
            execute: false,
            procedure: String::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
            enable_logs: false,
        }
    }

    /// Parse all `--arg` values, in the order given.
    pub fn procedure_args(&self) -> DbResult<ProcedureArgs> {
        self.args.iter().map(|s| parse_arg(s)).collect()
    }

    /// Adapter options pointing at the configured settings file.
    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions::default().with_settings_path(&self.settings)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
