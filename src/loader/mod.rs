//! Data loading
//!
//! The loader pushes rows into backend tables through a [`TableWriter`].
//! Freshly created tables are eventually consistent on several backends, so
//! `load` retries transient insert failures with exponential backoff before
//! giving up with the last backend error.

use std::fmt;
use std::time::Duration;

use tracing::info;

use crate::engine::{EngineError, EngineErrorKind};
use crate::schema::{Field, FieldType};
use crate::value::Value;

/// Sleeps of 1, 2, 4, 8, 16 seconds before aborting
const MAX_SLEEPS: u32 = 5;

/// Write surface of a backend: table lifecycle plus bulk inserts
pub trait TableWriter: Send + Sync {
    fn create_table(&self, name: &str, fields: &[Field]) -> Result<(), EngineError>;

    fn drop_table(&self, name: &str) -> Result<(), EngineError>;

    fn fields(&self, name: &str) -> Result<Vec<Field>, EngineError>;

    fn insert(&self, name: &str, rows: &[Vec<Value>]) -> Result<(), EngineError>;
}

/// The loading contract
pub trait DataLoader {
    /// Idempotent create: an existing table is dropped and recreated
    fn drop_and_create_in_memory_table(
        &self,
        name: &str,
        fields: &[Field],
    ) -> Result<(), LoadError>;

    /// Insert tuples, retrying transient backend errors
    fn load(&self, store: &str, rows: Vec<Vec<Value>>) -> Result<(), LoadError>;

    fn load_csv(
        &self,
        _store: &str,
        _path: &str,
        _delimiter: &str,
        _header: bool,
    ) -> Result<(), LoadError> {
        Err(LoadError::Unsupported("CSV loading".to_string()))
    }
}

/// Loader over any [`TableWriter`].
///
/// `base_delay` is the first backoff sleep; production use keeps the default
/// one second, tests shrink it.
pub struct BatchLoader<W: TableWriter> {
    writer: W,
    base_delay: Duration,
}

impl<W: TableWriter> BatchLoader<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(writer: W, base_delay: Duration) -> Self {
        Self { writer, base_delay }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Serialize one tuple for the wire: temporal values as ISO-8601 text,
    /// object-typed fields as JSON text.
    fn serialize_row(&self, fields: &[Field], row: &[Value]) -> Result<Vec<Value>, LoadError> {
        if row.len() != fields.len() {
            return Err(LoadError::Arity {
                expected: fields.len(),
                got: row.len(),
            });
        }
        let serialized = fields
            .iter()
            .zip(row.iter())
            .map(|(field, value)| match value {
                Value::Null => Value::Null,
                Value::Date(d) => Value::Str(d.format("%Y-%m-%d").to_string()),
                Value::DateTime(d) => Value::Str(d.format("%Y-%m-%dT%H:%M:%S").to_string()),
                Value::Object(o) => Value::Str(o.to_string()),
                other if field.field_type == FieldType::Object => {
                    Value::Str(other.to_json().to_string())
                }
                other => other.clone(),
            })
            .collect();
        Ok(serialized)
    }
}

impl<W: TableWriter> DataLoader for BatchLoader<W> {
    fn drop_and_create_in_memory_table(
        &self,
        name: &str,
        fields: &[Field],
    ) -> Result<(), LoadError> {
        match self.writer.create_table(name, fields) {
            Ok(()) => Ok(()),
            Err(e) if e.kind == EngineErrorKind::AlreadyExists => {
                self.writer.drop_table(name)?;
                self.writer.create_table(name, fields)?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self, store: &str, rows: Vec<Vec<Value>>) -> Result<(), LoadError> {
        let fields = self.writer.fields(store)?;
        let serialized: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| self.serialize_row(&fields, row))
            .collect::<Result<_, _>>()?;

        // Table creation is eventually consistent; inserts right after a
        // create can fail transiently, so back off and retry.
        let mut sleep_time = self.base_delay;
        let mut attempt = 0;
        loop {
            match self.writer.insert(store, &serialized) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind == EngineErrorKind::Transient => {
                    std::thread::sleep(sleep_time);
                    if attempt < MAX_SLEEPS {
                        sleep_time *= 2;
                        attempt += 1;
                        info!(store, attempt, "insert retry");
                    } else {
                        info!(store, "insert aborted after {} attempts", MAX_SLEEPS);
                        return Err(e.into());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Loading errors
#[derive(Debug)]
pub enum LoadError {
    /// The backend refused the operation
    Engine(EngineError),
    /// A tuple does not match the store's field count
    Arity { expected: usize, got: usize },
    /// The operation is not implemented by this loader
    Unsupported(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Engine(e) => write!(f, "{}", e),
            LoadError::Arity { expected, got } => {
                write!(f, "Tuple has {} values, store has {} fields", got, expected)
            }
            LoadError::Unsupported(what) => write!(f, "{} is not supported", what),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for LoadError {
    fn from(e: EngineError) -> Self {
        LoadError::Engine(e)
    }
}
