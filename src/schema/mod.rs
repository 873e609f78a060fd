//! Datastore catalog
//!
//! The catalog describes the stores (tables) a backend exposes and the typed
//! fields each store carries. It is the single source of truth the resolver
//! binds query DTOs against. Catalogs can be declared in YAML for tests and
//! in-memory backends.

mod types;

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub use types::{FieldType, ParseFieldTypeError};

/// A named, typed field of a store. Field names are unique within a store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type }
    }
}

/// A store (table) in the datastore
#[derive(Debug, Clone, Deserialize)]
pub struct Store {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Store {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self { name: name.into(), fields }
    }

    /// Get a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The root catalog: every store the backend knows about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    pub stores: Vec<Store>,
}

impl Catalog {
    pub fn new(stores: Vec<Store>) -> Self {
        Self { stores }
    }

    /// Load a catalog from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        let path_str = path.as_ref().display().to_string();
        let contents = std::fs::read_to_string(&path).map_err(|e| ParseError::Io {
            path: path_str,
            source: e,
        })?;
        Self::from_str(&contents)
    }

    /// Parse a catalog from a YAML string
    pub fn from_str(yaml: &str) -> Result<Self, ParseError> {
        serde_yaml::from_str(yaml).map_err(ParseError::from)
    }

    /// Get a store by name
    pub fn store(&self, name: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.name == name)
    }

    /// View of the catalog as a name-indexed map
    pub fn stores_by_name(&self) -> HashMap<&str, &Store> {
        self.stores.iter().map(|s| (s.name.as_str(), s)).collect()
    }
}

/// A field bound to its owning store with its catalog type.
///
/// `store` is `None` for synthetic fields that exist only in the result shape
/// (the count column, GROUP column-set fields).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedField {
    pub store: Option<String>,
    pub name: String,
    pub field_type: FieldType,
}

impl TypedField {
    pub fn new(store: impl Into<String>, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            store: Some(store.into()),
            name: name.into(),
            field_type,
        }
    }

    pub fn synthetic(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            store: None,
            name: name.into(),
            field_type,
        }
    }
}

impl fmt::Display for TypedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.store {
            Some(store) => write!(f, "{}.{}", store, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Errors that can occur loading a catalog
#[derive(Debug)]
pub enum ParseError {
    /// IO error reading file
    Io {
        path: String,
        source: std::io::Error,
    },
    /// YAML deserialization error
    Yaml { source: serde_yaml::Error },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Io { path, source } => {
                write!(f, "Failed to read '{}': {}", path, source)
            }
            ParseError::Yaml { source } => {
                write!(f, "Invalid YAML: {}", source)
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io { source, .. } => Some(source),
            ParseError::Yaml { source } => Some(source),
        }
    }
}

impl From<serde_yaml::Error> for ParseError {
    fn from(err: serde_yaml::Error) -> Self {
        ParseError::Yaml { source: err }
    }
}
