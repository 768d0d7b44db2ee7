use std::path::PathBuf;
use thiserror::Error;

use crate::record::RecordKind;

/// The main error type for datum operations.
#[derive(Debug, Error)]
pub enum DatumError {
    #[error("{kind} with idx {idx} not found")]
    NotFound { kind: RecordKind, idx: u64 },

    #[error("Field '{field}' of {kind} records is managed by the store and cannot be written")]
    InvalidMutation { kind: RecordKind, field: String },

    #[error("Schema mismatch: {message}")]
    SchemaMismatch { message: String },

    #[error("Invalid filter: {message}")]
    InvalidFilter { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse datastore catalog {path}: {source}")]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write datastore catalog {path}: {source}")]
    CatalogWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed datastore catalog {path}: {message}")]
    MalformedCatalog { path: PathBuf, message: String },

    #[error("Invalid {what} name '{name}'")]
    InvalidName { what: &'static str, name: String },

    #[error("Datastore '{0}' does not exist")]
    UnknownDatastore(String),

    #[error("Dataset '{name}' not found{}", .datastore.as_ref().map(|d| format!(" in datastore '{d}'")).unwrap_or_default())]
    UnknownDataset {
        name: String,
        datastore: Option<String>,
    },

    #[error("Dataset {what} already exists in datastore '{datastore}'")]
    DatasetAlreadyRegistered { what: String, datastore: String },
}

impl DatumError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        DatumError::SchemaMismatch {
            message: message.into(),
        }
    }

    pub(crate) fn forbidden(kind: RecordKind, field: impl Into<String>) -> Self {
        DatumError::InvalidMutation {
            kind,
            field: field.into(),
        }
    }
}
