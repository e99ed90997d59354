//! Error types for the data-access layer.

use dataconn_proto::PrimaryKey;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type.
#[derive(Debug, Error)]
pub enum Error {
    /// No cached object and no stored line for this key.
    #[error("can not find {model} with key {pkey}")]
    ObjectNotFound { model: String, pkey: PrimaryKey },

    /// Mutation of an object that was deleted.
    #[error("{model} with key {pkey} was deleted and can not be modified")]
    UpdateDeletedObject { model: String, pkey: PrimaryKey },

    /// A value rejected by a field's type or constraint.
    #[error("invalid value for {model}.{field}: {reason}")]
    InvalidValue {
        model: String,
        field: String,
        reason: String,
    },

    /// An API used in a way the model does not allow.
    #[error("usage error: {0}")]
    Usage(String),

    /// A second live object for an existing key.
    #[error("{model} with key {pkey} already exists")]
    Conflict { model: String, pkey: PrimaryKey },

    #[error("model '{0}' is not recorded")]
    UnknownModel(String),

    #[error("model '{model}' has no field '{field}'")]
    UnknownField { model: String, field: String },

    /// Invalid model declaration.
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid relation declaration.
    #[error("relation error: {0}")]
    Relation(#[from] RelationError),

    /// Invalid filter expression.
    #[error("filter error: {0}")]
    Filter(#[from] dataconn_lang::LangError),

    #[error("no driver named '{0}'")]
    DriverNotFound(String),

    #[error("driver '{driver}' requires the '{key}' configuration key")]
    InsufficientConfiguration { driver: String, key: String },

    #[error("driver '{0}' is already open")]
    ConnectionAlreadyOpen(String),

    #[error("driver '{0}' is not open")]
    ConnectionClosed(String),

    /// Stored data that can not be decoded into the table's column types.
    #[error("data formatting error: {0}")]
    DataFormatting(String),

    /// Backend failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Relation configuration errors, raised when models are recorded.
#[derive(Debug, Error)]
pub enum RelationError {
    #[error("{model}.{field} refers to unknown model '{foreign}'")]
    UnknownModel {
        model: String,
        field: String,
        foreign: String,
    },

    #[error("{model}.{field}: no inverse field on '{foreign}' points back to '{model}'")]
    MissingInverse {
        model: String,
        field: String,
        foreign: String,
    },

    #[error("{model}.{field}: '{foreign}' has a composite primary key, more than one foreign key is not supported")]
    CompositeKey {
        model: String,
        field: String,
        foreign: String,
    },

    #[error("{model}.{field} and {foreign}.{inverse} form an unsupported cardinality")]
    InvalidCardinality {
        model: String,
        field: String,
        foreign: String,
        inverse: String,
    },
}

/// Errors raised by a backend library.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A line with the same key is already stored.
    #[error("table '{table}' already holds a line with key {pkey}")]
    DuplicateKey { table: String, pkey: String },

    #[error("table '{0}' is not registered with the driver")]
    UnknownTable(String),

    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),
}

/// Backend-independent error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ConnectionFailure,
    Configuration,
    Usage,
    InvalidData,
}

impl Error {
    /// Classify the error, including backend errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ObjectNotFound { .. } => ErrorKind::NotFound,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::UpdateDeletedObject { .. }
            | Error::Usage(_)
            | Error::UnknownModel(_)
            | Error::UnknownField { .. }
            | Error::Filter(_) => ErrorKind::Usage,
            Error::InvalidValue { .. } | Error::DataFormatting(_) => ErrorKind::InvalidData,
            Error::Schema(_)
            | Error::Relation(_)
            | Error::DriverNotFound(_)
            | Error::InsufficientConfiguration { .. } => ErrorKind::Configuration,
            Error::ConnectionAlreadyOpen(_) | Error::ConnectionClosed(_) => {
                ErrorKind::ConnectionFailure
            }
            Error::Storage(e) => e.kind(),
        }
    }
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::DuplicateKey { .. } => ErrorKind::Conflict,
            StorageError::Sqlite(e) => match e.sqlite_error_code() {
                Some(rusqlite::ErrorCode::ConstraintViolation) => ErrorKind::Conflict,
                Some(rusqlite::ErrorCode::CannotOpen)
                | Some(rusqlite::ErrorCode::DatabaseBusy)
                | Some(rusqlite::ErrorCode::DatabaseLocked) => ErrorKind::ConnectionFailure,
                _ => ErrorKind::InvalidData,
            },
            StorageError::Sled(sled::Error::Io(_)) | StorageError::Io(_) => {
                ErrorKind::ConnectionFailure
            }
            StorageError::Sled(sled::Error::Corruption { .. })
            | StorageError::Yaml(_)
            | StorageError::Json(_) => ErrorKind::InvalidData,
            StorageError::Sled(_) => ErrorKind::ConnectionFailure,
            StorageError::UnknownTable(_) => ErrorKind::NotFound,
            StorageError::UnsupportedQuery(_) => ErrorKind::Usage,
        }
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Storage(StorageError::Sled(e))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(StorageError::Sqlite(e))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Storage(StorageError::Yaml(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(StorageError::Json(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(StorageError::Io(e))
    }
}
