// src/error.rs

//! Error types for rpmmap

use std::fmt;
use thiserror::Error;

/// A single problem found while validating a client payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Position of the offending item in a list payload
    pub index: Option<usize>,
    /// Field name, or `None` when the problem is with the item's shape
    pub field: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn new(index: Option<usize>, field: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            index,
            field: field.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.index, &self.field) {
            (Some(i), Some(field)) => write!(f, "[{i}].{field}: {}", self.message),
            (Some(i), None) => write!(f, "[{i}]: {}", self.message),
            (None, Some(field)) => write!(f, "{field}: {}", self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

/// Collected validation failures for one payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Names of the fields that failed, deduplicated and sorted
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.0.iter().filter_map(|e| e.field.as_deref()).collect();
        fields.sort_unstable();
        fields.dedup();
        fields
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Coarse classification used by front-ends to pick a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request: the caller can fix the input
    Client,
    /// A named release or compose does not exist
    NotFound,
    /// Storage failure, retry is left to the caller
    Storage,
    /// Logic or consistency bug
    Internal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed input: {0}")]
    MalformedInputError(FieldErrors),

    #[error("Unknown reference: {0}")]
    UnknownReferenceError(String),

    #[error("Concurrent conflict: {0}")]
    ConcurrentConflictError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

impl Error {
    /// Shorthand for a malformed payload with a single problem
    pub fn malformed(field: Option<&str>, message: impl Into<String>) -> Self {
        Error::MalformedInputError(FieldErrors(vec![FieldError::new(None, field, message)]))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedInputError(_)
            | Error::UnknownReferenceError(_)
            | Error::ParseError(_)
            | Error::JsonError(_) => ErrorKind::Client,
            Error::NotFoundError(_) => ErrorKind::NotFound,
            Error::DatabaseError(_) | Error::IoError(_) => ErrorKind::Storage,
            Error::ConcurrentConflictError(_) | Error::ConfigError(_) | Error::InitError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// HTTP-equivalent status code for this error
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Client => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Storage => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// True when the underlying storage error is a UNIQUE / PRIMARY KEY violation
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Error::DatabaseError(e) if is_unique_violation(e))
    }
}

/// Check a raw rusqlite error for a uniqueness constraint failure
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.extended_code,
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    }
}

pub type Result<T> = std::result::Result<T, Error>;
