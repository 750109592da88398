//! Error types for the `relay` core.
//!
//! Follows the same pattern as the other layers: a root `Error` struct holding an
//! `error_kind` that the web layer translates into a response status, plus an
//! optional `source` for chaining.
use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Kinds of failures the relay core reports to its callers.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// A required input field was absent or empty.
    MissingField(&'static str),
    /// Input could not be decoded into a known shape.
    Malformed,
    /// The Router is not attached yet or has stopped.
    Unavailable,
    /// Nothing is stored under the requested key.
    NotFound,
    Internal(String),
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub fn missing_field(field: &'static str) -> Self {
        Self::new(ErrorKind::MissingField(field))
    }

    pub fn malformed(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            source: Some(source.into()),
            error_kind: ErrorKind::Malformed,
        }
    }

    pub fn unavailable() -> Self {
        Self::new(ErrorKind::Unavailable)
    }

    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::MissingField(field) => write!(f, "Relay Error: missing field `{field}`"),
            ErrorKind::Malformed => write!(f, "Relay Error: malformed input"),
            ErrorKind::Unavailable => write!(f, "Relay Error: router unavailable"),
            ErrorKind::NotFound => write!(f, "Relay Error: not found"),
            ErrorKind::Internal(detail) => write!(f, "Relay Error: internal ({detail})"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// Serialization failures only happen while encoding outbound payloads, which is
// never the caller's fault.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Internal("JSON encoding failed".to_string()),
        }
    }
}
