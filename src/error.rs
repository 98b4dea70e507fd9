//! Error types returned by the time zone core.

use std::fmt;

/// The kind of failure that occurred while locating, decoding, or
/// evaluating time zone data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No file was found for the requested key via any collaborator.
    NoSuchZone,
    /// TZif header, indices, or footer violate the format.
    MalformedData,
    /// A TZif version byte outside `{0, 2, 3}` was encountered.
    ///
    /// This kind is logged rather than surfaced as a hard failure; it is
    /// part of the taxonomy because callers may want to match on it when
    /// inspecting a chain of causes.
    UnsupportedVersion,
    /// Propagated from the search-path collaborator.
    Io,
    /// The collaborator rejected the key on safety grounds.
    InvalidKey,
    /// A caller supplied an invalid value (e.g. an out-of-range fold).
    Value,
}

/// An error produced by the time zone core.
#[derive(Debug, Clone)]
pub struct TzError {
    kind: ErrorKind,
    message: Option<String>,
}

impl TzError {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Attach a human-readable message to this error.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The kind of error that occurred.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn no_such_zone() -> Self {
        Self::new(ErrorKind::NoSuchZone)
    }

    pub fn malformed_data() -> Self {
        Self::new(ErrorKind::MalformedData)
    }

    pub fn unsupported_version() -> Self {
        Self::new(ErrorKind::UnsupportedVersion)
    }

    pub fn io() -> Self {
        Self::new(ErrorKind::Io)
    }

    pub fn invalid_key() -> Self {
        Self::new(ErrorKind::InvalidKey)
    }

    pub fn value() -> Self {
        Self::new(ErrorKind::Value)
    }
}

impl fmt::Display for TzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{:?}: {message}", self.kind),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl std::error::Error for TzError {}

impl From<std::io::Error> for TzError {
    fn from(value: std::io::Error) -> Self {
        Self::io().with_message(value.to_string())
    }
}

/// The crate's result type.
pub type TzResult<T> = Result<T, TzError>;
