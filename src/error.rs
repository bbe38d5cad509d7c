//! Error handling for pixelwave.
//!
//! Errors are categorized by [`ErrorKind`], loosely following gRPC status
//! codes, and carry the underlying error as a boxed source.
//!
//! Very little in pixelwave is fatal. The peer session and the playback
//! adapter log transport and backend failures and degrade to a disconnected
//! or errored state instead of returning them. The [`Error`] type is used at
//! the edges: configuration and catalog loading, and the fallible calls of
//! the [`Transport`](crate::transport::Transport) primitive.
//!
//! # Example
//!
//! ```rust
//! use pixelwave::error::{Error, ErrorKind, Result};
//!
//! fn connect(peer: &str) -> Result<()> {
//!     if peer.is_empty() {
//!         return Err(Error::invalid_argument("peer id is empty"));
//!     }
//!     Ok(())
//! }
//! ```

#![allow(clippy::enum_glob_use)]

use std::fmt;
use thiserror::Error;

/// Main error type combining error kind and details.
#[derive(Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

/// Standard result type for pixelwave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories based on gRPC status codes.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u32)]
pub enum ErrorKind {
    /// The operation was cancelled, typically by a teardown.
    #[error("operation was cancelled")]
    Cancelled = 1,

    /// Anything that does not fit another category.
    #[error("unknown error")]
    Unknown = 2,

    /// Malformed input, e.g. an unparsable configuration value.
    #[error("invalid argument specified")]
    InvalidArgument = 3,

    /// A time-bound operation ran out of time.
    #[error("operation timed out")]
    DeadlineExceeded = 4,

    /// A file, peer or station does not exist.
    #[error("not found")]
    NotFound = 5,

    /// A peer identifier is already taken on the transport.
    #[error("attempt to create what already exists")]
    AlreadyExists = 6,

    /// Access to a file or endpoint was refused.
    #[error("permission denied")]
    PermissionDenied = 7,

    /// A size or capacity limit was reached.
    #[error("resource has been exhausted")]
    ResourceExhausted = 8,

    /// The operation is not valid in the current state, e.g. sending on a
    /// link that is not open.
    #[error("invalid state")]
    FailedPrecondition = 9,

    /// The operation was interrupted by a conflicting change.
    #[error("operation aborted")]
    Aborted = 10,

    /// An invariant was broken.
    #[error("internal error")]
    Internal = 13,

    /// The peer or transport endpoint cannot be reached.
    #[error("service unavailable")]
    Unavailable = 14,

    /// Data was truncated or corrupted.
    #[error("unrecoverable data loss or corruption")]
    DataLoss = 15,
}

impl Error {
    /// Creates a new error with specified kind and details.
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    /// Attempts to downcast the underlying error to a concrete type.
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// Creates an `Aborted` error.
    pub fn aborted<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Aborted, error)
    }

    /// Creates an `AlreadyExists` error.
    pub fn already_exists<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::AlreadyExists, error)
    }

    /// Creates a `Cancelled` error.
    pub fn cancelled<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Cancelled, error)
    }

    /// Creates a `DataLoss` error.
    pub fn data_loss<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::DataLoss, error)
    }

    /// Creates a `DeadlineExceeded` error.
    pub fn deadline_exceeded<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::DeadlineExceeded, error)
    }

    /// Creates a `FailedPrecondition` error.
    ///
    /// Use when an operation cannot proceed due to the current state, like
    /// sending over a link that was already closed.
    pub fn failed_precondition<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::FailedPrecondition, error)
    }

    /// Creates an `InvalidArgument` error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::invalid_argument("heartbeat interval must be non-zero");
    /// assert_eq!(err.kind, ErrorKind::InvalidArgument);
    /// ```
    pub fn invalid_argument<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::InvalidArgument, error)
    }

    /// Creates a `NotFound` error.
    pub fn not_found<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::NotFound, error)
    }

    /// Creates a `PermissionDenied` error.
    pub fn permission_denied<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::PermissionDenied, error)
    }

    /// Creates a `ResourceExhausted` error.
    pub fn resource_exhausted<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::ResourceExhausted, error)
    }

    /// Creates an `Unavailable` error.
    ///
    /// Use when a peer cannot be reached or the transport endpoint has been
    /// destroyed.
    pub fn unavailable<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unavailable, error)
    }

    /// Creates an `Unknown` error.
    pub fn unknown<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::new(ErrorKind::Unknown, error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Formats the error as `"{kind}: {details}"`.
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: ", self.kind)?;
        self.error.fmt(fmt)
    }
}

/// Converts IO errors into their logical equivalents.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            NotFound => Self::not_found(err),
            PermissionDenied => Self::permission_denied(err),
            AddrInUse | AlreadyExists => Self::already_exists(err),
            AddrNotAvailable | ConnectionRefused | NotConnected => Self::unavailable(err),
            BrokenPipe | ConnectionReset | ConnectionAborted => Self::aborted(err),
            Interrupted | WouldBlock => Self::cancelled(err),
            UnexpectedEof => Self::data_loss(err),
            TimedOut => Self::deadline_exceeded(err),
            InvalidInput | InvalidData => Self::invalid_argument(err),
            WriteZero => Self::resource_exhausted(err),
            _ => Self::unknown(err),
        }
    }
}

/// Converts JSON errors through IO error mapping.
///
/// Syntax and data errors end up as `InvalidArgument`, truncated input as
/// `DataLoss`.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        std::io::Error::from(err).into()
    }
}

/// Converts TOML errors to `InvalidArgument`.
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts URL parsing errors to `InvalidArgument`.
impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::invalid_argument(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_kinds() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.kind, ErrorKind::NotFound);

        let err = Error::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(err.kind, ErrorKind::Unavailable);
    }

    #[test]
    fn json_syntax_errors_are_invalid_arguments() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(Error::from(err).kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn display_includes_kind_and_details() {
        let err = Error::unavailable("peer ABCDE is unavailable");
        assert_eq!(
            err.to_string(),
            "service unavailable: peer ABCDE is unavailable"
        );
    }
}
