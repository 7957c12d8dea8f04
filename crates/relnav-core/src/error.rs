//! Error taxonomy for relnav.
//!
//! The boundary rules, which every crate in the workspace relies on:
//!
//! - [`Error::Sql`] carries the failing statement text and is shown to the
//!   user. Driver message text is opaque; it is never parsed.
//! - [`Error::Cancelled`] is silent. It must be fully swallowed at the job
//!   boundary and never reaches a user-facing callback.
//! - [`Error::MissingPrimaryKey`] is fatal and not retried.
//! - [`Error::Connection`] with [`ConnectionErrorKind::Reconnect`] means the
//!   single reconnect retry has already been spent.

use std::fmt;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// A failed SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlError {
    /// The statement that failed, for diagnostics.
    pub statement: String,
    /// The driver's message, treated as opaque text.
    pub message: String,
    /// Optional original-error detail.
    pub detail: Option<String>,
}

/// What went wrong with the connection itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Initial connect failed.
    Connect,
    /// An established connection died.
    Lost,
    /// Reconnecting after a lost connection failed.
    Reconnect,
}

/// A connection-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    /// Failure category.
    pub kind: ConnectionErrorKind,
    /// Opaque driver message.
    pub message: String,
}

/// All errors produced by relnav.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A statement failed to execute.
    Sql(SqlError),
    /// The connection failed.
    Connection(ConnectionError),
    /// A block query needed per-parent key tuples but the table has no
    /// primary key.
    MissingPrimaryKey {
        /// The table lacking a key.
        table: String,
    },
    /// The operation was cancelled via the job's token.
    Cancelled,
    /// Anything else.
    Custom(String),
}

impl Error {
    /// Shorthand for a statement failure.
    pub fn sql(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Sql(SqlError {
            statement: statement.into(),
            message: message.into(),
            detail: None,
        })
    }

    /// Shorthand for a connection failure.
    pub fn connection(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError {
            kind,
            message: message.into(),
        })
    }

    /// Whether this error may be resolved by reconnecting and retrying once.
    ///
    /// Cancellation and missing keys are never retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Sql(_) => true,
            Error::Connection(c) => c.kind != ConnectionErrorKind::Reconnect,
            Error::MissingPrimaryKey { .. } | Error::Cancelled | Error::Custom(_) => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Sql(e) => {
                write!(f, "statement failed: {}", e.message)?;
                if let Some(detail) = &e.detail {
                    write!(f, " ({detail})")?;
                }
                write!(f, "; statement: {}", e.statement)
            }
            Error::Connection(e) => {
                let kind = match e.kind {
                    ConnectionErrorKind::Connect => "connect",
                    ConnectionErrorKind::Lost => "connection lost",
                    ConnectionErrorKind::Reconnect => "reconnect",
                };
                write!(f, "{kind} failed: {}", e.message)
            }
            Error::MissingPrimaryKey { table } => {
                write!(f, "table {table:?} has no primary key usable for row identification")
            }
            Error::Cancelled => write!(f, "cancelled"),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
