//! Error taxonomy shared by the parser, the adapters and the connection
//! engine.
//!
//! Every failure the crate can report is one variant of [`Error`]. Parse
//! errors leave the parser in a terminal state until it is reset; adapter
//! errors resolve only the request they belong to; lifecycle errors tear the
//! connection down and are fanned out to every in-flight request as a
//! [`SharedError`].

use std::{io, sync::Arc};

/// All failure kinds surfaced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The marker byte did not name a known RESP3 type.
    #[error("invalid RESP3 type")]
    InvalidType,
    /// A count or length field could not be parsed as an integer.
    #[error("cannot convert string to number")]
    NotANumber,
    /// A bulk payload was not terminated by CRLF where one was required.
    #[error("unexpected read size")]
    UnexpectedReadSize,
    /// Reply nesting exceeded the configured maximum depth.
    #[error("exceeds the maximum nesting depth")]
    ExceedsMaxDepth,
    /// A boolean payload was neither `t` nor `f`.
    #[error("unexpected boolean value")]
    UnexpectedBoolValue,
    /// A field that must carry data was empty.
    #[error("expected field value is empty")]
    EmptyField,
    /// The adapter expected a simple type but received an aggregate.
    #[error("expects a simple RESP3 type")]
    ExpectsSimpleType,
    /// The adapter expected an aggregate but received a simple type.
    #[error("expects an aggregate type")]
    ExpectsAggregateType,
    /// The adapter expected a map but received another aggregate.
    #[error("expects a map type")]
    ExpectsMapType,
    /// The adapter expected a set but received another aggregate.
    #[error("expects a set type")]
    ExpectsSetType,
    /// The adapter cannot represent nested aggregates.
    #[error("nested aggregate not supported")]
    NestedAggregateUnsupported,
    /// The server answered with a RESP3 simple error.
    #[error("server error: {0}")]
    SimpleError(String),
    /// The server answered with a RESP3 blob error.
    #[error("server error: {0}")]
    BlobError(String),
    /// An aggregate size did not match what the adapter can hold.
    #[error("aggregate has incompatible size")]
    IncompatibleSize,
    /// A payload could not be parsed as a double.
    #[error("cannot convert string to double")]
    NotADouble,
    /// The server sent a null the adapter cannot represent.
    #[error("got RESP3 null")]
    Null,
    /// Name resolution did not finish within `resolve_timeout`.
    #[error("resolve timeout")]
    ResolveTimeout,
    /// The TCP connect did not finish within `connect_timeout`.
    #[error("connect timeout")]
    ConnectTimeout,
    /// No server byte was observed for two ping intervals.
    #[error("idle timeout")]
    IdleTimeout,
    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,
    /// The server closed the connection.
    #[error("end of file")]
    Eof,
    /// Transport fault outside the taxonomy above.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A failure propagated to more than one waiter.
    #[error(transparent)]
    Shared(#[from] SharedError),
}

/// Cheaply cloneable wrapper used to resolve many request futures with the
/// same terminal failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error(transparent)]
pub struct SharedError(Arc<Error>);

impl SharedError {
    pub(crate) fn new(err: Error) -> Self {
        match err {
            Error::Shared(shared) => shared,
            other => Self(Arc::new(other)),
        }
    }

    /// Access the underlying error.
    #[must_use]
    pub fn get(&self) -> &Error { &self.0 }
}

impl Error {
    /// True when the error reports a cancellation rather than a fault.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Shared(shared) => shared.get().is_cancelled(),
            _ => false,
        }
    }

    /// True when the error came from the wire rather than an adapter.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::ResolveTimeout
            | Self::ConnectTimeout
            | Self::IdleTimeout
            | Self::Eof
            | Self::Io(_) => true,
            Self::Shared(shared) => shared.get().is_transport(),
            _ => false,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
