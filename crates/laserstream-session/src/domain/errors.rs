//! # Domain Errors
//!
//! Error taxonomy for subscription sessions.
//!
//! | Class | Examples | Session outcome |
//! |-------|----------|-----------------|
//! | `FatalConfig` | empty filter, overlapping data slices | `Failed`, zero connect attempts |
//! | `Transient` | reset, idle timeout, server close | reconnect with backoff |
//! | `Fatal` | auth rejected, protocol mismatch | `Failed`, surfaced once |

use std::time::Duration;
use thiserror::Error;

/// How the session reacts to an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad filter specification; never retried.
    FatalConfig,
    /// Retried with backoff; the session continues.
    Transient,
    /// Terminal; the session moves to `Failed`.
    Fatal,
}

impl ErrorClass {
    /// Label used in logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorClass::FatalConfig => "fatal_config",
            ErrorClass::Transient => "transient",
            ErrorClass::Fatal => "fatal",
        }
    }
}

/// Filter specification rejected before first use.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Every entity-type mapping is empty.
    #[error("Filter subscribes to nothing: every entity mapping is empty")]
    NothingToSubscribe,

    /// An address is not a base58 32-byte key.
    #[error("Invalid address {address:?} in filter {filter:?}")]
    InvalidAddress {
        /// Subscription name.
        filter: String,
        /// Offending address.
        address: String,
    },

    /// An address is both included and excluded.
    #[error("Address {address:?} is both included and excluded in filter {filter:?}")]
    ConflictingAddress {
        /// Subscription name.
        filter: String,
        /// Offending address.
        address: String,
    },

    /// A transaction signature filter is not a base58 64-byte signature.
    #[error("Invalid signature {signature:?} in filter {filter:?}")]
    InvalidSignature {
        /// Subscription name.
        filter: String,
        /// Offending signature.
        signature: String,
    },

    /// A memcmp condition has an empty pattern or overflows.
    #[error("Invalid memcmp condition in filter {filter:?}: {reason}")]
    InvalidMemcmp {
        /// Subscription name.
        filter: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A data slice range is not representable.
    #[error("Data slice out of bounds: offset {offset} + length {length} overflows")]
    DataSliceOutOfBounds {
        /// Slice offset.
        offset: u64,
        /// Slice length.
        length: u64,
    },

    /// Two data slices overlap.
    #[error("Data slices overlap at offset {offset}")]
    DataSliceOverlap {
        /// Offset of the second, overlapping slice.
        offset: u64,
    },

    /// The request could not be parsed.
    #[error("Malformed filter specification: {0}")]
    Malformed(String),
}

/// Transport-level failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Network reset or broken pipe.
    #[error("Connection reset: {0}")]
    Reset(String),

    /// Upstream unreachable or overloaded.
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// An operation did not finish in time.
    #[error("Timed out while {0}")]
    Timeout(&'static str),

    /// No frame and no pong within the liveness window.
    #[error("No traffic for {0:?}, liveness probe unanswered")]
    IdleTimeout(Duration),

    /// The server ended the stream.
    #[error("Server closed the stream: {0}")]
    ServerClosed(String),

    /// Too many consecutive frames failed to decode.
    #[error("Stream corrupted: {consecutive} consecutive malformed frames")]
    StreamCorrupted {
        /// Consecutive decode failures observed.
        consecutive: u32,
    },

    /// Credentials rejected.
    #[error("Authentication rejected: {0}")]
    Unauthenticated(String),

    /// Credentials valid but not allowed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Client and server speak different protocol versions.
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The server refused the subscribe request itself.
    #[error("Subscription rejected by server: {0}")]
    Rejected(String),
}

impl ConnectionError {
    /// Classify for the session state machine.
    pub fn class(&self) -> ErrorClass {
        match self {
            ConnectionError::Reset(_)
            | ConnectionError::Unavailable(_)
            | ConnectionError::Timeout(_)
            | ConnectionError::IdleTimeout(_)
            | ConnectionError::ServerClosed(_)
            | ConnectionError::StreamCorrupted { .. } => ErrorClass::Transient,
            ConnectionError::Unauthenticated(_)
            | ConnectionError::PermissionDenied(_)
            | ConnectionError::ProtocolMismatch(_)
            | ConnectionError::Rejected(_) => ErrorClass::Fatal,
        }
    }

    /// Whether the session should retry.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Map a gRPC status code onto the taxonomy.
    ///
    /// Transport adapters built on tonic or similar hand their status codes
    /// here; unknown codes are treated as resets.
    pub fn from_grpc_code(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            // DEADLINE_EXCEEDED
            4 => ConnectionError::Timeout("waiting on the upstream deadline"),
            // INVALID_ARGUMENT, FAILED_PRECONDITION
            3 | 9 => ConnectionError::Rejected(message),
            // PERMISSION_DENIED
            7 => ConnectionError::PermissionDenied(message),
            // RESOURCE_EXHAUSTED, ABORTED, UNAVAILABLE
            8 | 10 | 14 => ConnectionError::Unavailable(message),
            // UNIMPLEMENTED
            12 => ConnectionError::ProtocolMismatch(message),
            // UNAUTHENTICATED
            16 => ConnectionError::Unauthenticated(message),
            // OK with a closed stream
            0 => ConnectionError::ServerClosed(message),
            _ => ConnectionError::Reset(message),
        }
    }
}

/// A single frame could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame carried no update payload.
    #[error("Frame has no update payload")]
    MissingPayload,

    /// A fixed-size field has the wrong length.
    #[error("Field {field} has length {got}, expected {expected}")]
    InvalidLength {
        /// Field name.
        field: &'static str,
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        got: usize,
    },

    /// Unknown slot status code.
    #[error("Unknown slot status code {0}")]
    UnknownSlotStatus(i32),

    /// The frame bytes could not be parsed at all.
    #[error("Malformed frame: {0}")]
    Malformed(String),
}

/// Error surfaced to the consumer through the delivery sink.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The filter specification was rejected.
    #[error("Invalid filter specification: {0}")]
    InvalidFilter(#[from] FilterError),

    /// Transport failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The configured attempt budget ran out.
    #[error("Gave up after {attempts} consecutive connection attempts: {last}")]
    ReconnectExhausted {
        /// Consecutive failed attempts.
        attempts: u32,
        /// Cause of the final failure.
        last: ConnectionError,
    },
}

impl SessionError {
    /// Classify for the session state machine.
    pub fn class(&self) -> ErrorClass {
        match self {
            SessionError::InvalidFilter(_) => ErrorClass::FatalConfig,
            SessionError::Connection(e) => e.class(),
            SessionError::ReconnectExhausted { .. } => ErrorClass::Fatal,
        }
    }

    /// Whether this error ends the session.
    pub fn is_terminal(&self) -> bool {
        self.class() != ErrorClass::Transient
    }
}
