//! Domain-specific error types for the Capseo codec.
//!
//! All fallible operations return `Result<T, CapseoError>`.
//! Malformed input never panics. Every error is typed and maps onto one
//! of the coarse [`ErrorKind`]s callers dispatch on.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CapseoError>;

// ── ErrorKind ────────────────────────────────────────────────────

/// Coarse error classification, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Success,
    /// Underlying read/write failure, including short reads and writes.
    SystemIo,
    /// Malformed configuration, unsupported format, bad field value.
    InvalidArgument,
    /// Recognised but unsupported feature combination.
    NotImplemented,
    /// Stream header failed the magic check.
    InvalidHeader,
    /// Decoded data disagrees with what the headers promised.
    InternalInconsistency,
    /// Clean end of stream at a record boundary. Not a real failure.
    StreamEnd,
}

impl ErrorKind {
    /// Human-readable description of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Success => "Success",
            ErrorKind::SystemIo => "System I/O error",
            ErrorKind::InvalidArgument => "Invalid argument",
            ErrorKind::NotImplemented => "Not supported/implemented",
            ErrorKind::InvalidHeader => "Invalid header",
            ErrorKind::InternalInconsistency => "Internal error",
            ErrorKind::StreamEnd => "End of stream",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── CapseoError ──────────────────────────────────────────────────

/// The canonical error type for the Capseo codec.
#[derive(Debug, Error)]
pub enum CapseoError {
    // ── I/O ──────────────────────────────────────────────────────
    /// The byte sink/source reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// End of input reached exactly at a record boundary.
    #[error("end of stream")]
    StreamEnd,

    // ── Argument / format errors ─────────────────────────────────
    /// A configuration or call argument is not acceptable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A numeric tag did not map to any known enum variant.
    #[error("unknown {type_name} tag: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A buffer had a different size than the operation requires.
    #[error("invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The feature combination is recognised but not supported.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    // ── Header errors ────────────────────────────────────────────
    /// Stream header does not start with `CPS`.
    #[error("invalid magic bytes: expected \"CPS\"")]
    InvalidMagic,

    /// Stream header carries a revision byte this build cannot read.
    #[error("unsupported stream revision: {0:#04x}")]
    UnsupportedRevision(u8),

    // ── Consistency errors ───────────────────────────────────────
    /// Decoded sizes disagree with the header.
    #[error("internal inconsistency: {0}")]
    Internal(String),

    /// Compressed payload could not be decoded.
    #[error("corrupt compressed payload: {0}")]
    Corrupt(&'static str),

    /// A record's checksum did not match its contents.
    #[error("record checksum mismatch")]
    ChecksumMismatch,
}

impl CapseoError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CapseoError::Io(_) => ErrorKind::SystemIo,
            CapseoError::StreamEnd => ErrorKind::StreamEnd,
            CapseoError::InvalidArgument(_)
            | CapseoError::UnknownVariant { .. }
            | CapseoError::InvalidLength { .. } => ErrorKind::InvalidArgument,
            CapseoError::NotImplemented(_) | CapseoError::UnsupportedRevision(_) => {
                ErrorKind::NotImplemented
            }
            CapseoError::InvalidMagic => ErrorKind::InvalidHeader,
            CapseoError::Internal(_)
            | CapseoError::Corrupt(_)
            | CapseoError::ChecksumMismatch => ErrorKind::InternalInconsistency,
        }
    }

    /// `true` for the end-of-stream sentinel.
    pub fn is_stream_end(&self) -> bool {
        matches!(self, CapseoError::StreamEnd)
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CapseoError::InvalidArgument(msg.into())
    }
}

/// Look up the human-readable string for an error kind.
pub fn error_string(kind: ErrorKind) -> &'static str {
    kind.as_str()
}
