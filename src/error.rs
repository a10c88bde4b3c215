//! Error taxonomy for the ECM codec.

use std::io;
use thiserror::Error;

/// Error type for every fallible operation in this crate.
#[derive(Error, Debug)]
pub enum EcmError {
    /// The 4-byte `ECM\0` header was missing or didn't match.
    #[error("bad ECM magic header")]
    BadMagic,

    /// The stream ended in the middle of a record, a payload or the trailer.
    #[error("truncated ECM stream")]
    Truncated,

    /// A type/count varint required more than 32 bits to decode.
    #[error("type/count varint overflowed 32 bits")]
    Overflow,

    /// The stream is structurally invalid (count >= 2^31, bad type value, ...).
    #[error("corrupt ECM stream: {0}")]
    Corrupt(&'static str),

    /// The trailing image-wide EDC didn't match the recomputed value.
    #[error("EDC mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    EdcMismatch {
        /// EDC read from the trailer.
        expected: u32,
        /// EDC recomputed while decoding.
        actual: u32,
    },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A bounded internal buffer could not be allocated.
    ///
    /// Rust's global allocator aborts the process on OOM rather than
    /// returning an error, so nothing in this crate constructs this
    /// variant today; it's kept in the taxonomy so callers matching on
    /// `EcmError` exhaustively account for it.
    #[error("failed to allocate codec buffer")]
    Alloc,
}

/// Convenience alias for a `Result<T, EcmError>`.
pub type EcmResult<T> = Result<T, EcmError>;
