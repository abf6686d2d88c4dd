//! Crate-wide error type.
//!
//! Only the error kinds that actually propagate as a `Result::Err` across
//! an API boundary live here. Framing errors surface as a `None` entry in
//! a parser's output list, and end-of-budget surfaces as a sentinel
//! return value — neither is an `Error` variant (see the crate's
//! `DESIGN.md` for the reasoning).

use std::fmt;
use std::io;

/// Errors that can cross a public API boundary of this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The listener could not be created.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),

    /// A read or write on a connection's socket failed.
    #[error("connection io error: {0}")]
    ConnectionIo(#[source] io::Error),

    /// A `Frame` was built with an opcode that doesn't fit in 4 bits.
    #[error("frame opcode {0:#x} exceeds 4 bits")]
    OpcodeOutOfRange(u8),

    /// A pipe end was closed.
    #[error("pipe end of stream")]
    EndOfStream,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::ConnectionIo(e)
    }
}

/// Signals that a [`crate::pipe::PipeWriter`] or [`crate::pipe::PipeReader`]
/// has reached the end of the stream. Kept distinct from [`Error`] because
/// reaching end-of-stream is an expected, not exceptional, outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfStream;

impl fmt::Display for EndOfStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("pipe end of stream")
    }
}

impl std::error::Error for EndOfStream {}

/// Signals that a [`crate::pipe::LimitedWriter`] has exhausted its byte
/// budget. Expected at body/frame boundaries, not an error condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfBudget;

impl fmt::Display for EndOfBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("limited writer exhausted its byte budget")
    }
}

impl std::error::Error for EndOfBudget {}

pub type Result<T, E = Error> = std::result::Result<T, E>;
