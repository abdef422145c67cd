//! Error types for the binary codec and the patch writer.

use thiserror::Error;

/// Errors raised while decoding a BJData/UBJSON byte buffer.
///
/// All decoder errors are fatal to the call; no partial tree is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Structurally malformed input (bad length value, negative count,
    /// misplaced header, nesting past the depth limit).
    #[error("syntax error at byte {pos}")]
    Syntax { pos: usize },

    /// A declared length or fixed-width payload runs past the end of input.
    #[error("truncated input at byte {pos}")]
    Truncated { pos: usize },

    /// Unknown one-byte type marker at a value position.
    #[error("unsupported type marker 0x{marker:02x} at byte {pos}")]
    UnsupportedType { marker: u8, pos: usize },

    /// A count-prefixed container closed before yielding the declared number
    /// of elements.
    #[error("container declared {declared} elements but closed after {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// String payload is not valid UTF-8.
    #[error("invalid utf-8 in string at byte {pos}")]
    InvalidUtf8 { pos: usize },
}

/// Errors raised while encoding a [`crate::Node`] tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Sparse/complex/map nodes must be lowered to array envelopes before
    /// hitting the wire encoder.
    #[error("node kind {0} has no direct wire form; annotate it first")]
    UnsupportedNode(&'static str),
}

/// Per-pair errors from the patch writer. One pair failing never aborts the
/// rest of the batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The encoded replacement does not fit the recorded byte extent.
    #[error("encoded value needs {need} bytes but extent holds {have}")]
    ExtentTooSmall { need: usize, have: usize },

    /// The replacement value has no fixed-slot encoding.
    #[error("value kind {0} cannot be encoded into a fixed slot")]
    Unencodable(&'static str),
}
