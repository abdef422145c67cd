//! Error types for envelope reconstruction and the codec registry.

use thiserror::Error;

/// Failure inside a registered byte codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("codec i/o failure: {0}")]
    Io(String),
    #[error("invalid base64 payload")]
    InvalidBase64,
}

/// Errors raised while rebuilding native arrays from JData envelopes.
///
/// Reconstruction errors are fatal to the call; no partial tree is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnnotError {
    /// The named compression method has no registered codec. The payload is
    /// left untouched.
    #[error("unsupported compression method '{0}'")]
    UnsupportedCompression(String),

    /// Declared dimensions disagree with the number of parsed elements.
    #[error("shape mismatch: declared {declared} elements, found {actual}")]
    ShapeMismatch { declared: usize, actual: usize },

    /// Triplet data cannot be oriented against the declared sparse layout.
    #[error("invalid sparse layout: {0}")]
    InvalidSparseLayout(String),

    /// `ArrayType` names a dtype this implementation does not know.
    #[error("unknown array dtype '{0}'")]
    UnknownDtype(String),

    /// An envelope field is present but has the wrong kind of value.
    #[error("malformed envelope field '{0}'")]
    BadField(&'static str),

    #[error(transparent)]
    Codec(#[from] CodecError),
}
