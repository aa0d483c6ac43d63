//! Error types for chunk and packet operations.
//!
//! A peek that finds content of another type is not an error: it returns
//! `Ok(None)`. Everything in here is either a precondition the calling
//! layer failed to check or a configuration mistake, and is never retried.

use crate::chunk::ChunkType;

pub type Result<T> = std::result::Result<T, ChunkError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// Offset/length pair falls outside `[0, available]`.
    #[error("{op}: range {offset}+{length} is outside [0, {available}]")]
    OutOfBounds {
        op: &'static str,
        offset: u64,
        length: u64,
        available: u64,
    },

    /// Attempted to edit frozen content without going through copy-on-write.
    #[error("{op}: {chunk_type} chunk is immutable")]
    Immutable {
        op: &'static str,
        chunk_type: ChunkType,
    },

    /// A composite cannot be frozen while a child it shares is still mutable.
    #[error("{op}: shared child {chunk_type} chunk is still mutable")]
    SharedMutableChild {
        op: &'static str,
        chunk_type: ChunkType,
    },

    #[error("{op}: not supported by {chunk_type} chunk: {reason}")]
    InvalidOperation {
        op: &'static str,
        chunk_type: ChunkType,
        reason: &'static str,
    },

    /// A backward slow-path peek needs to know where the range starts.
    #[error("{op}: length of {chunk_type} is unknown at tail-relative offset {offset}")]
    UnknownLength {
        op: &'static str,
        chunk_type: ChunkType,
        offset: u64,
    },

    #[error("{op}: implicit serialization is disabled, cannot materialize {chunk_type}")]
    ImplicitSerializationDisabled {
        op: &'static str,
        chunk_type: ChunkType,
    },

    #[error("no serializer registered for {0} chunks")]
    MissingSerializer(ChunkType),

    #[error("serializer for {0} chunks is already registered")]
    DuplicateSerializer(ChunkType),

    #[error("serializer for {chunk_type} wrote {written} bytes, chunk declares {declared}")]
    LengthMismatch {
        chunk_type: ChunkType,
        written: u64,
        declared: u64,
    },

    #[error("failed to decode {chunk_type}: {source}")]
    Decode {
        chunk_type: ChunkType,
        source: DecodeError,
    },
}

/// Errors a field-set decoder reports for bytes it cannot interpret.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("truncated input: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("invalid value for {field}: {value:#x}")]
    InvalidField { field: &'static str, value: u64 },

    #[error("{0}")]
    Malformed(String),
}

impl DecodeError {
    /// Fails with `Truncated` unless at least `needed` bytes remain.
    pub fn check_len(available: usize, needed: usize) -> std::result::Result<(), DecodeError> {
        if available < needed {
            Err(DecodeError::Truncated { needed, available })
        } else {
            Ok(())
        }
    }
}
