//! Structured field sets — the typed leaves protocol layers define.
//!
//! A field set is a plain Rust struct that knows its own wire encoding.
//! Packets never look inside one; they compare its `ChunkType` tag against
//! the tag a caller asks for, and only then hand the concrete type back.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::chunk::ChunkType;
use crate::error::DecodeError;

/// A protocol header, trailer or payload with named fields.
///
/// `encode` must write exactly `byte_length()` bytes, and `decode` must
/// accept what `encode` wrote. Register the type with
/// [`SerializerRegistry::register_fields`](crate::SerializerRegistry::register_fields)
/// before packets carrying it are serialized or parsed from raw bytes.
pub trait FieldSet: fmt::Debug + Send + Sync + Sized + 'static {
    /// Tag identifying this type in peeks and in the serializer registry.
    const TYPE: ChunkType;

    /// Set for types whose encoding always has the same size. Lets a
    /// trailer be parsed out of raw bytes without an explicit length.
    const FIXED_LENGTH: Option<u64> = None;

    fn byte_length(&self) -> u64;

    fn encode(&self, out: &mut BytesMut);

    /// Decode from the front of `input`, consuming what was read.
    fn decode(input: &mut Bytes) -> Result<Self, DecodeError>;
}

/// Object-safe view of a [`FieldSet`] as stored inside a chunk.
pub trait DynFieldSet: fmt::Debug + Send + Sync {
    fn dyn_chunk_type(&self) -> ChunkType;

    fn dyn_byte_length(&self) -> u64;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: FieldSet> DynFieldSet for T {
    fn dyn_chunk_type(&self) -> ChunkType {
        T::TYPE
    }

    fn dyn_byte_length(&self) -> u64 {
        self.byte_length()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
