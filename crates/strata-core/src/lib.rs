//! strata-core — layered zero-copy packet representation.
//!
//! Protocol layers push and pop headers and trailers on a [`Packet`], peek
//! at typed field sets at arbitrary offsets, and convert to and from wire
//! bytes through a [`SerializerRegistry`]. Content is held in immutable,
//! reference-counted [`Chunk`] trees, so duplicating a packet never copies
//! bytes and edits never leak into duplicates.

pub mod chunk;
pub mod context;
pub mod error;
pub mod fields;
pub mod iter;
pub mod packet;
mod peek;
pub mod sequence;
pub mod serializer;
pub mod slice;

#[cfg(test)]
mod testing;

pub use chunk::{Chunk, ChunkKind, ChunkRef, ChunkType, LeafChunk, Mutability};
pub use context::{ChunkConfig, PacketContext};
pub use error::{ChunkError, DecodeError, Result};
pub use fields::{DynFieldSet, FieldSet};
pub use iter::ChunkIterator;
pub use packet::Packet;
pub use sequence::SequenceChunk;
pub use serializer::{ChunkSerializer, FieldSetSerializer, SerializerRegistry};
pub use slice::SliceChunk;
