//! Field-set fixtures shared by the unit tests.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::chunk::{Chunk, ChunkRef, ChunkType};
use crate::context::{ChunkConfig, PacketContext};
use crate::error::DecodeError;
use crate::fields::FieldSet;
use crate::serializer::SerializerRegistry;

/// Four-byte big-endian value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub value: u32,
}

impl FieldSet for Tag {
    const TYPE: ChunkType = ChunkType::new("tag");
    const FIXED_LENGTH: Option<u64> = Some(4);

    fn byte_length(&self) -> u64 {
        4
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u32(self.value);
    }

    fn decode(input: &mut Bytes) -> Result<Self, DecodeError> {
        DecodeError::check_len(input.len(), 4)?;
        Ok(Self {
            value: input.get_u32(),
        })
    }
}

/// Two-byte code; zero is not a valid code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub code: u16,
}

impl FieldSet for Marker {
    const TYPE: ChunkType = ChunkType::new("marker");
    const FIXED_LENGTH: Option<u64> = Some(2);

    fn byte_length(&self) -> u64 {
        2
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u16(self.code);
    }

    fn decode(input: &mut Bytes) -> Result<Self, DecodeError> {
        DecodeError::check_len(input.len(), 2)?;
        match input.get_u16() {
            0 => Err(DecodeError::InvalidField {
                field: "code",
                value: 0,
            }),
            code => Ok(Self { code }),
        }
    }
}

/// Length-prefixed bytes: a `u16` count followed by the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Bytes,
}

impl FieldSet for Blob {
    const TYPE: ChunkType = ChunkType::new("blob");

    fn byte_length(&self) -> u64 {
        2 + self.data.len() as u64
    }

    fn encode(&self, out: &mut BytesMut) {
        out.put_u16(self.data.len() as u16);
        out.extend_from_slice(&self.data);
    }

    fn decode(input: &mut Bytes) -> Result<Self, DecodeError> {
        DecodeError::check_len(input.len(), 2)?;
        let len = input.get_u16() as usize;
        DecodeError::check_len(input.len(), len)?;
        Ok(Self {
            data: input.split_to(len),
        })
    }
}

pub fn registry() -> SerializerRegistry {
    let mut registry = SerializerRegistry::new();
    registry.register_fields::<Tag>().unwrap();
    registry.register_fields::<Marker>().unwrap();
    registry.register_fields::<Blob>().unwrap();
    registry
}

pub fn context() -> Arc<PacketContext> {
    Arc::new(PacketContext::new(registry(), ChunkConfig::default()))
}

pub fn frozen(chunk: Chunk) -> ChunkRef {
    let mut chunk = chunk;
    chunk.mark_immutable().unwrap();
    Arc::new(chunk)
}
