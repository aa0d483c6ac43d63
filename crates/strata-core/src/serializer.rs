//! Serializer registry — per-type encode/decode used by the slow path and
//! at the transmission boundary.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use bytes::{BufMut, Bytes, BytesMut};

use crate::chunk::{Chunk, ChunkKind, ChunkType, LeafChunk};
use crate::error::{ChunkError, DecodeError, Result};
use crate::fields::FieldSet;

static_assertions::assert_impl_all!(SerializerRegistry: Send, Sync);

/// Encodes chunks of one type into bytes and decodes them back.
pub trait ChunkSerializer: Send + Sync {
    /// Append bytes `[offset, offset + length)` of `chunk` to `out`.
    ///
    /// The range is already bounds-checked. Composite serializers recurse
    /// through `registry` for their children.
    fn serialize(
        &self,
        registry: &SerializerRegistry,
        out: &mut BytesMut,
        chunk: &Chunk,
        offset: u64,
        length: u64,
    ) -> Result<()>;

    /// Decode one chunk from the front of `input`, consuming what was read.
    fn deserialize(&self, input: &mut Bytes) -> Result<Chunk>;

    /// Encoded size shared by every chunk of this type, if there is one.
    fn fixed_length(&self) -> Option<u64> {
        None
    }
}

/// Maps chunk types to their serializers.
pub struct SerializerRegistry {
    serializers: HashMap<ChunkType, Box<dyn ChunkSerializer>>,
}

impl SerializerRegistry {
    /// A registry with the built-in chunk types registered.
    pub fn new() -> Self {
        let mut serializers: HashMap<ChunkType, Box<dyn ChunkSerializer>> = HashMap::new();
        serializers.insert(ChunkType::BYTES, Box::new(BytesSerializer));
        serializers.insert(ChunkType::BYTE_COUNT, Box::new(ByteCountSerializer));
        serializers.insert(ChunkType::SLICE, Box::new(SliceSerializer));
        serializers.insert(ChunkType::SEQUENCE, Box::new(SequenceSerializer));
        Self { serializers }
    }

    /// Register a serializer. Each type may be registered once.
    pub fn register(
        &mut self,
        chunk_type: ChunkType,
        serializer: Box<dyn ChunkSerializer>,
    ) -> Result<()> {
        if chunk_type == ChunkType::ANY || self.serializers.contains_key(&chunk_type) {
            return Err(ChunkError::DuplicateSerializer(chunk_type));
        }
        self.serializers.insert(chunk_type, serializer);
        Ok(())
    }

    /// Register the serializer for field-set type `T` under `T::TYPE`.
    pub fn register_fields<T: FieldSet>(&mut self) -> Result<()> {
        self.register(T::TYPE, Box::new(FieldSetSerializer::<T>::new()))
    }

    pub fn get(&self, chunk_type: ChunkType) -> Result<&dyn ChunkSerializer> {
        self.serializers
            .get(&chunk_type)
            .map(|s| s.as_ref())
            .ok_or(ChunkError::MissingSerializer(chunk_type))
    }

    pub fn contains(&self, chunk_type: ChunkType) -> bool {
        self.serializers.contains_key(&chunk_type)
    }

    pub fn fixed_length(&self, chunk_type: ChunkType) -> Result<Option<u64>> {
        Ok(self.get(chunk_type)?.fixed_length())
    }

    /// All bytes of `chunk`.
    pub fn serialize(&self, chunk: &Chunk) -> Result<Bytes> {
        self.serialize_range(chunk, 0, chunk.byte_length())
    }

    /// Bytes `[offset, offset + length)` of `chunk`. Raw leaves are sliced
    /// without copying.
    pub fn serialize_range(&self, chunk: &Chunk, offset: u64, length: u64) -> Result<Bytes> {
        check_range("serialize", chunk, offset, length)?;
        if let Some(data) = chunk.as_bytes() {
            return Ok(data.slice(offset as usize..(offset + length) as usize));
        }
        let mut out = BytesMut::with_capacity(length as usize);
        self.serialize_into(&mut out, chunk, offset, length)?;
        Ok(out.freeze())
    }

    /// Append bytes `[offset, offset + length)` of `chunk` to `out`.
    pub fn serialize_into(
        &self,
        out: &mut BytesMut,
        chunk: &Chunk,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        check_range("serialize", chunk, offset, length)?;
        let chunk_type = chunk.chunk_type();
        let before = out.len();
        self.get(chunk_type)?
            .serialize(self, out, chunk, offset, length)?;
        let written = (out.len() - before) as u64;
        if written != length {
            return Err(ChunkError::LengthMismatch {
                chunk_type,
                written,
                declared: length,
            });
        }
        Ok(())
    }

    /// Decode a `chunk_type` chunk from the front of `input`.
    pub fn deserialize(&self, chunk_type: ChunkType, input: &mut Bytes) -> Result<Chunk> {
        self.get(chunk_type)?.deserialize(input)
    }
}

impl Default for SerializerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.serializers.keys().map(|t| t.name()).collect();
        types.sort_unstable();
        f.debug_struct("SerializerRegistry")
            .field("types", &types)
            .finish()
    }
}

fn check_range(op: &'static str, chunk: &Chunk, offset: u64, length: u64) -> Result<()> {
    let available = chunk.byte_length();
    if offset.checked_add(length).map_or(true, |end| end > available) {
        return Err(ChunkError::OutOfBounds {
            op,
            offset,
            length,
            available,
        });
    }
    Ok(())
}

fn wrong_kind(op: &'static str, chunk: &Chunk) -> ChunkError {
    ChunkError::InvalidOperation {
        op,
        chunk_type: chunk.chunk_type(),
        reason: "chunk kind does not match its registered serializer",
    }
}

// ── Built-in Serializers ─────────────────────────────────────────────────────

struct BytesSerializer;

impl ChunkSerializer for BytesSerializer {
    fn serialize(
        &self,
        _registry: &SerializerRegistry,
        out: &mut BytesMut,
        chunk: &Chunk,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        let data = chunk.as_bytes().ok_or_else(|| wrong_kind("serialize", chunk))?;
        out.extend_from_slice(&data[offset as usize..(offset + length) as usize]);
        Ok(())
    }

    fn deserialize(&self, input: &mut Bytes) -> Result<Chunk> {
        Ok(Chunk::bytes(input.split_to(input.len())))
    }
}

struct ByteCountSerializer;

impl ChunkSerializer for ByteCountSerializer {
    fn serialize(
        &self,
        _registry: &SerializerRegistry,
        out: &mut BytesMut,
        chunk: &Chunk,
        _offset: u64,
        length: u64,
    ) -> Result<()> {
        match chunk.kind() {
            ChunkKind::Leaf(LeafChunk::ByteCount { fill, .. }) => {
                out.put_bytes(*fill, length as usize);
                Ok(())
            }
            _ => Err(wrong_kind("serialize", chunk)),
        }
    }

    /// Accepts only input made of one repeated byte.
    fn deserialize(&self, input: &mut Bytes) -> Result<Chunk> {
        let fill = input.first().copied().unwrap_or(0);
        if let Some(other) = input.iter().find(|&&b| b != fill) {
            return Err(ChunkError::Decode {
                chunk_type: ChunkType::BYTE_COUNT,
                source: DecodeError::InvalidField {
                    field: "fill",
                    value: u64::from(*other),
                },
            });
        }
        let data = input.split_to(input.len());
        Ok(Chunk::byte_count(data.len() as u64, fill))
    }
}

struct SliceSerializer;

impl ChunkSerializer for SliceSerializer {
    fn serialize(
        &self,
        registry: &SerializerRegistry,
        out: &mut BytesMut,
        chunk: &Chunk,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        let slice = chunk.as_slice().ok_or_else(|| wrong_kind("serialize", chunk))?;
        registry.serialize_into(out, slice.backing(), slice.offset() + offset, length)
    }

    fn deserialize(&self, _input: &mut Bytes) -> Result<Chunk> {
        Err(ChunkError::InvalidOperation {
            op: "deserialize",
            chunk_type: ChunkType::SLICE,
            reason: "slices only exist as views of other chunks",
        })
    }
}

struct SequenceSerializer;

impl ChunkSerializer for SequenceSerializer {
    fn serialize(
        &self,
        registry: &SerializerRegistry,
        out: &mut BytesMut,
        chunk: &Chunk,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        let seq = chunk
            .as_sequence()
            .ok_or_else(|| wrong_kind("serialize", chunk))?;
        let end = offset + length;
        let mut position = 0u64;
        for child in seq.chunks() {
            let child_start = position;
            let child_end = position + child.byte_length();
            position = child_end;
            if child_end <= offset {
                continue;
            }
            if child_start >= end {
                break;
            }
            let from = offset.max(child_start);
            let to = end.min(child_end);
            registry.serialize_into(out, child, from - child_start, to - from)?;
        }
        Ok(())
    }

    fn deserialize(&self, _input: &mut Bytes) -> Result<Chunk> {
        Err(ChunkError::InvalidOperation {
            op: "deserialize",
            chunk_type: ChunkType::SEQUENCE,
            reason: "sequence boundaries are not part of the serialized form",
        })
    }
}

// ── Field Sets ───────────────────────────────────────────────────────────────

/// Serializer for a [`FieldSet`] type. Partial ranges encode the whole set
/// and keep the requested bytes.
pub struct FieldSetSerializer<T>(PhantomData<fn() -> T>);

impl<T: FieldSet> FieldSetSerializer<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: FieldSet> Default for FieldSetSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FieldSet> ChunkSerializer for FieldSetSerializer<T> {
    fn serialize(
        &self,
        _registry: &SerializerRegistry,
        out: &mut BytesMut,
        chunk: &Chunk,
        offset: u64,
        length: u64,
    ) -> Result<()> {
        let fields = chunk
            .field_set::<T>()
            .ok_or_else(|| wrong_kind("serialize", chunk))?;
        if offset == 0 && length == fields.byte_length() {
            fields.encode(out);
            return Ok(());
        }
        let mut whole = BytesMut::with_capacity(fields.byte_length() as usize);
        fields.encode(&mut whole);
        let end = (offset + length) as usize;
        if whole.len() < end {
            return Err(ChunkError::LengthMismatch {
                chunk_type: T::TYPE,
                written: whole.len() as u64,
                declared: fields.byte_length(),
            });
        }
        out.extend_from_slice(&whole[offset as usize..end]);
        Ok(())
    }

    fn deserialize(&self, input: &mut Bytes) -> Result<Chunk> {
        T::decode(input)
            .map(Chunk::fields)
            .map_err(|source| ChunkError::Decode {
                chunk_type: T::TYPE,
                source,
            })
    }

    fn fixed_length(&self) -> Option<u64> {
        T::FIXED_LENGTH
    }
}
