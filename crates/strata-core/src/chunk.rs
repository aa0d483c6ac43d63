//! Chunks — the units packets are built from.
//!
//! Every chunk is one of three variants:
//!
//!   Leaf      raw bytes, a byte count, or a structured field set
//!   Sequence  ordered concatenation of shared child chunks
//!   Slice     zero-copy window into another chunk
//!
//! Chunks are shared through `Arc`. A chunk starts out mutable and becomes
//! immutable once it is handed to a packet; from then on any number of
//! packets may hold it. Editing requires exclusive ownership, which `Arc`
//! proves at runtime, and the mutability flag rejects edits of frozen
//! content even when the caller happens to be the only holder.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{ChunkError, Result};
use crate::fields::{DynFieldSet, FieldSet};
use crate::sequence::SequenceChunk;
use crate::slice::SliceChunk;

/// Shared reference to a chunk. Cloning it never copies chunk content.
pub type ChunkRef = Arc<Chunk>;

static_assertions::assert_impl_all!(Chunk: Send, Sync, Clone);

// ── Chunk Type ───────────────────────────────────────────────────────────────

/// Type tag stored per chunk and supplied by callers when peeking.
///
/// Built-in variants have reserved tags. Field-set types pick their own
/// tag through [`FieldSet::TYPE`]; tags must be unique per registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(&'static str);

impl ChunkType {
    /// Matches every chunk. Never the type of an actual chunk.
    pub const ANY: ChunkType = ChunkType("any");
    pub const BYTES: ChunkType = ChunkType("bytes");
    pub const BYTE_COUNT: ChunkType = ChunkType("byte_count");
    pub const SEQUENCE: ChunkType = ChunkType("sequence");
    pub const SLICE: ChunkType = ChunkType("slice");

    pub const fn new(name: &'static str) -> Self {
        ChunkType(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }

    /// True for field-set tags, false for the built-in variants.
    pub fn is_structured(&self) -> bool {
        !matches!(
            *self,
            Self::ANY | Self::BYTES | Self::BYTE_COUNT | Self::SEQUENCE | Self::SLICE
        )
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// ── Chunk ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Mutable,
    Immutable,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    mutability: Mutability,
    kind: ChunkKind,
}

#[derive(Debug, Clone)]
pub enum ChunkKind {
    Leaf(LeafChunk),
    Sequence(SequenceChunk),
    Slice(SliceChunk),
}

#[derive(Debug, Clone)]
pub enum LeafChunk {
    /// Contiguous raw bytes.
    Bytes(Bytes),
    /// `length` repetitions of `fill`, stored without the repetitions.
    ByteCount { length: u64, fill: u8 },
    /// A structured field set.
    Fields(Arc<dyn DynFieldSet>),
}

impl Chunk {
    pub(crate) fn from_kind(kind: ChunkKind) -> Self {
        Self {
            mutability: Mutability::Mutable,
            kind,
        }
    }

    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::from_kind(ChunkKind::Leaf(LeafChunk::Bytes(data.into())))
    }

    pub fn byte_count(length: u64, fill: u8) -> Self {
        Self::from_kind(ChunkKind::Leaf(LeafChunk::ByteCount { length, fill }))
    }

    pub fn fields<T: FieldSet>(value: T) -> Self {
        Self::from_kind(ChunkKind::Leaf(LeafChunk::Fields(Arc::new(value))))
    }

    /// An empty, mutable sequence.
    pub fn sequence() -> Self {
        Self::from_kind(ChunkKind::Sequence(SequenceChunk::new()))
    }

    /// A sequence holding `chunks` in order.
    pub fn sequence_of<I>(chunks: I, flatten: bool) -> Result<Self>
    where
        I: IntoIterator<Item = ChunkRef>,
    {
        let mut seq = SequenceChunk::new();
        for chunk in chunks {
            seq.append(chunk, flatten)?;
        }
        Ok(Self::from_kind(ChunkKind::Sequence(seq)))
    }

    /// A view of `length` bytes of `backing` starting at `offset`.
    ///
    /// Slices of slices collapse onto the innermost backing chunk. The
    /// slice is immutable exactly when its backing chunk is.
    pub fn slice(backing: ChunkRef, offset: u64, length: u64) -> Result<Self> {
        Ok(SliceChunk::new(backing, offset, length)?.into_chunk())
    }

    pub(crate) fn set_immutable(&mut self) {
        self.mutability = Mutability::Immutable;
    }

    pub fn kind(&self) -> &ChunkKind {
        &self.kind
    }

    pub fn mutability(&self) -> Mutability {
        self.mutability
    }

    pub fn is_immutable(&self) -> bool {
        self.mutability == Mutability::Immutable
    }

    pub fn is_mutable(&self) -> bool {
        self.mutability == Mutability::Mutable
    }

    pub fn byte_length(&self) -> u64 {
        match &self.kind {
            ChunkKind::Leaf(LeafChunk::Bytes(data)) => data.len() as u64,
            ChunkKind::Leaf(LeafChunk::ByteCount { length, .. }) => *length,
            ChunkKind::Leaf(LeafChunk::Fields(fields)) => fields.dyn_byte_length(),
            ChunkKind::Sequence(seq) => seq.byte_length(),
            ChunkKind::Slice(slice) => slice.length(),
        }
    }

    pub fn chunk_type(&self) -> ChunkType {
        match &self.kind {
            ChunkKind::Leaf(LeafChunk::Bytes(_)) => ChunkType::BYTES,
            ChunkKind::Leaf(LeafChunk::ByteCount { .. }) => ChunkType::BYTE_COUNT,
            ChunkKind::Leaf(LeafChunk::Fields(fields)) => fields.dyn_chunk_type(),
            ChunkKind::Sequence(_) => ChunkType::SEQUENCE,
            ChunkKind::Slice(_) => ChunkType::SLICE,
        }
    }

    /// Whether this chunk satisfies a peek for `want`.
    pub fn matches(&self, want: ChunkType) -> bool {
        want == ChunkType::ANY || want == self.chunk_type()
    }

    /// A field set of another type sitting exactly where `want` was asked
    /// for. Raw content is never conclusive, since its bytes may still parse
    /// as `want`.
    pub(crate) fn conflicts_with(&self, want: ChunkType) -> bool {
        want.is_structured()
            && matches!(self.kind, ChunkKind::Leaf(LeafChunk::Fields(_)))
            && self.chunk_type() != want
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.kind {
            ChunkKind::Leaf(LeafChunk::Bytes(data)) => Some(data),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceChunk> {
        match &self.kind {
            ChunkKind::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&SliceChunk> {
        match &self.kind {
            ChunkKind::Slice(slice) => Some(slice),
            _ => None,
        }
    }

    /// The structured field set, if this is a leaf holding a `T`.
    pub fn field_set<T: FieldSet>(&self) -> Option<&T> {
        match &self.kind {
            ChunkKind::Leaf(LeafChunk::Fields(fields)) if fields.dyn_chunk_type() == T::TYPE => {
                fields.as_any().downcast_ref::<T>()
            }
            _ => None,
        }
    }

    /// Like [`field_set`](Self::field_set) but returns a shared handle.
    pub fn field_set_arc<T: FieldSet>(&self) -> Option<Arc<T>> {
        match &self.kind {
            ChunkKind::Leaf(LeafChunk::Fields(fields)) if fields.dyn_chunk_type() == T::TYPE => {
                fields.clone().into_any().downcast::<T>().ok()
            }
            _ => None,
        }
    }

    // ── Mutability ───────────────────────────────────────────────────────────

    /// Freeze this chunk and every child it owns exclusively.
    ///
    /// Children shared with other holders are not touched, but they must
    /// already be immutable.
    pub fn mark_immutable(&mut self) -> Result<()> {
        if self.is_immutable() {
            return Ok(());
        }
        match &mut self.kind {
            ChunkKind::Leaf(_) => {}
            ChunkKind::Sequence(seq) => {
                for child in seq.chunks_mut() {
                    freeze_child(child)?;
                }
            }
            ChunkKind::Slice(slice) => freeze_child(slice.backing_mut())?,
        }
        self.mutability = Mutability::Immutable;
        Ok(())
    }

    /// Thaw a chunk the caller has proven it owns exclusively.
    ///
    /// Only the copy-on-write path of a packet root calls this, right after
    /// `Arc::make_mut`; nothing else can observe the chunk at that point.
    pub(crate) fn thaw(&mut self) {
        self.mutability = Mutability::Mutable;
    }

    fn check_mutable(&self, op: &'static str) -> Result<()> {
        if self.is_immutable() {
            return Err(ChunkError::Immutable {
                op,
                chunk_type: self.chunk_type(),
            });
        }
        Ok(())
    }

    fn sequence_mut(&mut self, op: &'static str) -> Result<&mut SequenceChunk> {
        self.check_mutable(op)?;
        let chunk_type = self.chunk_type();
        match &mut self.kind {
            ChunkKind::Sequence(seq) => Ok(seq),
            _ => Err(ChunkError::InvalidOperation {
                op,
                chunk_type,
                reason: "only sequence chunks hold children",
            }),
        }
    }

    // ── Editing ──────────────────────────────────────────────────────────────

    /// Insert `chunk` at the front of a mutable sequence.
    pub fn prepend(&mut self, chunk: impl Into<ChunkRef>, flatten: bool) -> Result<()> {
        self.sequence_mut("prepend")?.prepend(chunk.into(), flatten)
    }

    /// Insert `chunk` at the back of a mutable sequence.
    pub fn append(&mut self, chunk: impl Into<ChunkRef>, flatten: bool) -> Result<()> {
        self.sequence_mut("append")?.append(chunk.into(), flatten)
    }

    /// Replace the content of a mutable raw bytes leaf.
    pub fn set_bytes(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.check_mutable("set_bytes")?;
        let chunk_type = self.chunk_type();
        match &mut self.kind {
            ChunkKind::Leaf(LeafChunk::Bytes(current)) => {
                *current = data.into();
                Ok(())
            }
            _ => Err(ChunkError::InvalidOperation {
                op: "set_bytes",
                chunk_type,
                reason: "only raw bytes leaves hold editable bytes",
            }),
        }
    }
}

fn freeze_child(child: &mut ChunkRef) -> Result<()> {
    if child.is_immutable() {
        return Ok(());
    }
    let chunk_type = child.chunk_type();
    match Arc::get_mut(child) {
        Some(owned) => owned.mark_immutable(),
        None => Err(ChunkError::SharedMutableChild {
            op: "mark_immutable",
            chunk_type,
        }),
    }
}

/// Freeze a chunk that is about to be shared by a packet.
pub(crate) fn freeze_shared(mut chunk: ChunkRef, op: &'static str) -> Result<ChunkRef> {
    if chunk.is_immutable() {
        return Ok(chunk);
    }
    let chunk_type = chunk.chunk_type();
    match Arc::get_mut(&mut chunk) {
        Some(owned) => owned.mark_immutable()?,
        None => return Err(ChunkError::SharedMutableChild { op, chunk_type }),
    }
    Ok(chunk)
}

// ── Display ──────────────────────────────────────────────────────────────────

const PREVIEW_BYTES: usize = 16;

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ChunkKind::Leaf(LeafChunk::Bytes(data)) => {
                let shown = data.len().min(PREVIEW_BYTES);
                write!(
                    f,
                    "BytesChunk, length = {}, data = {}",
                    data.len(),
                    hex::encode(&data[..shown])
                )?;
                if data.len() > shown {
                    f.write_str("...")?;
                }
                Ok(())
            }
            ChunkKind::Leaf(LeafChunk::ByteCount { length, fill }) => {
                write!(f, "ByteCountChunk, length = {length}, fill = {fill:#04x}")
            }
            ChunkKind::Leaf(LeafChunk::Fields(fields)) => write!(
                f,
                "FieldsChunk({}), length = {}, {:?}",
                fields.dyn_chunk_type(),
                fields.dyn_byte_length(),
                fields
            ),
            ChunkKind::Sequence(seq) => {
                write!(f, "SequenceChunk, length = {}, chunks = {{", seq.byte_length())?;
                for (i, child) in seq.chunks().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str("}")
            }
            ChunkKind::Slice(slice) => write!(
                f,
                "SliceChunk, offset = {}, length = {}, chunk = {{{}}}",
                slice.offset(),
                slice.length(),
                slice.backing()
            ),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
