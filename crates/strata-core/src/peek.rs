//! Peeking — reinterpreting a byte range of a chunk as a wanted type.
//!
//! Resolution order:
//!
//!   1. structural   the range lines up with an existing chunk instance,
//!                   which is returned by reference (fast and linear paths)
//!   2. serialized   nothing lines up, so the range is rebuilt from bytes
//!                   through the serializer registry (slow path)
//!
//! A field set of another type sitting exactly at the requested boundary
//! ends the search with a mismatch; raw content never does, because its
//! bytes may still parse as the wanted type.

use std::sync::Arc;

use bytes::Bytes;

use crate::chunk::{Chunk, ChunkKind, ChunkRef, ChunkType, LeafChunk};
use crate::context::PacketContext;
use crate::error::{ChunkError, Result};
use crate::iter::ChunkIterator;

/// Outcome of a structural lookup.
#[derive(Debug)]
pub(crate) enum Peeked {
    Found(ChunkRef),
    /// Aligned with content of an incompatible type: definitely absent.
    /// Carries the length of that content.
    Mismatch(u64),
    /// No chunk boundary matches; only the slow path can answer.
    Unaligned,
}

impl Chunk {
    /// Peek `want` at the cursor position.
    ///
    /// `length` of `None` lets the matched chunk decide how many bytes it
    /// spans. Returns `Ok(None)` when the range holds something else.
    pub fn peek(
        self: &Arc<Self>,
        ctx: &PacketContext,
        iter: &ChunkIterator,
        length: Option<u64>,
        want: ChunkType,
    ) -> Result<Option<ChunkRef>> {
        self.peek_at(ctx, iter, iter.position(), length, want)
    }

    /// Peek `want` at `offset`, measured in the cursor's direction.
    ///
    /// The cursor only supplies its direction and cached child index; the
    /// index is used when `offset` equals the cursor position.
    pub fn peek_at(
        self: &Arc<Self>,
        ctx: &PacketContext,
        iter: &ChunkIterator,
        offset: u64,
        length: Option<u64>,
        want: ChunkType,
    ) -> Result<Option<ChunkRef>> {
        let available = self.byte_length();
        let end = offset.checked_add(length.unwrap_or(0));
        if end.map_or(true, |end| end > available) {
            return Err(ChunkError::OutOfBounds {
                op: "peek",
                offset,
                length: length.unwrap_or(0),
                available,
            });
        }
        if length == Some(0) || (length.is_none() && offset == available) {
            return Ok(None);
        }

        match self.peek_structural(iter, offset, length, want) {
            Peeked::Found(chunk) => Ok(Some(chunk)),
            Peeked::Mismatch(_) => Ok(None),
            Peeked::Unaligned => self.peek_serialized(ctx, iter.is_forward(), offset, length, want),
        }
    }

    pub(crate) fn peek_structural(
        self: &Arc<Self>,
        iter: &ChunkIterator,
        offset: u64,
        length: Option<u64>,
        want: ChunkType,
    ) -> Peeked {
        match self.kind() {
            ChunkKind::Sequence(seq) => seq.peek_structural(self, iter, offset, length, want),
            ChunkKind::Slice(slice) => {
                slice.peek_structural(self, iter.is_forward(), offset, length, want)
            }
            ChunkKind::Leaf(_) => {
                let whole = offset == 0 && length.map_or(true, |l| l == self.byte_length());
                if whole && self.matches(want) {
                    Peeked::Found(self.clone())
                } else if whole && self.conflicts_with(want) {
                    Peeked::Mismatch(self.byte_length())
                } else {
                    Peeked::Unaligned
                }
            }
        }
    }

    /// Slow path: rebuild the addressed range from its serialized bytes.
    fn peek_serialized(
        self: &Arc<Self>,
        ctx: &PacketContext,
        forward: bool,
        offset: u64,
        length: Option<u64>,
        want: ChunkType,
    ) -> Result<Option<ChunkRef>> {
        if want == ChunkType::SEQUENCE {
            return Ok(None);
        }
        let registry = ctx.registry();
        let total = self.byte_length();
        let length = match length {
            Some(length) => Some(length),
            None if want.is_structured() => registry.fixed_length(want)?,
            None => None,
        };
        let (start, span) = match (forward, length) {
            (true, Some(length)) => match offset.checked_add(length) {
                Some(end) if end <= total => (offset, length),
                _ => return Ok(None),
            },
            (true, None) => (offset, total - offset),
            (false, Some(length)) => match total.checked_sub(offset + length) {
                Some(start) => (start, length),
                None => return Ok(None),
            },
            (false, None) if !want.is_structured() => (0, total - offset),
            (false, None) => {
                return Err(ChunkError::UnknownLength {
                    op: "peek",
                    chunk_type: want,
                    offset,
                })
            }
        };

        let zero_copy = matches!(want, ChunkType::ANY | ChunkType::SLICE)
            || (want == ChunkType::BYTES && self.contiguous_bytes(start, span).is_some());
        if !zero_copy && !ctx.config().implicit_serialization {
            return Err(ChunkError::ImplicitSerializationDisabled {
                op: "peek",
                chunk_type: want,
            });
        }

        let chunk = match want {
            ChunkType::ANY | ChunkType::SLICE => Chunk::slice(self.clone(), start, span)?,
            ChunkType::BYTES => {
                let data = match self.contiguous_bytes(start, span) {
                    Some(data) => data,
                    None => registry.serialize_range(self, start, span)?,
                };
                Chunk::bytes(data)
            }
            _ => {
                let mut input = registry.serialize_range(self, start, span)?;
                match registry.deserialize(want, &mut input) {
                    Ok(chunk) => chunk,
                    Err(ChunkError::Decode { chunk_type, source }) => {
                        tracing::debug!(
                            %chunk_type,
                            offset = start,
                            length = span,
                            error = %source,
                            "serialized range does not decode"
                        );
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }
            }
        };
        if length.map_or(false, |length| chunk.byte_length() != length) {
            return Ok(None);
        }

        tracing::debug!(
            chunk_type = %want,
            offset = start,
            length = chunk.byte_length(),
            "peek materialized from serialized bytes"
        );
        let mut chunk = chunk;
        chunk.mark_immutable()?;
        Ok(Some(Arc::new(chunk)))
    }

    /// Zero-copy view of `[start, start + span)` when the range sits in one
    /// raw bytes leaf, directly or through a slice.
    fn contiguous_bytes(&self, start: u64, span: u64) -> Option<Bytes> {
        let (data, base) = match self.kind() {
            ChunkKind::Leaf(LeafChunk::Bytes(data)) => (data, 0),
            ChunkKind::Slice(slice) => (slice.backing().as_bytes()?, slice.offset()),
            _ => return None,
        };
        let from = usize::try_from(base + start).ok()?;
        let to = usize::try_from(base + start + span).ok()?;
        Some(data.slice(from..to))
    }
}
