//! Slice chunks — zero-copy windows into another chunk.

use std::sync::Arc;

use crate::chunk::{Chunk, ChunkKind, ChunkRef, ChunkType};
use crate::error::{ChunkError, Result};
use crate::iter::ChunkIterator;
use crate::peek::Peeked;

/// `length` bytes of `backing` starting at `offset`.
///
/// Never backed by another slice: construction collapses nested slices
/// onto the innermost chunk, so following `backing` once always reaches
/// real content.
#[derive(Debug, Clone)]
pub struct SliceChunk {
    backing: ChunkRef,
    offset: u64,
    length: u64,
}

impl SliceChunk {
    pub fn new(backing: ChunkRef, offset: u64, length: u64) -> Result<Self> {
        let available = backing.byte_length();
        if offset.checked_add(length).map_or(true, |end| end > available) {
            return Err(ChunkError::OutOfBounds {
                op: "slice",
                offset,
                length,
                available,
            });
        }
        if let ChunkKind::Slice(inner) = backing.kind() {
            return Ok(Self {
                backing: inner.backing.clone(),
                offset: inner.offset + offset,
                length,
            });
        }
        Ok(Self {
            backing,
            offset,
            length,
        })
    }

    /// Wrap into a chunk that is frozen exactly when the backing is.
    pub(crate) fn into_chunk(self) -> Chunk {
        let frozen = self.backing.is_immutable();
        let mut chunk = Chunk::from_kind(ChunkKind::Slice(self));
        if frozen {
            chunk.set_immutable();
        }
        chunk
    }

    pub fn backing(&self) -> &ChunkRef {
        &self.backing
    }

    pub(crate) fn backing_mut(&mut self) -> &mut ChunkRef {
        &mut self.backing
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Same backing instance and `self` ends where `next` starts.
    pub fn is_followed_by(&self, next: &SliceChunk) -> bool {
        Arc::ptr_eq(&self.backing, &next.backing) && self.end() == next.offset
    }

    /// One slice covering `self` and then `next`, if they are contiguous.
    pub(crate) fn merge(&self, next: &SliceChunk) -> Option<ChunkRef> {
        if !self.is_followed_by(next) {
            return None;
        }
        let merged = SliceChunk {
            backing: self.backing.clone(),
            offset: self.offset,
            length: self.length + next.length,
        };
        Some(Arc::new(merged.into_chunk()))
    }

    /// The pieces of a sequence backing this slice covers, in order.
    ///
    /// Children entirely inside the window are reused by reference; children
    /// cut by either edge become narrower slices. Empty for leaf backings.
    pub(crate) fn covered_parts(&self) -> Result<Vec<ChunkRef>> {
        let ChunkKind::Sequence(seq) = self.backing.kind() else {
            return Ok(Vec::new());
        };
        let (start, end) = (self.offset, self.end());
        let mut parts = Vec::new();
        let mut position = 0u64;
        for child in seq.chunks() {
            let child_start = position;
            let child_end = position + child.byte_length();
            position = child_end;
            if start <= child_start && child_end <= end {
                parts.push(child.clone());
            } else if child_start < end && start < child_end {
                let from = start.max(child_start);
                let to = end.min(child_end);
                let part = Chunk::slice(child.clone(), from - child_start, to - from)?;
                parts.push(Arc::new(part));
            }
        }
        Ok(parts)
    }

    /// Resolve a peek against this slice without serializing.
    ///
    /// `this` is the shared handle of the chunk wrapping `self`.
    pub(crate) fn peek_structural(
        &self,
        this: &ChunkRef,
        forward: bool,
        offset: u64,
        length: Option<u64>,
        want: ChunkType,
    ) -> Peeked {
        let whole = offset == 0 && length.map_or(true, |l| l == self.length);
        if whole {
            if this.matches(want) {
                return Peeked::Found(this.clone());
            }
            if self.offset == 0 && self.length == self.backing.byte_length() {
                if self.backing.matches(want) {
                    tracing::trace!(chunk_type = %want, "peek resolved to slice backing");
                    return Peeked::Found(self.backing.clone());
                }
                if self.backing.conflicts_with(want) {
                    return Peeked::Mismatch(self.length);
                }
            }
        }

        // Look for structure inside the backing chunk, in backing coordinates.
        let start = if forward {
            offset
        } else {
            match length.and_then(|l| self.length.checked_sub(offset.checked_add(l)?)) {
                Some(start) => start,
                None => return Peeked::Unaligned,
            }
        };
        let Some(window) = self.length.checked_sub(start) else {
            return Peeked::Unaligned;
        };
        let position = self.offset + start;
        let iter = ChunkIterator::at(true, position);
        match self.backing.peek_structural(&iter, position, length, want) {
            Peeked::Found(chunk) if chunk.byte_length() <= window => Peeked::Found(chunk),
            // content cut by the window edge is not at a boundary of the slice
            Peeked::Mismatch(conflict) if conflict <= window => Peeked::Mismatch(conflict),
            Peeked::Found(_) | Peeked::Mismatch(_) | Peeked::Unaligned => Peeked::Unaligned,
        }
    }
}
