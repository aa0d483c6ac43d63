//! Sequence chunks — ordered concatenation of shared children.
//!
//! Children live in a `VecDeque` so that both header pushes (front) and
//! trailer pushes (back) are O(1). Insertion flattens by default:
//!
//!   - a nested sequence is spliced in child by child
//!   - a slice over a sequence is expanded into the children it covers
//!   - a slice that continues an adjacent slice of the same backing chunk
//!     is merged into one wider slice
//!
//! Flattening keeps the tree shallow, which is what lets later peeks find
//! their target on a child boundary instead of falling back to bytes.

use std::collections::VecDeque;

use crate::chunk::{ChunkKind, ChunkRef, ChunkType};
use crate::error::Result;
use crate::iter::ChunkIterator;
use crate::peek::Peeked;

#[derive(Debug, Clone, Default)]
pub struct SequenceChunk {
    chunks: VecDeque<ChunkRef>,
    byte_length: u64,
}

/// What a flattening insert does with an incoming chunk.
enum Insert {
    Splice(Vec<ChunkRef>),
    Slice,
    Plain,
}

impl SequenceChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> impl DoubleEndedIterator<Item = &ChunkRef> + ExactSizeIterator {
        self.chunks.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ChunkRef> {
        self.chunks.get(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }

    pub(crate) fn chunks_mut(&mut self) -> impl Iterator<Item = &mut ChunkRef> {
        self.chunks.iter_mut()
    }

    /// The `index`-th child counted in the given direction.
    pub(crate) fn element(&self, forward: bool, index: usize) -> &ChunkRef {
        if forward {
            &self.chunks[index]
        } else {
            &self.chunks[self.chunks.len() - 1 - index]
        }
    }

    /// Index of the child starting exactly at `position`, `len()` at the end.
    pub(crate) fn index_at(&self, forward: bool, position: u64) -> Option<usize> {
        let mut offset = 0u64;
        for i in 0..self.chunks.len() {
            if offset == position {
                return Some(i);
            }
            offset += self.element(forward, i).byte_length();
            if offset > position {
                return None;
            }
        }
        (offset == position).then_some(self.chunks.len())
    }

    fn classify(chunk: &ChunkRef, flatten: bool) -> Result<Insert> {
        if !flatten {
            return Ok(Insert::Plain);
        }
        Ok(match chunk.kind() {
            ChunkKind::Sequence(seq) => Insert::Splice(seq.chunks().cloned().collect()),
            ChunkKind::Slice(slice) if matches!(slice.backing().kind(), ChunkKind::Sequence(_)) => {
                Insert::Splice(slice.covered_parts()?)
            }
            ChunkKind::Slice(_) => Insert::Slice,
            ChunkKind::Leaf(_) => Insert::Plain,
        })
    }

    pub(crate) fn append(&mut self, chunk: ChunkRef, flatten: bool) -> Result<()> {
        match Self::classify(&chunk, flatten)? {
            Insert::Splice(parts) => {
                for part in parts {
                    self.append(part, flatten)?;
                }
                return Ok(());
            }
            Insert::Slice => {
                if let (Some(last), Some(next)) = (self.chunks.back_mut(), chunk.as_slice()) {
                    if let Some(merged) = last.as_slice().and_then(|prev| prev.merge(next)) {
                        tracing::trace!(length = merged.byte_length(), "merged appended slice");
                        *last = merged;
                        self.byte_length += next.length();
                        return Ok(());
                    }
                }
            }
            Insert::Plain => {}
        }
        self.byte_length += chunk.byte_length();
        self.chunks.push_back(chunk);
        Ok(())
    }

    pub(crate) fn prepend(&mut self, chunk: ChunkRef, flatten: bool) -> Result<()> {
        match Self::classify(&chunk, flatten)? {
            Insert::Splice(parts) => {
                for part in parts.into_iter().rev() {
                    self.prepend(part, flatten)?;
                }
                return Ok(());
            }
            Insert::Slice => {
                if let (Some(first), Some(prev)) = (self.chunks.front_mut(), chunk.as_slice()) {
                    if let Some(merged) = first.as_slice().and_then(|next| prev.merge(next)) {
                        tracing::trace!(length = merged.byte_length(), "merged prepended slice");
                        *first = merged;
                        self.byte_length += prev.length();
                        return Ok(());
                    }
                }
            }
            Insert::Plain => {}
        }
        self.byte_length += chunk.byte_length();
        self.chunks.push_front(chunk);
        Ok(())
    }

    /// Resolve a peek against the children without serializing.
    ///
    /// `offset` is measured in the iterator's direction. Only a child that
    /// starts exactly at `offset` (and has exactly `length` bytes, when
    /// given) can be returned; requests are never split across children.
    pub(crate) fn peek_structural(
        &self,
        this: &ChunkRef,
        iter: &ChunkIterator,
        offset: u64,
        length: Option<u64>,
        want: ChunkType,
    ) -> Peeked {
        let forward = iter.is_forward();
        let fits = |chunk: &ChunkRef| length.map_or(true, |l| l == chunk.byte_length());

        // fast path: the cursor already sits in front of the child
        if let Some(i) = iter.index() {
            if i < self.chunks.len() && offset == iter.position() {
                let chunk = self.element(forward, i);
                if fits(chunk) && chunk.matches(want) {
                    tracing::trace!(index = i, chunk_type = %want, "peek fast path");
                    return Peeked::Found(chunk.clone());
                }
            }
        }

        if offset == 0 && length == Some(self.byte_length) && this.matches(want) {
            return Peeked::Found(this.clone());
        }

        // linear path: walk the boundaries in the cursor's direction
        let mut position = 0u64;
        for i in 0..self.chunks.len() {
            if position > offset {
                break;
            }
            let chunk = self.element(forward, i);
            if position == offset && fits(chunk) {
                if chunk.matches(want) {
                    tracing::trace!(index = i, chunk_type = %want, "peek linear path");
                    return Peeked::Found(chunk.clone());
                }
                if chunk.conflicts_with(want) {
                    return Peeked::Mismatch(chunk.byte_length());
                }
            }
            position += chunk.byte_length();
        }
        Peeked::Unaligned
    }
}
