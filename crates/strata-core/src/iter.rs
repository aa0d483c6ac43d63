//! Cursors into a chunk.
//!
//! A forward cursor measures its position from the front of the chunk, a
//! backward cursor from the tail. For sequences the cursor also caches the
//! index of the child it sits in front of (counted in its own direction),
//! which is what makes the fast peek path O(1).
//!
//! Cursors are plain values. They are only valid for the chunk instance
//! they were positioned against; after that chunk is edited they must be
//! re-derived with [`Chunk::seek_iterator`].

use crate::chunk::{Chunk, ChunkKind};
use crate::error::{ChunkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkIterator {
    forward: bool,
    position: u64,
    index: Option<usize>,
}

impl ChunkIterator {
    /// Cursor at the front of a chunk, moving towards the tail.
    pub fn forward() -> Self {
        Self {
            forward: true,
            position: 0,
            index: Some(0),
        }
    }

    /// Cursor at the tail of a chunk, moving towards the front.
    pub fn backward() -> Self {
        Self {
            forward: false,
            position: 0,
            index: Some(0),
        }
    }

    /// Cursor at an arbitrary position with no cached child index.
    pub fn at(forward: bool, position: u64) -> Self {
        Self {
            forward,
            position,
            index: None,
        }
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Child index the cursor sits in front of, if it is on a boundary.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
}

impl Chunk {
    /// Advance `iter` by `length` bytes in its direction.
    pub fn move_iterator(&self, iter: &mut ChunkIterator, length: u64) -> Result<()> {
        let position = self.checked_position("move_iterator", iter.position, length)?;
        let index = match (self.kind(), iter.index) {
            (ChunkKind::Sequence(seq), Some(i)) if i < seq.len() => {
                if seq.element(iter.forward, i).byte_length() == length {
                    Some(i + 1)
                } else {
                    seq.index_at(iter.forward, position)
                }
            }
            _ => self.index_at(iter.forward, position),
        };
        iter.position = position;
        iter.index = index;
        Ok(())
    }

    /// Place `iter` at `position` and re-derive its child index.
    pub fn seek_iterator(&self, iter: &mut ChunkIterator, position: u64) -> Result<()> {
        let position = self.checked_position("seek_iterator", position, 0)?;
        iter.position = position;
        iter.index = self.index_at(iter.forward, position);
        Ok(())
    }

    fn index_at(&self, forward: bool, position: u64) -> Option<usize> {
        match self.kind() {
            ChunkKind::Sequence(seq) => seq.index_at(forward, position),
            _ if position == 0 => Some(0),
            _ if position == self.byte_length() => Some(1),
            _ => None,
        }
    }

    fn checked_position(&self, op: &'static str, position: u64, length: u64) -> Result<u64> {
        let available = self.byte_length();
        match position.checked_add(length) {
            Some(end) if end <= available => Ok(end),
            _ => Err(ChunkError::OutOfBounds {
                op,
                offset: position,
                length,
                available,
            }),
        }
    }
}
