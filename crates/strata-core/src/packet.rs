//! Packet — a root chunk plus header and trailer cursors.
//!
//! The bytes of a packet fall into three regions:
//!
//!   [0, header_pop_offset)                    popped headers
//!   [header_pop_offset, trailer_pop_offset)   data
//!   [trailer_pop_offset, packet_length)       popped trailers
//!
//! Between calls the root chunk is always immutable, so cloning a packet
//! is a reference-count increment. Edits go through copy-on-write: a root
//! this packet holds alone is thawed and edited in place, a shared root is
//! copied first (its node only, children stay shared).

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::chunk::{freeze_shared, Chunk, ChunkRef, ChunkType};
use crate::context::PacketContext;
use crate::error::{ChunkError, Result};
use crate::fields::FieldSet;
use crate::iter::ChunkIterator;
use crate::peek::Peeked;

static_assertions::assert_impl_all!(Packet: Send, Sync, Clone);

#[derive(Clone)]
pub struct Packet {
    ctx: Arc<PacketContext>,
    contents: Option<ChunkRef>,
    header: ChunkIterator,
    trailer: ChunkIterator,
}

impl Packet {
    /// An empty packet.
    pub fn new(ctx: Arc<PacketContext>) -> Self {
        Self {
            ctx,
            contents: None,
            header: ChunkIterator::forward(),
            trailer: ChunkIterator::backward(),
        }
    }

    /// A packet whose whole content is `chunk`, frozen on the way in.
    pub fn with_contents(ctx: Arc<PacketContext>, chunk: impl Into<ChunkRef>) -> Result<Self> {
        let chunk = freeze_shared(chunk.into(), "with_contents")?;
        let mut packet = Self::new(ctx);
        if chunk.byte_length() > 0 || chunk.as_sequence().is_none() {
            packet.contents = Some(chunk);
        }
        packet.reseek()?;
        Ok(packet)
    }

    /// Parse wire bytes into a packet rooted at a `root_type` chunk.
    ///
    /// Bytes the root does not consume are kept as a raw bytes chunk
    /// after it.
    pub fn deserialize(ctx: Arc<PacketContext>, data: Bytes, root_type: ChunkType) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::new(ctx));
        }
        if matches!(root_type, ChunkType::ANY | ChunkType::BYTES) {
            return Self::with_contents(ctx, Chunk::bytes(data));
        }
        let mut input = data;
        let root = ctx.registry().deserialize(root_type, &mut input)?;
        if input.is_empty() {
            return Self::with_contents(ctx, root);
        }
        tracing::debug!(
            chunk_type = %root_type,
            leftover = input.len(),
            "root chunk did not consume all bytes"
        );
        let flatten = ctx.config().flatten;
        let seq = Chunk::sequence_of([Arc::new(root), Arc::new(Chunk::bytes(input))], flatten)?;
        Self::with_contents(ctx, seq)
    }

    /// The wire form of the whole packet, popped regions included.
    pub fn serialize(&self) -> Result<Bytes> {
        match &self.contents {
            Some(root) => self.ctx.registry().serialize(root),
            None => Ok(Bytes::new()),
        }
    }

    /// An independent packet sharing all content with this one.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    pub fn context(&self) -> &Arc<PacketContext> {
        &self.ctx
    }

    pub fn contents(&self) -> Option<&ChunkRef> {
        self.contents.as_ref()
    }

    // ── Lengths & Offsets ────────────────────────────────────────────────────

    pub fn packet_length(&self) -> u64 {
        self.contents.as_ref().map_or(0, |root| root.byte_length())
    }

    pub fn data_length(&self) -> u64 {
        self.packet_length() - self.header.position() - self.trailer.position()
    }

    pub fn header_pop_offset(&self) -> u64 {
        self.header.position()
    }

    pub fn header_popped_length(&self) -> u64 {
        self.header.position()
    }

    /// Absolute offset where the popped trailers begin.
    pub fn trailer_pop_offset(&self) -> u64 {
        self.packet_length() - self.trailer.position()
    }

    pub fn trailer_popped_length(&self) -> u64 {
        self.trailer.position()
    }

    /// Move the header cursor to absolute `offset`, popping or un-popping.
    pub fn set_header_pop_offset(&mut self, offset: u64) -> Result<()> {
        let limit = self.trailer_pop_offset();
        if offset > limit {
            return Err(ChunkError::OutOfBounds {
                op: "set_header_pop_offset",
                offset,
                length: 0,
                available: limit,
            });
        }
        if let Some(root) = &self.contents {
            root.seek_iterator(&mut self.header, offset)?;
        }
        Ok(())
    }

    /// Move the trailer cursor so that popped trailers start at `offset`.
    pub fn set_trailer_pop_offset(&mut self, offset: u64) -> Result<()> {
        let length = self.packet_length();
        if offset < self.header.position() || offset > length {
            return Err(ChunkError::OutOfBounds {
                op: "set_trailer_pop_offset",
                offset,
                length: 0,
                available: length,
            });
        }
        if let Some(root) = &self.contents {
            root.seek_iterator(&mut self.trailer, length - offset)?;
        }
        Ok(())
    }

    // ── Push ─────────────────────────────────────────────────────────────────

    /// Prepend `chunk`. Nothing may have been popped from the front.
    pub fn push_header(&mut self, chunk: impl Into<ChunkRef>) -> Result<()> {
        let chunk = chunk.into();
        if self.header.position() != 0 {
            return Err(ChunkError::InvalidOperation {
                op: "push_header",
                chunk_type: chunk.chunk_type(),
                reason: "headers have already been popped",
            });
        }
        let chunk = freeze_shared(chunk, "push_header")?;
        self.insert(chunk, true)
    }

    /// Append `chunk`. Nothing may have been popped from the back.
    pub fn push_trailer(&mut self, chunk: impl Into<ChunkRef>) -> Result<()> {
        let chunk = chunk.into();
        if self.trailer.position() != 0 {
            return Err(ChunkError::InvalidOperation {
                op: "push_trailer",
                chunk_type: chunk.chunk_type(),
                reason: "trailers have already been popped",
            });
        }
        let chunk = freeze_shared(chunk, "push_trailer")?;
        self.insert(chunk, false)
    }

    fn insert(&mut self, chunk: ChunkRef, front: bool) -> Result<()> {
        if chunk.byte_length() == 0 && chunk.as_sequence().is_some() {
            return Ok(());
        }
        let flatten = self.ctx.config().flatten;
        match self.contents.as_mut() {
            None => self.contents = Some(chunk),
            Some(root) if root.as_sequence().is_some() => {
                let seq = make_contents_mutable(root);
                let inserted = if front {
                    seq.prepend(chunk, flatten)
                } else {
                    seq.append(chunk, flatten)
                };
                // existing children and `chunk` are already frozen
                seq.set_immutable();
                inserted?;
            }
            Some(root) => {
                let parts = if front {
                    [chunk, root.clone()]
                } else {
                    [root.clone(), chunk]
                };
                let mut seq = Chunk::sequence_of(parts, flatten)?;
                seq.mark_immutable()?;
                *root = Arc::new(seq);
            }
        }
        self.reseek()
    }

    // ── Pop ──────────────────────────────────────────────────────────────────

    /// Peek `want` at the header cursor and advance past it.
    pub fn pop_header(&mut self, want: ChunkType, length: Option<u64>) -> Result<Option<ChunkRef>> {
        let Some(chunk) = self.peek_header(want, length)? else {
            return Ok(None);
        };
        if let Some(root) = &self.contents {
            root.move_iterator(&mut self.header, chunk.byte_length())?;
        }
        tracing::trace!(chunk_type = %chunk.chunk_type(), length = chunk.byte_length(), "popped header");
        Ok(Some(chunk))
    }

    /// Peek `want` at the trailer cursor and advance past it.
    pub fn pop_trailer(&mut self, want: ChunkType, length: Option<u64>) -> Result<Option<ChunkRef>> {
        let Some(chunk) = self.peek_trailer(want, length)? else {
            return Ok(None);
        };
        if let Some(root) = &self.contents {
            root.move_iterator(&mut self.trailer, chunk.byte_length())?;
        }
        tracing::trace!(chunk_type = %chunk.chunk_type(), length = chunk.byte_length(), "popped trailer");
        Ok(Some(chunk))
    }

    pub fn pop_header_as<T: FieldSet>(&mut self) -> Result<Option<Arc<T>>> {
        Ok(self
            .pop_header(T::TYPE, None)?
            .and_then(|chunk| chunk.field_set_arc::<T>()))
    }

    pub fn pop_trailer_as<T: FieldSet>(&mut self) -> Result<Option<Arc<T>>> {
        Ok(self
            .pop_trailer(T::TYPE, None)?
            .and_then(|chunk| chunk.field_set_arc::<T>()))
    }

    // ── Peek ─────────────────────────────────────────────────────────────────

    pub fn peek_header(&self, want: ChunkType, length: Option<u64>) -> Result<Option<ChunkRef>> {
        let end = self.header.position() + self.data_length();
        self.peek_region("peek_header", &self.header, self.header.position(), end, length, want)
    }

    pub fn peek_trailer(&self, want: ChunkType, length: Option<u64>) -> Result<Option<ChunkRef>> {
        let end = self.trailer.position() + self.data_length();
        self.peek_region("peek_trailer", &self.trailer, self.trailer.position(), end, length, want)
    }

    /// Peek `want` at `offset` bytes into the data region.
    pub fn peek_data_at(
        &self,
        want: ChunkType,
        offset: u64,
        length: Option<u64>,
    ) -> Result<Option<ChunkRef>> {
        let data_length = self.data_length();
        if offset > data_length {
            return Err(ChunkError::OutOfBounds {
                op: "peek_data_at",
                offset,
                length: length.unwrap_or(0),
                available: data_length,
            });
        }
        let start = self.header.position();
        self.peek_region("peek_data_at", &self.header, start + offset, start + data_length, length, want)
    }

    /// Peek `want` at an absolute offset, ignoring the popped regions.
    pub fn peek_at(&self, want: ChunkType, offset: u64, length: Option<u64>) -> Result<Option<ChunkRef>> {
        let end = self.packet_length();
        if offset > end {
            return Err(ChunkError::OutOfBounds {
                op: "peek_at",
                offset,
                length: length.unwrap_or(0),
                available: end,
            });
        }
        self.peek_region("peek_at", &self.header, offset, end, length, want)
    }

    pub fn peek_header_as<T: FieldSet>(&self) -> Result<Option<Arc<T>>> {
        Ok(self
            .peek_header(T::TYPE, None)?
            .and_then(|chunk| chunk.field_set_arc::<T>()))
    }

    pub fn peek_trailer_as<T: FieldSet>(&self) -> Result<Option<Arc<T>>> {
        Ok(self
            .peek_trailer(T::TYPE, None)?
            .and_then(|chunk| chunk.field_set_arc::<T>()))
    }

    pub fn peek_data_as<T: FieldSet>(&self, offset: u64) -> Result<Option<Arc<T>>> {
        Ok(self
            .peek_data_at(T::TYPE, offset, None)?
            .and_then(|chunk| chunk.field_set_arc::<T>()))
    }

    pub fn has_header(&self, want: ChunkType) -> Result<bool> {
        Ok(self.peek_header(want, None)?.is_some())
    }

    pub fn has_trailer(&self, want: ChunkType) -> Result<bool> {
        Ok(self.peek_trailer(want, None)?.is_some())
    }

    pub fn has_data_at(&self, want: ChunkType, offset: u64, length: Option<u64>) -> Result<bool> {
        Ok(self.peek_data_at(want, offset, length)?.is_some())
    }

    pub fn has_at(&self, want: ChunkType, offset: u64, length: Option<u64>) -> Result<bool> {
        Ok(self.peek_at(want, offset, length)?.is_some())
    }

    /// The data region as raw bytes.
    pub fn peek_data_bytes(&self) -> Result<Bytes> {
        let length = self.data_length();
        if length == 0 {
            return Ok(Bytes::new());
        }
        Ok(self
            .peek_data_at(ChunkType::BYTES, 0, Some(length))?
            .and_then(|chunk| chunk.as_bytes().cloned())
            .unwrap_or_default())
    }

    /// Peek inside `[.., end)`, both measured in the cursor's direction.
    fn peek_region(
        &self,
        op: &'static str,
        iter: &ChunkIterator,
        offset: u64,
        end: u64,
        length: Option<u64>,
        want: ChunkType,
    ) -> Result<Option<ChunkRef>> {
        let remaining = end - offset;
        if let Some(length) = length {
            if length > remaining {
                return Err(ChunkError::OutOfBounds {
                    op,
                    offset,
                    length,
                    available: remaining,
                });
            }
        }
        let Some(root) = &self.contents else {
            return Ok(None);
        };
        // raw views with an automatic length stop at the region edge
        let length = match length {
            None if !want.is_structured() && offset < root.byte_length() => {
                match root.peek_structural(iter, offset, None, want) {
                    Peeked::Found(chunk) if chunk.byte_length() <= remaining => {
                        return Ok(Some(chunk))
                    }
                    _ => Some(remaining),
                }
            }
            length => length,
        };
        match root.peek_at(&self.ctx, iter, offset, length, want)? {
            Some(chunk) if chunk.byte_length() <= remaining => Ok(Some(chunk)),
            _ => Ok(None),
        }
    }

    // ── Remove ───────────────────────────────────────────────────────────────

    /// Drop `length` already-popped bytes from the front.
    pub fn remove_from_beginning(&mut self, length: u64) -> Result<()> {
        let popped = self.header.position();
        if length > popped {
            return Err(ChunkError::OutOfBounds {
                op: "remove_from_beginning",
                offset: 0,
                length,
                available: popped,
            });
        }
        if length == 0 {
            return Ok(());
        }
        let remaining = self.packet_length() - length;
        self.contents = self.shrink(length, remaining)?;
        self.header = ChunkIterator::at(true, popped - length);
        self.reseek()
    }

    /// Drop `length` already-popped bytes from the back.
    pub fn remove_from_end(&mut self, length: u64) -> Result<()> {
        let popped = self.trailer.position();
        if length > popped {
            return Err(ChunkError::OutOfBounds {
                op: "remove_from_end",
                offset: 0,
                length,
                available: popped,
            });
        }
        if length == 0 {
            return Ok(());
        }
        let remaining = self.packet_length() - length;
        self.contents = self.shrink(0, remaining)?;
        self.trailer = ChunkIterator::at(false, popped - length);
        self.reseek()
    }

    /// The root narrowed to `[offset, offset + length)`, reusing whole
    /// children and slicing the ones cut by the edges.
    fn shrink(&self, offset: u64, length: u64) -> Result<Option<ChunkRef>> {
        let Some(root) = &self.contents else {
            return Ok(None);
        };
        if length == 0 {
            return Ok(None);
        }
        let window = Arc::new(Chunk::slice(root.clone(), offset, length)?);
        let backed_by_sequence = window
            .as_slice()
            .map_or(false, |slice| slice.backing().as_sequence().is_some());
        if !backed_by_sequence {
            return Ok(Some(window));
        }
        let mut seq = Chunk::sequence_of([window], true)?;
        let single = seq
            .as_sequence()
            .filter(|seq| seq.len() == 1)
            .and_then(|seq| seq.get(0).cloned());
        if let Some(only) = single {
            return Ok(Some(only));
        }
        seq.mark_immutable()?;
        Ok(Some(Arc::new(seq)))
    }

    // ── Introspection ────────────────────────────────────────────────────────

    /// Number of top-level chunks in the root.
    pub fn num_chunks(&self) -> usize {
        match &self.contents {
            None => 0,
            Some(root) => root.as_sequence().map_or(1, |seq| seq.len()),
        }
    }

    pub fn chunk(&self, index: usize) -> Option<ChunkRef> {
        let root = self.contents.as_ref()?;
        match root.as_sequence() {
            Some(seq) => seq.get(index).cloned(),
            None => (index == 0).then(|| root.clone()),
        }
    }

    /// Re-derive both cursors against the current root.
    fn reseek(&mut self) -> Result<()> {
        match &self.contents {
            Some(root) => {
                let (front, back) = (self.header.position(), self.trailer.position());
                root.seek_iterator(&mut self.header, front)?;
                root.seek_iterator(&mut self.trailer, back)
            }
            None => {
                self.header = ChunkIterator::forward();
                self.trailer = ChunkIterator::backward();
                Ok(())
            }
        }
    }
}

/// Exclusive access to the root for one edit, copying it if it is shared.
fn make_contents_mutable(root: &mut ChunkRef) -> &mut Chunk {
    if Arc::strong_count(root) > 1 {
        tracing::debug!(
            chunk_type = %root.chunk_type(),
            length = root.byte_length(),
            "copying shared packet root before edit"
        );
    }
    let chunk = Arc::make_mut(root);
    chunk.thaw();
    chunk
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("packet_length", &self.packet_length())
            .field("header_popped", &self.header_popped_length())
            .field("trailer_popped", &self.trailer_popped_length())
            .field("contents", &self.contents)
            .finish()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet, length = {}, header_popped = {}, trailer_popped = {}",
            self.packet_length(),
            self.header_popped_length(),
            self.trailer_popped_length()
        )?;
        match &self.contents {
            Some(root) => write!(f, ", contents = {{{root}}}"),
            None => f.write_str(", contents = {}"),
        }
    }
}
