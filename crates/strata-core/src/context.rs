//! Settings and collaborators shared by every packet of one protocol stack.

use serde::{Deserialize, Serialize};

use crate::serializer::SerializerRegistry;

static_assertions::assert_impl_all!(PacketContext: Send, Sync);

/// Chunk behaviour switches. Loaded from the application's config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Allow peeks to rebuild content from serialized bytes. When false,
    /// a peek that misses the structural paths fails unless it can be
    /// answered with a slice or with bytes already stored contiguously.
    pub implicit_serialization: bool,
    /// Flatten nested sequences and merge contiguous slices on insert.
    pub flatten: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            implicit_serialization: true,
            flatten: true,
        }
    }
}

/// Registry plus configuration, built once and shared through `Arc`.
#[derive(Debug, Default)]
pub struct PacketContext {
    registry: SerializerRegistry,
    config: ChunkConfig,
}

impl PacketContext {
    pub fn new(registry: SerializerRegistry, config: ChunkConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &SerializerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }
}
