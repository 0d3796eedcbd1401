use serde::{Deserialize, Serialize};

use crate::remap::Epoch;

/// Options for decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadSettings {
    /// A skippable chunk's typed reader must consume exactly its declared length.
    pub validate_chunk_size: bool,
    /// Treat a known skippable chunk without a skip marker as an error instead
    /// of the end of the stream.
    pub strict_skip_markers: bool,
    /// Stop after the header; the body is kept as raw bytes.
    pub header_only: bool,
    /// Chunk ids whose payload is kept raw instead of decoded.
    pub ignored_chunks: Vec<u32>,
    /// Maximum nesting of inline node references.
    pub max_node_depth: usize,
}

impl Default for ReadSettings {
    fn default() -> Self {
        Self {
            validate_chunk_size: true,
            strict_skip_markers: false,
            header_only: false,
            ignored_chunks: Vec::new(),
            max_node_depth: 64,
        }
    }
}

impl ReadSettings {
    pub fn is_ignored(&self, chunk_id: u32) -> bool {
        self.ignored_chunks.contains(&chunk_id)
    }
}

/// Options for encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteSettings {
    /// Numbering to write in. Defaults to the one detected when reading.
    pub epoch: Option<Epoch>,
}
