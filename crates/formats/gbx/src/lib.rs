//! Reader/writer for Gbx, the chunked binary container of the Nadeo engine.
//!
//! Layers:
//! - **Primitives** (`cursor`, `id`): little-endian values and lookback strings
//! - **Stream** (`reader`/`writer`/`archive`, `stream`): the chunk record state machine
//! - **Container** (`header`, `ref_table`, `gbx`): file header, user data table, body
//!
//! Class knowledge comes from a [`Registry`], built once and shared read-only.
//! [`engines::builtin`] provides a small default population.

pub mod archive;
pub mod chunk;
pub mod cursor;
pub mod engines;
pub mod error;
pub mod gbx;
pub mod header;
pub mod id;
pub mod node;
pub mod reader;
pub mod ref_table;
pub mod registry;
pub mod remap;
pub mod settings;
pub mod stream;
pub mod version;
pub mod writer;

pub use archive::ReaderWriter;
pub use chunk::{Chunk, ChunkKind, ChunkSet, Class, ReadChunk, ReadWriteChunk, WriteChunk};
pub use error::{Error, Result};
pub use gbx::{BodyCodec, Gbx};
pub use id::{Id, Ident};
pub use node::{Node, NodeRef};
pub use reader::GbxReader;
pub use registry::{Capability, ChunkDescriptor, ClassDescriptor, Registry, RegistryBuilder};
pub use remap::Epoch;
pub use settings::{ReadSettings, WriteSettings};
pub use version::GameVersion;
pub use writer::GbxWriter;
