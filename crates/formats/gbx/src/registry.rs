//! Class and chunk lookup tables.
//!
//! A [`Registry`] is assembled once through [`RegistryBuilder`], validated,
//! and then only read. Every codec entry point takes it by reference, so one
//! registry can serve any number of streams on any number of threads.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::chunk::{Chunk, ChunkKind, Class, ReadChunk, ReadWriteChunk, WriteChunk};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::remap::{family, RemapTable};
use crate::version::GameVersion;

/// Capability tag of a chunk descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    Opaque,
}

#[derive(Clone, Copy)]
enum ChunkFactory {
    ReadOnly(fn() -> Box<dyn ReadChunk>),
    WriteOnly(fn() -> Box<dyn WriteChunk>),
    ReadWrite(fn() -> Box<dyn ReadWriteChunk>),
    Opaque,
}

fn make_read<T: ReadChunk + Default>() -> Box<dyn ReadChunk> {
    Box::new(T::default())
}

fn make_write<T: WriteChunk + Default>() -> Box<dyn WriteChunk> {
    Box::new(T::default())
}

fn make_read_write<T: ReadWriteChunk + Default>() -> Box<dyn ReadWriteChunk> {
    Box::new(T::default())
}

fn make_class<T: Class + Default>() -> Box<dyn Class> {
    Box::new(T::default())
}

/// Static description of one chunk identifier.
#[derive(Clone)]
pub struct ChunkDescriptor {
    pub id: u32,
    factory: ChunkFactory,
    pub skippable: bool,
    pub ignore: bool,
    /// Identifier is never translated between numberings.
    pub not_remapped: bool,
    /// Header metadata entry written with the heavy bit.
    pub heavy: bool,
    pub game_version: GameVersion,
}

impl std::fmt::Debug for ChunkDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkDescriptor")
            .field("id", &format_args!("0x{:08X}", self.id))
            .field("capability", &self.capability())
            .field("skippable", &self.skippable)
            .field("ignore", &self.ignore)
            .field("not_remapped", &self.not_remapped)
            .field("heavy", &self.heavy)
            .field("game_version", &self.game_version)
            .finish()
    }
}

impl ChunkDescriptor {
    fn with_factory(id: u32, factory: ChunkFactory) -> Self {
        Self {
            id,
            factory,
            skippable: matches!(factory, ChunkFactory::Opaque),
            ignore: false,
            not_remapped: false,
            heavy: false,
            game_version: GameVersion::UNSPECIFIED,
        }
    }

    pub fn read_only<T: ReadChunk + Default>(id: u32) -> Self {
        Self::with_factory(id, ChunkFactory::ReadOnly(make_read::<T>))
    }

    pub fn write_only<T: WriteChunk + Default>(id: u32) -> Self {
        Self::with_factory(id, ChunkFactory::WriteOnly(make_write::<T>))
    }

    pub fn read_write<T: ReadWriteChunk + Default>(id: u32) -> Self {
        Self::with_factory(id, ChunkFactory::ReadWrite(make_read_write::<T>))
    }

    /// Known identifier whose payload is always kept as raw bytes.
    pub fn opaque(id: u32) -> Self {
        Self::with_factory(id, ChunkFactory::Opaque)
    }

    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn not_remapped(mut self) -> Self {
        self.not_remapped = true;
        self
    }

    pub fn heavy(mut self) -> Self {
        self.heavy = true;
        self
    }

    pub fn game_version(mut self, version: GameVersion) -> Self {
        self.game_version = version;
        self
    }

    pub fn capability(&self) -> Capability {
        match self.factory {
            ChunkFactory::ReadOnly(_) => Capability::ReadOnly,
            ChunkFactory::WriteOnly(_) => Capability::WriteOnly,
            ChunkFactory::ReadWrite(_) => Capability::ReadWrite,
            ChunkFactory::Opaque => Capability::Opaque,
        }
    }

    /// Fresh, empty chunk instance.
    pub fn instantiate(&self) -> Chunk {
        let kind = match self.factory {
            ChunkFactory::ReadOnly(make) => ChunkKind::ReadOnly(make()),
            ChunkFactory::WriteOnly(make) => ChunkKind::WriteOnly(make()),
            ChunkFactory::ReadWrite(make) => ChunkKind::ReadWrite(make()),
            ChunkFactory::Opaque => ChunkKind::Opaque,
        };
        Chunk {
            skippable: self.skippable,
            ignore: self.ignore,
            heavy: self.heavy,
            game_version: self.game_version,
            ..Chunk::new(self.id, kind)
        }
    }
}

/// Static description of one class.
#[derive(Clone)]
pub struct ClassDescriptor {
    pub id: u32,
    pub name: &'static str,
    pub parent: Option<u32>,
    /// File type suffix, `Map` for `*.Map.Gbx`.
    pub extension: Option<&'static str>,
    constructor: Option<fn() -> Box<dyn Class>>,
    write_supported: bool,
    declared_chunks: Vec<ChunkDescriptor>,
    declared_header_chunks: Vec<ChunkDescriptor>,
    // Filled by `RegistryBuilder::build`.
    ancestors: Vec<u32>,
    chunks: IndexMap<u32, ChunkDescriptor>,
    header_chunks: IndexMap<u32, ChunkDescriptor>,
}

impl std::fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("id", &format_args!("0x{:08X}", self.id))
            .field("name", &self.name)
            .field("concrete", &self.is_concrete())
            .field("ancestors", &self.ancestors)
            .field("chunks", &self.chunks.len())
            .field("header_chunks", &self.header_chunks.len())
            .finish()
    }
}

impl ClassDescriptor {
    /// Abstract class with no chunks.
    pub fn new(id: u32, name: &'static str) -> Self {
        Self {
            id,
            name,
            parent: None,
            extension: None,
            constructor: None,
            write_supported: true,
            declared_chunks: Vec::new(),
            declared_header_chunks: Vec::new(),
            ancestors: Vec::new(),
            chunks: IndexMap::new(),
            header_chunks: IndexMap::new(),
        }
    }

    pub fn inherits(mut self, parent: u32) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn extension(mut self, extension: &'static str) -> Self {
        self.extension = Some(extension);
        self
    }

    /// Make the class instantiable with `T` as its node data.
    pub fn concrete<T: Class + Default>(mut self) -> Self {
        self.constructor = Some(make_class::<T>);
        self
    }

    pub fn chunk(mut self, chunk: ChunkDescriptor) -> Self {
        self.declared_chunks.push(chunk);
        self
    }

    pub fn header_chunk(mut self, chunk: ChunkDescriptor) -> Self {
        self.declared_header_chunks.push(chunk);
        self
    }

    pub fn write_not_supported(mut self) -> Self {
        self.write_supported = false;
        self
    }

    pub fn is_concrete(&self) -> bool {
        self.constructor.is_some()
    }

    pub fn is_write_supported(&self) -> bool {
        self.write_supported
    }

    /// Ancestor chain, nearest parent first.
    pub fn ancestors(&self) -> &[u32] {
        &self.ancestors
    }

    /// Body chunks including inherited ones, ancestors first.
    pub fn chunks(&self) -> impl Iterator<Item = &ChunkDescriptor> {
        self.chunks.values()
    }

    /// Header chunks including inherited ones, ancestors first.
    pub fn header_chunks(&self) -> impl Iterator<Item = &ChunkDescriptor> {
        self.header_chunks.values()
    }

    pub fn chunk_descriptor(&self, id: u32) -> Option<&ChunkDescriptor> {
        self.chunks.get(&id)
    }

    pub fn header_chunk_descriptor(&self, id: u32) -> Option<&ChunkDescriptor> {
        self.header_chunks.get(&id)
    }
}

/// Collects classes and remaps, then validates them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    classes: Vec<ClassDescriptor>,
    remaps: Vec<(u32, u32)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: ClassDescriptor) -> Self {
        self.classes.push(class);
        self
    }

    /// Declare that `legacy` files name the `canonical` class family.
    pub fn remap(mut self, legacy: u32, canonical: u32) -> Self {
        self.remaps.push((legacy, canonical));
        self
    }

    pub fn build(self) -> Result<Registry> {
        let remap = RemapTable::from_pairs(self.remaps)?;

        let mut classes: HashMap<u32, ClassDescriptor> = HashMap::new();
        let mut chunk_owner: HashMap<u32, u32> = HashMap::new();
        let mut not_remapped = HashSet::new();

        for class in self.classes {
            if family(class.id) != class.id {
                return Err(invalid(format!(
                    "class id 0x{:08X} ({}) has chunk index bits set",
                    class.id, class.name
                )));
            }
            for chunk in class.declared_chunks.iter().chain(&class.declared_header_chunks) {
                if family(chunk.id) != class.id {
                    return Err(invalid(format!(
                        "chunk 0x{:08X} declared on class 0x{:08X} ({}) belongs to another family",
                        chunk.id, class.id, class.name
                    )));
                }
                if chunk_owner.insert(chunk.id, class.id).is_some() {
                    return Err(invalid(format!("chunk 0x{:08X} declared twice", chunk.id)));
                }
                if chunk.not_remapped {
                    not_remapped.insert(chunk.id);
                }
            }
            if let Some(existing) = classes.insert(class.id, class) {
                return Err(invalid(format!(
                    "class 0x{:08X} ({}) declared twice",
                    existing.id, existing.name
                )));
            }
        }

        let mut resolved: HashMap<u32, (Vec<u32>, IndexMap<u32, ChunkDescriptor>, IndexMap<u32, ChunkDescriptor>)> =
            HashMap::new();
        for (&id, class) in &classes {
            let mut ancestors = Vec::new();
            let mut next = class.parent;
            while let Some(parent_id) = next {
                if parent_id == id || ancestors.contains(&parent_id) {
                    return Err(invalid(format!(
                        "class 0x{id:08X} ({}) inherits from itself",
                        class.name
                    )));
                }
                let parent = classes.get(&parent_id).ok_or_else(|| {
                    invalid(format!(
                        "class 0x{id:08X} ({}) inherits from unknown class 0x{parent_id:08X}",
                        class.name
                    ))
                })?;
                ancestors.push(parent_id);
                next = parent.parent;
            }

            let mut chunks = IndexMap::new();
            let mut header_chunks = IndexMap::new();
            for owner in ancestors.iter().rev().chain(std::iter::once(&id)) {
                let owner = &classes[owner];
                for chunk in &owner.declared_chunks {
                    chunks.insert(chunk.id, chunk.clone());
                }
                for chunk in &owner.declared_header_chunks {
                    header_chunks.insert(chunk.id, chunk.clone());
                }
            }
            resolved.insert(id, (ancestors, chunks, header_chunks));
        }

        for (id, (ancestors, chunks, header_chunks)) in resolved {
            if let Some(class) = classes.get_mut(&id) {
                class.ancestors = ancestors;
                class.chunks = chunks;
                class.header_chunks = header_chunks;
            }
        }

        tracing::debug!(
            classes = classes.len(),
            chunks = chunk_owner.len(),
            remaps = remap.len(),
            "built class registry"
        );

        Ok(Registry {
            classes,
            remap,
            not_remapped,
        })
    }
}

fn invalid(message: String) -> Error {
    Error::InvalidRegistry { message }
}

/// Immutable class/chunk lookup shared by every read and write.
#[derive(Debug)]
pub struct Registry {
    classes: HashMap<u32, ClassDescriptor>,
    remap: RemapTable,
    not_remapped: HashSet<u32>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn resolve_class(&self, class_id: u32) -> Option<&ClassDescriptor> {
        self.classes.get(&class_id)
    }

    pub fn class_name(&self, class_id: u32) -> Option<&'static str> {
        self.resolve_class(class_id).map(|c| c.name)
    }

    /// File type suffix of files rooted at `class_id`.
    pub fn class_extension(&self, class_id: u32) -> Option<&'static str> {
        self.resolve_class(class_id).and_then(|c| c.extension)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.values()
    }

    /// Empty node of a concrete class.
    pub fn construct_instance(&self, class_id: u32) -> Result<Node> {
        let constructor = self
            .resolve_class(class_id)
            .and_then(|c| c.constructor)
            .ok_or(Error::ClassNotConstructible { class_id })?;
        Ok(Node::new(class_id, constructor()))
    }

    /// Node with every writable chunk of the class attached, ancestors first
    /// and header chunks before body chunks.
    pub fn construct_populated(&self, class_id: u32) -> Result<Node> {
        let mut node = self.construct_instance(class_id)?;
        let class = self
            .resolve_class(class_id)
            .ok_or(Error::ClassNotConstructible { class_id })?;
        for descriptor in class.header_chunks() {
            let mut chunk = descriptor.instantiate();
            chunk.header = true;
            chunk.skippable = false;
            if is_typed_writer(&chunk) {
                node.chunks.attach(chunk);
            }
        }
        for descriptor in class.chunks() {
            let chunk = descriptor.instantiate();
            if is_typed_writer(&chunk) {
                node.chunks.attach(chunk);
            }
        }
        Ok(node)
    }

    /// Body chunk instance for `chunk_id` in the context of `class_id`.
    pub fn construct_chunk(&self, class_id: u32, chunk_id: u32) -> Option<Chunk> {
        self.resolve_class(class_id)?
            .chunk_descriptor(chunk_id)
            .map(ChunkDescriptor::instantiate)
    }

    /// Header chunk instance for `chunk_id` in the context of `class_id`.
    pub fn construct_header_chunk(&self, class_id: u32, chunk_id: u32) -> Option<Chunk> {
        let descriptor = self.resolve_class(class_id)?.header_chunk_descriptor(chunk_id)?;
        let mut chunk = descriptor.instantiate();
        chunk.header = true;
        chunk.skippable = false;
        Some(chunk)
    }

    /// Whether `id` takes part in legacy numbering translation.
    pub fn is_remapped(&self, id: u32) -> bool {
        !self.not_remapped.contains(&id)
    }

    pub fn wrap(&self, id: u32) -> u32 {
        self.remap.wrap(id)
    }

    pub fn unwrap(&self, id: u32) -> u32 {
        self.remap.unwrap(id)
    }

    /// Classes the registry knows nothing about are written back as-is.
    pub fn is_write_supported(&self, class_id: u32) -> bool {
        self.resolve_class(class_id)
            .map_or(true, ClassDescriptor::is_write_supported)
    }
}

fn is_typed_writer(chunk: &Chunk) -> bool {
    matches!(chunk.kind, ChunkKind::WriteOnly(_) | ChunkKind::ReadWrite(_))
}
