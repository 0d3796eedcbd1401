//! Chunk capabilities and the attached-chunk collection of a node.
//!
//! A typed chunk implements exactly one of [`ReadChunk`], [`WriteChunk`] or
//! [`ReadWriteChunk`]. Chunks nobody implements are kept as raw bytes
//! ([`ChunkKind::Opaque`]) so they survive a round trip untouched.

use std::any::Any;
use std::fmt::Debug;

use crate::archive::ReaderWriter;
use crate::error::{Error, Result};
use crate::reader::GbxReader;
use crate::version::GameVersion;
use crate::writer::GbxWriter;

/// Type-erased access to a value, implemented for every `'static` type.
///
/// Call it on the trait object, not on the `Box` holding it.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Typed payload of a node.
///
/// Classes that extend another class embed the parent's data and expose it
/// through [`Class::parent_mut`], so chunks declared on an ancestor can reach
/// their fields from a derived node.
pub trait Class: AsAny + ClassClone + Debug + Send + Sync {
    fn parent(&self) -> Option<&dyn Class> {
        None
    }

    fn parent_mut(&mut self) -> Option<&mut dyn Class> {
        None
    }
}

pub trait ClassClone {
    fn clone_box(&self) -> Box<dyn Class>;
}

impl<T: Class + Clone> ClassClone for T {
    fn clone_box(&self) -> Box<dyn Class> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Class> {
    fn clone(&self) -> Self {
        (**self).clone_box()
    }
}

/// Find `T` in `node` or one of its embedded ancestors.
pub fn find_class<T: Class>(node: &dyn Class) -> Option<&T> {
    match (*node).as_any().downcast_ref::<T>() {
        Some(data) => Some(data),
        None => node.parent().and_then(find_class::<T>),
    }
}

/// Mutable variant of [`find_class`].
pub fn find_class_mut<T: Class>(node: &mut dyn Class) -> Option<&mut T> {
    if (*node).as_any().is::<T>() {
        return (*node).as_any_mut().downcast_mut::<T>();
    }
    node.parent_mut().and_then(find_class_mut::<T>)
}

/// Node data a chunk expects, or [`Error::NodeTypeMismatch`].
pub fn node_data<T: Class>(node: &mut dyn Class, chunk_id: u32) -> Result<&mut T> {
    find_class_mut::<T>(node).ok_or(Error::NodeTypeMismatch {
        chunk_id,
        expected: std::any::type_name::<T>(),
    })
}

/// Chunk that can only be decoded.
pub trait ReadChunk: AsAny + ReadChunkClone + Debug + Send + Sync {
    fn read(&mut self, node: &mut dyn Class, r: &mut GbxReader<'_>) -> Result<()>;

    /// Embedded layout version, when the chunk has one.
    fn version(&self) -> Option<i32> {
        None
    }
}

/// Chunk that can only be encoded.
pub trait WriteChunk: AsAny + WriteChunkClone + Debug + Send + Sync {
    fn write(&mut self, node: &mut dyn Class, w: &mut GbxWriter<'_>) -> Result<()>;

    fn version(&self) -> Option<i32> {
        None
    }
}

/// Chunk with a single description used for both directions.
pub trait ReadWriteChunk: AsAny + ReadWriteChunkClone + Debug + Send + Sync {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()>;

    fn version(&self) -> Option<i32> {
        None
    }
}

pub trait ReadChunkClone {
    fn clone_box(&self) -> Box<dyn ReadChunk>;
}

impl<T: ReadChunk + Clone> ReadChunkClone for T {
    fn clone_box(&self) -> Box<dyn ReadChunk> {
        Box::new(self.clone())
    }
}

pub trait WriteChunkClone {
    fn clone_box(&self) -> Box<dyn WriteChunk>;
}

impl<T: WriteChunk + Clone> WriteChunkClone for T {
    fn clone_box(&self) -> Box<dyn WriteChunk> {
        Box::new(self.clone())
    }
}

pub trait ReadWriteChunkClone {
    fn clone_box(&self) -> Box<dyn ReadWriteChunk>;
}

impl<T: ReadWriteChunk + Clone> ReadWriteChunkClone for T {
    fn clone_box(&self) -> Box<dyn ReadWriteChunk> {
        Box::new(self.clone())
    }
}

/// What a chunk instance is able to do.
#[derive(Debug)]
pub enum ChunkKind {
    ReadOnly(Box<dyn ReadChunk>),
    WriteOnly(Box<dyn WriteChunk>),
    ReadWrite(Box<dyn ReadWriteChunk>),
    /// Raw bytes only; the payload lives in [`Chunk::data`].
    Opaque,
}

impl Clone for ChunkKind {
    fn clone(&self) -> Self {
        match self {
            ChunkKind::ReadOnly(c) => ChunkKind::ReadOnly((**c).clone_box()),
            ChunkKind::WriteOnly(c) => ChunkKind::WriteOnly((**c).clone_box()),
            ChunkKind::ReadWrite(c) => ChunkKind::ReadWrite((**c).clone_box()),
            ChunkKind::Opaque => ChunkKind::Opaque,
        }
    }
}

impl ChunkKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChunkKind::ReadOnly(_) => "read-only",
            ChunkKind::WriteOnly(_) => "write-only",
            ChunkKind::ReadWrite(_) => "read-write",
            ChunkKind::Opaque => "opaque",
        }
    }
}

/// A chunk attached to a node.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Canonical (latest-numbering) chunk identifier.
    pub id: u32,
    /// Payload is wrapped in a skip marker and length prefix.
    pub skippable: bool,
    /// Keep the payload as raw bytes instead of decoding it.
    pub ignore: bool,
    /// Header metadata entry flagged as heavy.
    pub heavy: bool,
    /// Lives in the header metadata table rather than the body stream.
    pub header: bool,
    pub game_version: GameVersion,
    /// Raw payload. Set for opaque chunks and for typed chunks that were not decoded.
    pub data: Option<Vec<u8>>,
    pub kind: ChunkKind,
}

impl Chunk {
    pub fn new(id: u32, kind: ChunkKind) -> Self {
        Self {
            id,
            skippable: matches!(kind, ChunkKind::Opaque),
            ignore: false,
            heavy: false,
            header: false,
            game_version: GameVersion::UNSPECIFIED,
            data: None,
            kind,
        }
    }

    /// Skippable body chunk holding `data` verbatim.
    pub fn opaque(id: u32, data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            ..Self::new(id, ChunkKind::Opaque)
        }
    }

    /// Header metadata entry holding `data` verbatim.
    pub fn opaque_header(id: u32, data: Vec<u8>, heavy: bool) -> Self {
        Self {
            heavy,
            header: true,
            skippable: false,
            ..Self::opaque(id, data)
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.kind, ChunkKind::Opaque)
    }

    pub fn can_read(&self) -> bool {
        matches!(self.kind, ChunkKind::ReadOnly(_) | ChunkKind::ReadWrite(_))
    }

    pub fn can_write(&self) -> bool {
        self.data.is_some()
            || matches!(
                self.kind,
                ChunkKind::WriteOnly(_) | ChunkKind::ReadWrite(_) | ChunkKind::Opaque
            )
    }

    /// Layout version reported by the typed chunk, if any.
    pub fn version(&self) -> Option<i32> {
        match &self.kind {
            ChunkKind::ReadOnly(c) => c.version(),
            ChunkKind::WriteOnly(c) => c.version(),
            ChunkKind::ReadWrite(c) => c.version(),
            ChunkKind::Opaque => None,
        }
    }

    /// Typed chunk state, if it is a `T`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        let state: &dyn Any = match &self.kind {
            ChunkKind::ReadOnly(c) => (**c).as_any(),
            ChunkKind::WriteOnly(c) => (**c).as_any(),
            ChunkKind::ReadWrite(c) => (**c).as_any(),
            ChunkKind::Opaque => return None,
        };
        state.downcast_ref::<T>()
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        let state: &mut dyn Any = match &mut self.kind {
            ChunkKind::ReadOnly(c) => (**c).as_any_mut(),
            ChunkKind::WriteOnly(c) => (**c).as_any_mut(),
            ChunkKind::ReadWrite(c) => (**c).as_any_mut(),
            ChunkKind::Opaque => return None,
        };
        state.downcast_mut::<T>()
    }

    /// Decode the payload at the reader's position into `node`.
    pub fn read(&mut self, node: &mut dyn Class, r: &mut GbxReader<'_>) -> Result<()> {
        match &mut self.kind {
            ChunkKind::ReadOnly(c) => c.read(node, r),
            ChunkKind::ReadWrite(c) => c.read_write(node, &mut ReaderWriter::Reader(r)),
            ChunkKind::WriteOnly(_) | ChunkKind::Opaque => Err(Error::ChunkReadUnsupported {
                id: self.id,
                previous: None,
            }),
        }
    }

    /// Encode the payload. Raw data, when present, wins over the typed writer.
    pub fn write(&mut self, node: &mut dyn Class, w: &mut GbxWriter<'_>) -> Result<()> {
        if let Some(data) = &self.data {
            w.write_bytes(data);
            return Ok(());
        }
        match &mut self.kind {
            ChunkKind::WriteOnly(c) => c.write(node, w),
            ChunkKind::ReadWrite(c) => c.read_write(node, &mut ReaderWriter::Writer(w)),
            ChunkKind::Opaque => Ok(()),
            ChunkKind::ReadOnly(_) => Err(Error::ChunkWriteUnsupported { id: self.id }),
        }
    }
}

/// Ordered chunks of one node. Order is encounter order on read and
/// declaration order on construction.
#[derive(Debug, Clone, Default)]
pub struct ChunkSet(Vec<Chunk>);

impl ChunkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, chunk: Chunk) {
        self.0.push(chunk);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Chunk> {
        self.0.iter_mut()
    }

    pub fn header(&self) -> impl Iterator<Item = &Chunk> {
        self.0.iter().filter(|c| c.header)
    }

    pub fn body(&self) -> impl Iterator<Item = &Chunk> {
        self.0.iter().filter(|c| !c.header)
    }

    pub fn find(&self, id: u32) -> Option<&Chunk> {
        self.0.iter().find(|c| c.id == id)
    }

    pub fn find_mut(&mut self, id: u32) -> Option<&mut Chunk> {
        self.0.iter_mut().find(|c| c.id == id)
    }

    /// First typed chunk of type `T`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.0.iter().find_map(|c| c.get::<T>())
    }

    pub fn remove(&mut self, id: u32) -> Option<Chunk> {
        let at = self.0.iter().position(|c| c.id == id)?;
        Some(self.0.remove(at))
    }
}

impl<'s> IntoIterator for &'s ChunkSet {
    type Item = &'s Chunk;
    type IntoIter = std::slice::Iter<'s, Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Base {
        value: u32,
    }

    impl Class for Base {}

    #[derive(Debug, Clone, Default)]
    struct Derived {
        base: Base,
        extra: u32,
    }

    impl Class for Derived {
        fn parent(&self) -> Option<&dyn Class> {
            Some(&self.base)
        }

        fn parent_mut(&mut self) -> Option<&mut dyn Class> {
            Some(&mut self.base)
        }
    }

    #[test]
    fn ancestor_data_is_reachable() {
        let mut derived = Derived::default();
        node_data::<Base>(&mut derived, 0x0100_1000).unwrap().value = 7;
        node_data::<Derived>(&mut derived, 0x0100_1000).unwrap().extra = 9;
        assert_eq!(derived.base.value, 7);
        assert_eq!(find_class::<Derived>(&derived).unwrap().extra, 9);
    }

    #[test]
    fn boxed_node_downcasts_to_its_data() {
        let mut node: Box<dyn Class> = Box::new(Derived {
            base: Base { value: 1 },
            extra: 2,
        });
        node_data::<Derived>(node.as_mut(), 0x0100_1000).unwrap().extra = 5;
        node_data::<Base>(node.as_mut(), 0x0100_1000).unwrap().value = 6;
        let derived = find_class::<Derived>(node.as_ref()).unwrap();
        assert_eq!((derived.base.value, derived.extra), (6, 5));
    }

    #[test]
    fn wrong_node_type_is_reported() {
        let mut base = Base::default();
        let err = node_data::<Derived>(&mut base, 0x2E00_100B).unwrap_err();
        assert!(matches!(err, Error::NodeTypeMismatch { chunk_id: 0x2E00_100B, .. }));
    }

    #[test]
    fn opaque_chunk_clone_owns_its_bytes() {
        let original = Chunk::opaque(0xAAAA_0042, vec![0xAA, 0xBB, 0xCC]);
        let mut copy = original.clone();
        copy.data.as_mut().unwrap()[0] = 0;
        assert_eq!(original.data.as_deref(), Some(&[0xAA, 0xBB, 0xCC][..]));
        assert!(copy.skippable && copy.can_write() && !copy.can_read());
    }

    #[test]
    fn set_preserves_order() {
        let mut set = ChunkSet::new();
        set.attach(Chunk::opaque(2, vec![]));
        set.attach(Chunk::opaque_header(1, vec![], true));
        set.attach(Chunk::opaque(3, vec![]));
        let body: Vec<u32> = set.body().map(|c| c.id).collect();
        assert_eq!(body, [2, 3]);
        assert_eq!(set.remove(2).map(|c| c.id), Some(2));
        assert_eq!(set.iter().map(|c| c.id).collect::<Vec<_>>(), [1, 3]);
    }
}
