use crate::chunk::{find_class, find_class_mut, ChunkSet, Class};
use crate::version::GameVersion;

/// A decoded object: its typed data plus every chunk attached to it.
///
/// Cloning is deep. The clone owns its own data and its own copy of every
/// chunk, opaque payloads included.
#[derive(Debug, Clone)]
pub struct Node {
    pub class_id: u32,
    pub data: Box<dyn Class>,
    pub chunks: ChunkSet,
}

impl Node {
    pub fn new(class_id: u32, data: Box<dyn Class>) -> Self {
        Self {
            class_id,
            data,
            chunks: ChunkSet::new(),
        }
    }

    /// Typed data, searching embedded ancestors too.
    pub fn get<T: Class>(&self) -> Option<&T> {
        find_class::<T>(self.data.as_ref())
    }

    pub fn get_mut<T: Class>(&mut self) -> Option<&mut T> {
        find_class_mut::<T>(self.data.as_mut())
    }

    /// Borrow data and chunks at the same time, for chunk dispatch.
    pub fn split_mut(&mut self) -> (&mut dyn Class, &mut ChunkSet) {
        (self.data.as_mut(), &mut self.chunks)
    }

    /// Releases every attached chunk agrees on. Chunks without a declared
    /// version do not narrow the result.
    pub fn game_version(&self) -> GameVersion {
        self.chunks
            .iter()
            .map(|c| c.game_version)
            .filter(|v| !v.is_unspecified())
            .reduce(|acc, v| acc & v)
            .unwrap_or(GameVersion::UNSPECIFIED)
    }
}

/// Reference from a chunk to another node.
#[derive(Debug, Clone)]
pub enum NodeRef {
    /// Node stored inline in the body.
    Internal(Box<Node>),
    /// Node living in another file, by reference-table index.
    External(u32),
}

impl NodeRef {
    pub fn node(&self) -> Option<&Node> {
        match self {
            NodeRef::Internal(node) => Some(&**node),
            NodeRef::External(_) => None,
        }
    }

    pub fn node_mut(&mut self) -> Option<&mut Node> {
        match self {
            NodeRef::Internal(node) => Some(&mut **node),
            NodeRef::External(_) => None,
        }
    }
}
