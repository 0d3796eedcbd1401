//! Engine root class.

use crate::archive::ReaderWriter;
use crate::chunk::{Class, ReadWriteChunk};
use crate::error::Result;
use crate::registry::{ChunkDescriptor, ClassDescriptor};

pub const CMW_NOD: u32 = 0x0100_1000;

/// Base of every class. Carries no data of its own.
#[derive(Debug, Clone, Default)]
pub struct CMwNod;

impl Class for CMwNod {}

/// Zero-length marker chunk.
#[derive(Debug, Clone, Default)]
pub struct MwNodMarker;

impl ReadWriteChunk for MwNodMarker {
    fn read_write(&mut self, _: &mut dyn Class, _: &mut ReaderWriter<'_, '_>) -> Result<()> {
        Ok(())
    }
}

pub fn classes() -> Vec<ClassDescriptor> {
    vec![ClassDescriptor::new(CMW_NOD, "CMwNod")
        .concrete::<CMwNod>()
        .chunk(ChunkDescriptor::read_write::<MwNodMarker>(CMW_NOD))]
}
