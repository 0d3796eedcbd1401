use crate::archive::ReaderWriter;
use crate::chunk::{node_data, Class, ReadWriteChunk};
use crate::error::Result;
use crate::id::Id;
use crate::registry::{ChunkDescriptor, ClassDescriptor};
use crate::version::GameVersion;

use super::mw::CMW_NOD;

pub const CPLUG_SURFACE: u32 = 0x0900_C000;
const SURFACE_MATERIALS: u32 = 0x0900_C003;

/// Collision surface.
#[derive(Debug, Clone, Default)]
pub struct CPlugSurface {
    pub materials: Vec<Id>,
    pub skin: Option<String>,
}

impl Class for CPlugSurface {}

#[derive(Debug, Clone)]
pub struct SurfaceMaterials {
    pub version: i32,
}

impl Default for SurfaceMaterials {
    fn default() -> Self {
        Self { version: 2 }
    }
}

impl ReadWriteChunk for SurfaceMaterials {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        let surface = node_data::<CPlugSurface>(node, SURFACE_MATERIALS)?;
        rw.version_i32(&mut self.version)?;
        rw.list(&mut surface.materials, |rw, id| rw.id(id))?;
        if self.version >= 2 {
            let mut has_skin = surface.skin.is_some();
            rw.bool(&mut has_skin)?;
            if has_skin {
                let skin = surface.skin.get_or_insert_with(String::new);
                rw.string(skin)?;
            } else {
                surface.skin = None;
            }
        }
        Ok(())
    }

    fn version(&self) -> Option<i32> {
        Some(self.version)
    }
}

pub fn classes() -> Vec<ClassDescriptor> {
    vec![ClassDescriptor::new(CPLUG_SURFACE, "CPlugSurface")
        .inherits(CMW_NOD)
        .concrete::<CPlugSurface>()
        .chunk(
            ChunkDescriptor::read_write::<SurfaceMaterials>(SURFACE_MATERIALS)
                .game_version(GameVersion::MP3 | GameVersion::MP4 | GameVersion::TM2020),
        )]
}
