//! Game-level classes: collectors, items and maps.

use crate::archive::ReaderWriter;
use crate::chunk::{node_data, Class, ReadWriteChunk};
use crate::error::Result;
use crate::id::Ident;
use crate::node::NodeRef;
use crate::registry::{ChunkDescriptor, ClassDescriptor};
use crate::version::GameVersion;

use super::mw::CMW_NOD;

pub const CGAME_CTN_COLLECTOR: u32 = 0x2E00_1000;
pub const CGAME_ITEM_MODEL: u32 = 0x2E00_2000;
pub const CGAME_CTN_CHALLENGE: u32 = 0x0304_3000;
pub const CGAME_CTN_CHALLENGE_PARAMETERS: u32 = 0x0305_B000;

const COLLECTOR_DESCRIPTION: u32 = 0x2E00_1003;
const COLLECTOR_ICON: u32 = 0x2E00_1004;
const COLLECTOR_IDENT: u32 = 0x2E00_100B;
const COLLECTOR_NAME: u32 = 0x2E00_100C;
const COLLECTOR_SKIN: u32 = 0x2E00_1012;

const ITEM_SKINS: u32 = 0x2E00_2008;
const ITEM_TYPE: u32 = 0x2E00_2015;
const ITEM_ENTITY: u32 = 0x2E00_2019;

const CHALLENGE_DESCRIPTION: u32 = 0x0304_3003;
const CHALLENGE_VEHICLE: u32 = 0x0304_300D;
const CHALLENGE_PARAMETERS: u32 = 0x0304_3011;
const CHALLENGE_LAPS: u32 = 0x0304_3018;

const PARAMETERS_TIPS: u32 = 0x0305_B001;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Icon {
    pub width: u16,
    pub height: u16,
    /// RGBA, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

/// Anything that shows up in the editor catalog.
#[derive(Debug, Clone, Default)]
pub struct CGameCtnCollector {
    pub ident: Ident,
    pub page_name: String,
    pub product_state: i32,
    pub catalog_position: u32,
    pub name: String,
    pub icon: Icon,
}

impl Class for CGameCtnCollector {}

#[derive(Debug, Clone, Default)]
pub struct CGameItemModel {
    pub collector: CGameCtnCollector,
    pub skins: Vec<String>,
    pub item_type: u32,
    pub entity_model: Option<NodeRef>,
    pub waypoint: bool,
}

impl Class for CGameItemModel {
    fn parent(&self) -> Option<&dyn Class> {
        Some(&self.collector)
    }

    fn parent_mut(&mut self) -> Option<&mut dyn Class> {
        Some(&mut self.collector)
    }
}

/// A map.
#[derive(Debug, Clone, Default)]
pub struct CGameCtnChallenge {
    pub map_info: Ident,
    pub map_name: String,
    pub kind: u8,
    pub locked: bool,
    pub vehicle: Ident,
    pub parameters: Option<NodeRef>,
    pub map_kind: u32,
    pub lapped: bool,
    pub lap_count: u32,
}

impl Class for CGameCtnChallenge {}

#[derive(Debug, Clone, Default)]
pub struct CGameCtnChallengeParameters {
    pub tips: [String; 4],
}

impl Class for CGameCtnChallengeParameters {}

#[derive(Debug, Clone)]
pub struct CollectorDescription {
    pub version: i32,
}

impl Default for CollectorDescription {
    fn default() -> Self {
        Self { version: 7 }
    }
}

impl ReadWriteChunk for CollectorDescription {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        let collector = node_data::<CGameCtnCollector>(node, COLLECTOR_DESCRIPTION)?;
        rw.ident(&mut collector.ident)?;
        rw.version_i32(&mut self.version)?;
        rw.string(&mut collector.page_name)?;
        if self.version >= 3 {
            rw.i32(&mut collector.product_state)?;
        }
        if self.version >= 5 {
            rw.u32(&mut collector.catalog_position)?;
        }
        if self.version >= 7 {
            rw.string(&mut collector.name)?;
        }
        Ok(())
    }

    fn version(&self) -> Option<i32> {
        Some(self.version)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectorIcon;

impl ReadWriteChunk for CollectorIcon {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        let icon = &mut node_data::<CGameCtnCollector>(node, COLLECTOR_ICON)?.icon;
        rw.u16(&mut icon.width)?;
        rw.u16(&mut icon.height)?;
        let len = usize::from(icon.width) * usize::from(icon.height) * 4;
        rw.bytes(&mut icon.pixels, len)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectorIdent;

impl ReadWriteChunk for CollectorIdent {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        rw.ident(&mut node_data::<CGameCtnCollector>(node, COLLECTOR_IDENT)?.ident)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectorName;

impl ReadWriteChunk for CollectorName {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        rw.string(&mut node_data::<CGameCtnCollector>(node, COLLECTOR_NAME)?.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemSkins;

impl ReadWriteChunk for ItemSkins {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        let item = node_data::<CGameItemModel>(node, ITEM_SKINS)?;
        rw.list(&mut item.skins, |rw, skin| rw.string(skin))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ItemType;

impl ReadWriteChunk for ItemType {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        rw.u32(&mut node_data::<CGameItemModel>(node, ITEM_TYPE)?.item_type)
    }
}

#[derive(Debug, Clone)]
pub struct ItemEntity {
    pub version: i32,
}

impl Default for ItemEntity {
    fn default() -> Self {
        Self { version: 3 }
    }
}

impl ReadWriteChunk for ItemEntity {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        let item = node_data::<CGameItemModel>(node, ITEM_ENTITY)?;
        rw.version_i32(&mut self.version)?;
        rw.node_ref(&mut item.entity_model)?;
        if self.version >= 3 {
            rw.bool(&mut item.waypoint)?;
        }
        Ok(())
    }

    fn version(&self) -> Option<i32> {
        Some(self.version)
    }
}

#[derive(Debug, Clone)]
pub struct ChallengeDescription {
    pub version: u8,
}

impl Default for ChallengeDescription {
    fn default() -> Self {
        Self { version: 1 }
    }
}

impl ReadWriteChunk for ChallengeDescription {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        let map = node_data::<CGameCtnChallenge>(node, CHALLENGE_DESCRIPTION)?;
        rw.version_u8(&mut self.version)?;
        rw.ident(&mut map.map_info)?;
        rw.string(&mut map.map_name)?;
        rw.u8(&mut map.kind)?;
        if self.version >= 1 {
            rw.bool(&mut map.locked)?;
        }
        Ok(())
    }

    fn version(&self) -> Option<i32> {
        Some(i32::from(self.version))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChallengeVehicle;

impl ReadWriteChunk for ChallengeVehicle {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        rw.ident(&mut node_data::<CGameCtnChallenge>(node, CHALLENGE_VEHICLE)?.vehicle)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChallengeParameters;

impl ReadWriteChunk for ChallengeParameters {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        let map = node_data::<CGameCtnChallenge>(node, CHALLENGE_PARAMETERS)?;
        rw.node_ref(&mut map.parameters)?;
        rw.u32(&mut map.map_kind)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChallengeLaps;

impl ReadWriteChunk for ChallengeLaps {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        let map = node_data::<CGameCtnChallenge>(node, CHALLENGE_LAPS)?;
        rw.bool(&mut map.lapped)?;
        rw.u32(&mut map.lap_count)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParametersTips;

impl ReadWriteChunk for ParametersTips {
    fn read_write(&mut self, node: &mut dyn Class, rw: &mut ReaderWriter<'_, '_>) -> Result<()> {
        let parameters = node_data::<CGameCtnChallengeParameters>(node, PARAMETERS_TIPS)?;
        for tip in &mut parameters.tips {
            rw.string(tip)?;
        }
        Ok(())
    }
}

pub fn classes() -> Vec<ClassDescriptor> {
    let tm2 = GameVersion::MP1 | GameVersion::MP2 | GameVersion::MP3 | GameVersion::MP4;
    vec![
        ClassDescriptor::new(CGAME_CTN_COLLECTOR, "CGameCtnCollector")
            .inherits(CMW_NOD)
            .header_chunk(ChunkDescriptor::read_write::<CollectorDescription>(COLLECTOR_DESCRIPTION))
            .header_chunk(ChunkDescriptor::read_write::<CollectorIcon>(COLLECTOR_ICON).heavy())
            .chunk(ChunkDescriptor::read_write::<CollectorIdent>(COLLECTOR_IDENT))
            .chunk(ChunkDescriptor::read_write::<CollectorName>(COLLECTOR_NAME))
            .chunk(ChunkDescriptor::opaque(COLLECTOR_SKIN)),
        ClassDescriptor::new(CGAME_ITEM_MODEL, "CGameItemModel")
            .extension("Item")
            .inherits(CGAME_CTN_COLLECTOR)
            .concrete::<CGameItemModel>()
            .chunk(ChunkDescriptor::read_write::<ItemSkins>(ITEM_SKINS))
            .chunk(
                ChunkDescriptor::read_write::<ItemType>(ITEM_TYPE)
                    .skippable()
                    .game_version(tm2 | GameVersion::TM2020),
            )
            .chunk(
                ChunkDescriptor::read_write::<ItemEntity>(ITEM_ENTITY)
                    .skippable()
                    .game_version(GameVersion::MP4 | GameVersion::TM2020),
            ),
        ClassDescriptor::new(CGAME_CTN_CHALLENGE, "CGameCtnChallenge")
            .extension("Map")
            .inherits(CMW_NOD)
            .concrete::<CGameCtnChallenge>()
            .header_chunk(ChunkDescriptor::read_write::<ChallengeDescription>(CHALLENGE_DESCRIPTION))
            .chunk(ChunkDescriptor::read_write::<ChallengeVehicle>(CHALLENGE_VEHICLE))
            .chunk(ChunkDescriptor::read_write::<ChallengeParameters>(CHALLENGE_PARAMETERS))
            .chunk(ChunkDescriptor::read_write::<ChallengeLaps>(CHALLENGE_LAPS).skippable()),
        ClassDescriptor::new(CGAME_CTN_CHALLENGE_PARAMETERS, "CGameCtnChallengeParameters")
            .inherits(CMW_NOD)
            .concrete::<CGameCtnChallengeParameters>()
            .chunk(ChunkDescriptor::read_write::<ParametersTips>(PARAMETERS_TIPS)),
    ]
}
