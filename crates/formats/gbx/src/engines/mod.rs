//! Built-in class population.
//!
//! Covers a handful of classes per engine, enough to decode common files
//! and to exercise every part of the codec. Callers with their own class
//! definitions build a registry from scratch or extend [`builder`].

pub mod game;
pub mod mw;
pub mod plug;

use crate::error::Result;
use crate::registry::{Registry, RegistryBuilder};
use crate::remap::{COLLECTOR_FAMILY, LEGACY_COLLECTOR_FAMILY};

/// Legacy class families and the class they were renumbered to.
pub const REMAPS: &[(u32, u32)] = &[
    // CGameCtnChallenge
    (0x2400_3000, 0x0304_3000),
    // CGameCtnChallengeParameters
    (0x2400_C000, 0x0305_B000),
    // CGameCtnBlockSkin
    (0x2401_B000, 0x0305_9000),
    // CGameCtnGhost
    (0x2403_A000, 0x0303_F000),
    // CGameCtnReplayRecord
    (0x2403_F000, 0x0309_3000),
    // CGameCtnCollector
    (LEGACY_COLLECTOR_FAMILY, COLLECTOR_FAMILY),
];

/// Builder preloaded with the built-in classes and remaps.
pub fn builder() -> RegistryBuilder {
    let mut builder = Registry::builder();
    for class in mw::classes()
        .into_iter()
        .chain(plug::classes())
        .chain(game::classes())
    {
        builder = builder.class(class);
    }
    for &(legacy, canonical) in REMAPS {
        builder = builder.remap(legacy, canonical);
    }
    builder
}

pub fn builtin() -> Result<Registry> {
    builder().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use game::*;

    #[test]
    fn builtin_registry_is_consistent() {
        let registry = builtin().unwrap();
        assert_eq!(registry.class_name(CGAME_ITEM_MODEL), Some("CGameItemModel"));
        assert_eq!(registry.class_extension(CGAME_CTN_CHALLENGE), Some("Map"));
        assert_eq!(registry.class_extension(CGAME_CTN_COLLECTOR), None);
        assert!(registry.classes().any(|c| c.extension == Some("Item")));
        assert!(!registry.resolve_class(CGAME_CTN_COLLECTOR).unwrap().is_concrete());
        assert_eq!(
            registry.resolve_class(CGAME_ITEM_MODEL).unwrap().ancestors(),
            &[CGAME_CTN_COLLECTOR, mw::CMW_NOD]
        );
        assert_eq!(registry.wrap(0x2400_300D), 0x0304_300D);
        assert_eq!(registry.unwrap(0x2E00_1003), 0x0301_A003);
    }

    #[test]
    fn collector_header_chunks_reach_item_data() {
        let registry = builtin().unwrap();
        let node = registry.construct_populated(CGAME_ITEM_MODEL).unwrap();
        let header: Vec<u32> = node.chunks.header().map(|c| c.id).collect();
        assert_eq!(header, [0x2E00_1003, 0x2E00_1004]);
        assert!(node.chunks.find(0x2E00_1004).unwrap().heavy);
        assert!(node.get::<CGameCtnCollector>().is_some());
    }
}
