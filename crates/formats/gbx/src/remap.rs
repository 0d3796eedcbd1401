//! Translation between legacy and canonical class/chunk identifiers.
//!
//! Older games numbered their classes differently. Files written by them carry
//! the old ("wrapped") identifiers; everything above this module works with
//! the latest ("unwrapped") numbering. The table maps whole class families;
//! the low 12 chunk-index bits of an identifier pass through unchanged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::Registry;

/// Top 20 bits of an identifier: the owning class.
pub const FAMILY_MASK: u32 = 0xFFFF_F000;

/// Collector class family as numbered by the 2008 game edition.
pub const LEGACY_COLLECTOR_FAMILY: u32 = 0x0301_A000;

/// Collector class family in the latest numbering.
pub const COLLECTOR_FAMILY: u32 = 0x2E00_1000;

/// Class family (owning class identifier) of a chunk identifier.
pub fn family(id: u32) -> u32 {
    id & FAMILY_MASK
}

/// Which historical numbering a stream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Epoch {
    #[default]
    Latest,
    Epoch2006,
    Epoch2008,
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Epoch::Latest => write!(f, "latest"),
            Epoch::Epoch2006 => write!(f, "2006"),
            Epoch::Epoch2008 => write!(f, "2008"),
        }
    }
}

/// Mapping between wrapped (legacy) and unwrapped (canonical) class families.
#[derive(Debug, Clone, Default)]
pub struct RemapTable {
    unwrapped: HashMap<u32, u32>,
    wrapped: HashMap<u32, u32>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(legacy, canonical)` family pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, u32)>) -> Result<Self> {
        let mut table = Self::new();
        for (legacy, canonical) in pairs {
            table.insert(legacy, canonical)?;
        }
        Ok(table)
    }

    /// Add a `legacy -> canonical` pair. Both sides must be class families and
    /// neither may already be mapped.
    ///
    /// Chains collapse: after `A -> B` and `B -> C` (in either order) both `A`
    /// and `B` wrap straight to `C`. Unwrapping goes back one step, so `C`
    /// unwraps to `B` and `B` to `A`.
    pub fn insert(&mut self, legacy: u32, canonical: u32) -> Result<()> {
        if family(legacy) != legacy || family(canonical) != canonical {
            return Err(Error::InvalidRegistry {
                message: format!(
                    "remap 0x{legacy:08X} -> 0x{canonical:08X} must map class families"
                ),
            });
        }
        if self.unwrapped.contains_key(&legacy) || self.wrapped.contains_key(&canonical) {
            return Err(Error::InvalidRegistry {
                message: format!(
                    "remap 0x{legacy:08X} -> 0x{canonical:08X} overlaps an existing entry"
                ),
            });
        }
        let target = self.unwrapped.get(&canonical).copied().unwrap_or(canonical);
        if target == legacy {
            return Err(Error::InvalidRegistry {
                message: format!("remap 0x{legacy:08X} -> 0x{canonical:08X} closes a cycle"),
            });
        }
        for resolved in self.unwrapped.values_mut() {
            if *resolved == legacy {
                *resolved = target;
            }
        }
        self.unwrapped.insert(legacy, target);
        self.wrapped.insert(canonical, legacy);
        Ok(())
    }

    /// Legacy identifier to canonical. Unmapped identifiers are returned as-is.
    pub fn wrap(&self, id: u32) -> u32 {
        match self.unwrapped.get(&family(id)) {
            Some(canonical) => canonical | (id & !FAMILY_MASK),
            None => id,
        }
    }

    /// Canonical identifier to legacy. Unmapped identifiers are returned as-is.
    pub fn unwrap(&self, id: u32) -> u32 {
        match self.wrapped.get(&family(id)) {
            Some(legacy) => legacy | (id & !FAMILY_MASK),
            None => id,
        }
    }

    /// Whether `id` belongs to a legacy family that has a canonical counterpart.
    pub fn is_wrapped(&self, id: u32) -> bool {
        self.unwrapped.contains_key(&family(id))
    }

    pub fn len(&self) -> usize {
        self.unwrapped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unwrapped.is_empty()
    }
}

/// Epoch state of one read or write operation. Never shared between streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemapSession {
    epoch: Epoch,
}

impl RemapSession {
    pub fn new(epoch: Epoch) -> Self {
        Self { epoch }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Record that a legacy identifier was seen.
    ///
    /// The legacy collector family selects the 2008 epoch, anything else the
    /// 2006 one. Once in 2008 the session stays there.
    pub fn select_epoch(&mut self, legacy_id: u32) {
        if self.epoch == Epoch::Epoch2008 {
            return;
        }
        self.epoch = if family(legacy_id) == LEGACY_COLLECTOR_FAMILY {
            Epoch::Epoch2008
        } else {
            Epoch::Epoch2006
        };
    }

    /// Canonical identifier for an identifier read from the wire.
    pub fn read_id(&mut self, registry: &Registry, raw: u32) -> u32 {
        if !registry.is_remapped(raw) {
            return raw;
        }
        let id = registry.wrap(raw);
        if id != raw {
            self.select_epoch(raw);
        }
        id
    }

    /// Identifier to put on the wire for a canonical identifier.
    pub fn write_id(&self, registry: &Registry, id: u32) -> u32 {
        match self.epoch {
            Epoch::Latest => id,
            Epoch::Epoch2008 if family(id) == COLLECTOR_FAMILY => {
                LEGACY_COLLECTOR_FAMILY | (id & !FAMILY_MASK)
            }
            _ if !registry.is_remapped(id) => id,
            _ => registry.unwrap(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::builder()
            .remap(0x2400_3000, 0x0304_3000)
            .remap(LEGACY_COLLECTOR_FAMILY, COLLECTOR_FAMILY)
            .build()
            .unwrap()
    }

    #[test]
    fn table_maps_families_both_ways() {
        let table = RemapTable::from_pairs([(0x2400_3000, 0x0304_3000)]).unwrap();
        assert_eq!(table.wrap(0x2400_300D), 0x0304_300D);
        assert_eq!(table.unwrap(0x0304_300D), 0x2400_300D);
        assert_eq!(table.wrap(0x0304_300D), 0x0304_300D);
        assert!(table.is_wrapped(0x2400_3002));
        assert!(!table.is_wrapped(0x0304_3002));
    }

    #[test]
    fn table_rejects_overlap() {
        let mut table = RemapTable::new();
        table.insert(0x2400_3000, 0x0304_3000).unwrap();
        assert!(table.insert(0x2400_3000, 0x0305_B000).is_err());
        assert!(table.insert(0x2400_C000, 0x0304_3000).is_err());
        assert!(table.insert(0x2400_C001, 0x0305_B000).is_err());
    }

    #[test]
    fn chained_families_resolve_to_the_last_one() {
        for pairs in [
            [(0x0A00_1000, 0x2400_3000), (0x2400_3000, 0x0304_3000)],
            [(0x2400_3000, 0x0304_3000), (0x0A00_1000, 0x2400_3000)],
        ] {
            let table = RemapTable::from_pairs(pairs).unwrap();
            assert_eq!(table.wrap(0x0A00_100D), 0x0304_300D);
            assert_eq!(table.wrap(0x2400_300D), 0x0304_300D);
            assert_eq!(table.unwrap(0x0304_300D), 0x2400_300D);
            assert_eq!(table.unwrap(0x2400_300D), 0x0A00_100D);
        }
    }

    #[test]
    fn table_rejects_cycles() {
        let mut table = RemapTable::new();
        table.insert(0x2400_3000, 0x0304_3000).unwrap();
        assert!(table.insert(0x0304_3000, 0x2400_3000).is_err());
    }

    #[test]
    fn collector_family_selects_2008_and_sticks() {
        let registry = registry();
        let mut session = RemapSession::default();

        assert_eq!(session.read_id(&registry, 0x0301_A00C), 0x2E00_100C);
        assert_eq!(session.epoch(), Epoch::Epoch2008);

        assert_eq!(session.read_id(&registry, 0x2400_300D), 0x0304_300D);
        assert_eq!(session.epoch(), Epoch::Epoch2008);
    }

    #[test]
    fn generic_legacy_family_selects_2006() {
        let registry = registry();
        let mut session = RemapSession::default();
        session.read_id(&registry, 0x2400_300D);
        assert_eq!(session.epoch(), Epoch::Epoch2006);

        // 2006 can still be promoted to 2008.
        session.read_id(&registry, 0x0301_A003);
        assert_eq!(session.epoch(), Epoch::Epoch2008);
    }

    #[test]
    fn canonical_ids_leave_epoch_alone() {
        let registry = registry();
        let mut session = RemapSession::default();
        assert_eq!(session.read_id(&registry, 0x0304_300D), 0x0304_300D);
        assert_eq!(session.epoch(), Epoch::Latest);
    }

    #[test]
    fn write_mirrors_epoch() {
        let registry = registry();

        let latest = RemapSession::new(Epoch::Latest);
        assert_eq!(latest.write_id(&registry, 0x0304_300D), 0x0304_300D);

        let old = RemapSession::new(Epoch::Epoch2006);
        assert_eq!(old.write_id(&registry, 0x0304_300D), 0x2400_300D);

        let tmf = RemapSession::new(Epoch::Epoch2008);
        assert_eq!(tmf.write_id(&registry, 0x2E00_1003), 0x0301_A003);
        assert_eq!(tmf.write_id(&registry, 0x0304_3000), 0x2400_3000);
    }
}
