//! Lookback identifiers.
//!
//! Names inside chunk payloads are interned per table: the first occurrence
//! carries the string, later ones refer back to it by position. Each header
//! chunk starts a fresh table; the body shares one table across all nodes.
//!
//! A string reference may carry either of the two top flag bits. Both read
//! the same way, but writing always uses `0x40000000`, so a file that used
//! `0x80000000` comes back with the other flag and is not byte-identical.

use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, Writer};
use crate::error::{Error, Result};

const TABLE_VERSION: u32 = 3;
const EMPTY: u32 = 0xFFFF_FFFF;
const STRING_FLAGS: u32 = 0xC000_0000;
const NEW_STRING: u32 = 0x4000_0000;
const INDEX_MASK: u32 = 0x3FFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Id {
    #[default]
    Empty,
    Name(String),
    Number(u32),
}

impl Id {
    pub fn name(name: impl Into<String>) -> Self {
        Id::Name(name.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Id::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Id::Empty => Ok(()),
            Id::Name(name) => write!(f, "{name}"),
            Id::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Asset identity: name, collection (environment), author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Ident {
    pub id: Id,
    pub collection: Id,
    pub author: Id,
}

impl Ident {
    pub fn new(id: impl Into<String>, collection: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: Id::name(id),
            collection: Id::name(collection),
            author: Id::name(author),
        }
    }
}

/// One lookback string table.
#[derive(Debug, Clone, Default)]
pub struct IdTable {
    version_seen: bool,
    names: Vec<String>,
}

impl IdTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.version_seen = false;
        self.names.clear();
    }

    pub fn read(&mut self, c: &mut Cursor<'_>) -> Result<Id> {
        if !self.version_seen {
            let version = c.read_u32()?;
            if version != TABLE_VERSION {
                return Err(Error::InvalidIdVersion { version });
            }
            self.version_seen = true;
        }

        let raw = c.read_u32()?;
        if raw == EMPTY {
            return Ok(Id::Empty);
        }
        if raw & STRING_FLAGS == 0 {
            return Ok(Id::Number(raw));
        }
        let index = raw & INDEX_MASK;
        if index == 0 {
            let name = c.read_string()?;
            self.names.push(name.clone());
            return Ok(Id::Name(name));
        }
        self.names
            .get(index as usize - 1)
            .cloned()
            .map(Id::Name)
            .ok_or(Error::InvalidIdIndex { index: raw })
    }

    pub fn write(&mut self, w: &mut Writer, id: &Id) -> Result<()> {
        if !self.version_seen {
            w.write_u32(TABLE_VERSION);
            self.version_seen = true;
        }

        match id {
            Id::Empty => w.write_u32(EMPTY),
            Id::Number(n) => w.write_u32(*n),
            Id::Name(name) => match self.names.iter().position(|n| n == name) {
                Some(at) => {
                    let index = u32::try_from(at + 1)
                        .ok()
                        .filter(|i| *i <= INDEX_MASK)
                        .ok_or(Error::LengthOverflow { len: at + 1 })?;
                    w.write_u32(NEW_STRING | index);
                }
                None => {
                    w.write_u32(NEW_STRING);
                    w.write_string(name)?;
                    self.names.push(name.clone());
                }
            },
        }
        Ok(())
    }
}
