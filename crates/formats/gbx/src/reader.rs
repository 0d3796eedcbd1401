use std::collections::HashSet;

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::id::{Id, IdTable, Ident};
use crate::node::NodeRef;
use crate::registry::Registry;
use crate::remap::{Epoch, RemapSession};
use crate::settings::ReadSettings;
use crate::stream;

/// Decoding context for one stream.
///
/// Owns the cursor, the remap session and the lookback table, and borrows the
/// registry and settings. Nothing in here is shared with other streams.
pub struct GbxReader<'a> {
    cursor: Cursor<'a>,
    registry: &'a Registry,
    settings: &'a ReadSettings,
    session: RemapSession,
    ids: IdTable,
    depth: usize,
    seen_nodes: HashSet<u32>,
    external_nodes: HashSet<u32>,
}

impl<'a> GbxReader<'a> {
    pub fn new(data: &'a [u8], registry: &'a Registry, settings: &'a ReadSettings) -> Self {
        Self {
            cursor: Cursor::new(data),
            registry,
            settings,
            session: RemapSession::default(),
            ids: IdTable::new(),
            depth: 0,
            seen_nodes: HashSet::new(),
            external_nodes: HashSet::new(),
        }
    }

    /// Carry epoch state over from another stream of the same file.
    pub fn with_session(mut self, session: RemapSession) -> Self {
        self.session = session;
        self
    }

    /// Node indices that resolve to reference-table entries.
    pub fn with_external_nodes(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.external_nodes = indices.into_iter().collect();
        self
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn settings(&self) -> &'a ReadSettings {
        self.settings
    }

    pub fn session(&self) -> RemapSession {
        self.session
    }

    pub fn epoch(&self) -> Epoch {
        self.session.epoch()
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    /// Number of inline nodes decoded so far.
    pub fn nodes_read(&self) -> usize {
        self.seen_nodes.len()
    }

    pub fn reset_ids(&mut self) {
        self.ids.reset();
    }

    /// Run `f` on the next `len` bytes only.
    ///
    /// The outer cursor moves past the region whether or not `f` succeeds.
    /// Returns `f`'s value and how many bytes of the region it consumed.
    pub fn with_region<T>(
        &mut self,
        len: usize,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<(T, usize)> {
        let region = self.cursor.region(len)?;
        let outer = std::mem::replace(&mut self.cursor, region);
        let result = f(self);
        let region = std::mem::replace(&mut self.cursor, outer);
        Ok((result?, region.consumed()))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.cursor.read_bytes(n)
    }

    pub fn read_rest(&mut self) -> &'a [u8] {
        self.cursor.read_rest()
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8()
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.cursor.read_u16()
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.cursor.read_i32()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.cursor.read_u32()
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.cursor.read_f32()
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.cursor.read_bool()
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.cursor.read_string()
    }

    /// u32 byte count followed by that many bytes.
    pub fn read_data(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    pub fn read_id(&mut self) -> Result<Id> {
        self.ids.read(&mut self.cursor)
    }

    pub fn read_ident(&mut self) -> Result<Ident> {
        Ok(Ident {
            id: self.read_id()?,
            collection: self.read_id()?,
            author: self.read_id()?,
        })
    }

    /// Canonical form of an identifier read from the wire. May switch the epoch.
    pub fn remap_id(&mut self, raw: u32) -> u32 {
        let id = self.session.read_id(self.registry, raw);
        if id != raw {
            tracing::trace!(raw = format_args!("0x{raw:08X}"), id = format_args!("0x{id:08X}"), epoch = %self.session.epoch(), "remapped id");
        }
        id
    }

    pub fn read_chunk_id(&mut self) -> Result<u32> {
        let raw = self.read_u32()?;
        Ok(self.remap_id(raw))
    }

    pub fn read_class_id(&mut self) -> Result<u32> {
        self.read_chunk_id()
    }

    /// Read a node reference: `-1` for none, an external index, or a fresh
    /// index followed by a class id and the node's chunk stream.
    pub fn read_node_ref(&mut self) -> Result<Option<NodeRef>> {
        let index = self.read_i32()?;
        if index == -1 {
            return Ok(None);
        }
        let slot = u32::try_from(index)
            .ok()
            .filter(|i| *i > 0)
            .ok_or(Error::InvalidNodeIndex { index })?;
        if self.external_nodes.contains(&slot) {
            return Ok(Some(NodeRef::External(slot)));
        }
        if !self.seen_nodes.insert(slot) {
            return Err(Error::SharedNodeRef { index: slot });
        }
        if self.depth >= self.settings.max_node_depth {
            return Err(Error::NodeDepthExceeded {
                max: self.settings.max_node_depth,
            });
        }

        let class_id = self.read_class_id()?;
        let mut node = self.registry.construct_instance(class_id)?;
        tracing::debug!(index = slot, class = format_args!("0x{class_id:08X}"), "reading nested node");

        self.depth += 1;
        let result = stream::read_chunks(&mut node, self);
        self.depth -= 1;
        result?;

        Ok(Some(NodeRef::Internal(Box::new(node))))
    }
}
