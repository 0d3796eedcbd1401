use std::collections::HashSet;

use crate::cursor::Writer;
use crate::error::{Error, Result};
use crate::id::{Id, IdTable, Ident};
use crate::node::NodeRef;
use crate::registry::Registry;
use crate::remap::{Epoch, RemapSession};
use crate::stream;

/// Encoding context for one stream.
pub struct GbxWriter<'a> {
    buf: Writer,
    registry: &'a Registry,
    session: RemapSession,
    ids: IdTable,
    next_node_index: u32,
    nodes_written: u32,
    external_nodes: HashSet<u32>,
}

impl<'a> GbxWriter<'a> {
    pub fn new(registry: &'a Registry, epoch: Epoch) -> Self {
        Self {
            buf: Writer::new(),
            registry,
            session: RemapSession::new(epoch),
            ids: IdTable::new(),
            next_node_index: 1,
            nodes_written: 0,
            external_nodes: HashSet::new(),
        }
    }

    /// Node indices owned by reference-table entries; inline nodes skip them.
    pub fn with_external_nodes(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.external_nodes = indices.into_iter().collect();
        self
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn epoch(&self) -> Epoch {
        self.session.epoch()
    }

    pub fn position(&self) -> usize {
        self.buf.position()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }

    /// Number of inline nodes written so far.
    pub fn nodes_written(&self) -> u32 {
        self.nodes_written
    }

    pub fn reset_ids(&mut self) {
        self.ids.reset();
    }

    /// Run `f` against an empty scratch buffer and return what it wrote.
    /// The main buffer is left untouched.
    pub fn buffered(&mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<Vec<u8>> {
        let outer = std::mem::take(&mut self.buf);
        let result = f(self);
        let scratch = std::mem::replace(&mut self.buf, outer);
        result?;
        Ok(scratch.into_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.write_bytes(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.write_u8(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.write_u16(v);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.write_i32(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.write_u32(v);
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.write_f32(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.write_bool(v);
    }

    pub fn write_len(&mut self, len: usize) -> Result<()> {
        self.buf.write_len(len)
    }

    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.buf.write_string(s)
    }

    /// u32 byte count followed by the bytes.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.write_len(data.len())?;
        self.write_bytes(data);
        Ok(())
    }

    pub fn write_id(&mut self, id: &Id) -> Result<()> {
        self.ids.write(&mut self.buf, id)
    }

    pub fn write_ident(&mut self, ident: &Ident) -> Result<()> {
        self.write_id(&ident.id)?;
        self.write_id(&ident.collection)?;
        self.write_id(&ident.author)
    }

    /// Wire form of a canonical id under the current epoch.
    pub fn wire_id(&self, id: u32) -> u32 {
        self.session.write_id(self.registry, id)
    }

    pub fn write_chunk_id(&mut self, id: u32) {
        let raw = self.wire_id(id);
        self.write_u32(raw);
    }

    pub fn write_class_id(&mut self, class_id: u32) {
        self.write_chunk_id(class_id);
    }

    /// Write a node reference. Inline nodes get the next free index, followed
    /// by their class id and chunk stream.
    pub fn write_node_ref(&mut self, node_ref: Option<&mut NodeRef>) -> Result<()> {
        match node_ref {
            None => self.write_i32(-1),
            Some(NodeRef::External(index)) => {
                let wire = i32::try_from(*index).map_err(|_| Error::LengthOverflow {
                    len: *index as usize,
                })?;
                self.write_i32(wire);
            }
            Some(NodeRef::Internal(node)) => {
                let index = self.allocate_node_index();
                let wire = i32::try_from(index).map_err(|_| Error::LengthOverflow {
                    len: index as usize,
                })?;
                self.write_i32(wire);
                self.write_class_id(node.class_id);
                self.nodes_written += 1;
                stream::write_chunks(node, self)?;
            }
        }
        Ok(())
    }

    fn allocate_node_index(&mut self) -> u32 {
        while self.external_nodes.contains(&self.next_node_index) {
            self.next_node_index += 1;
        }
        let index = self.next_node_index;
        self.next_node_index += 1;
        index
    }
}
