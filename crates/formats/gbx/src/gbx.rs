use std::borrow::Cow;

use tracing::{debug, warn};

use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::header::{read_user_data, write_user_data, Header, HeaderBasic};
use crate::node::Node;
use crate::reader::GbxReader;
use crate::ref_table::RefTable;
use crate::registry::Registry;
use crate::remap::Epoch;
use crate::settings::{ReadSettings, WriteSettings};
use crate::stream;
use crate::writer::GbxWriter;

/// Body compression service. The codec itself is supplied by the caller.
pub trait BodyCodec: Send + Sync {
    fn decompress(&self, data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>>;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// A whole Gbx file.
///
/// When the root class can be instantiated the body is decoded into a
/// [`Node`]. Otherwise (unknown or abstract class, or a header-only read) the
/// body after the reference table is kept as raw bytes and written back
/// verbatim.
#[derive(Debug, Clone)]
pub struct Gbx {
    pub header: Header,
    pub refs: RefTable,
    node: Option<Node>,
    raw_body: Option<Vec<u8>>,
    epoch: Epoch,
}

impl Gbx {
    /// New file around a node, written in the latest numbering.
    pub fn new(node: Node) -> Self {
        Self {
            header: Header {
                class_id: node.class_id,
                ..Header::default()
            },
            refs: RefTable::default(),
            node: Some(node),
            raw_body: None,
            epoch: Epoch::Latest,
        }
    }

    pub fn parse(data: &[u8], registry: &Registry, settings: &ReadSettings) -> Result<Self> {
        Self::parse_with(data, registry, settings, None)
    }

    pub fn parse_with(
        data: &[u8],
        registry: &Registry,
        settings: &ReadSettings,
        codec: Option<&dyn BodyCodec>,
    ) -> Result<Self> {
        let mut r = GbxReader::new(data, registry, settings);
        let basic = HeaderBasic::read(&mut r)?;
        let class_id = r.read_class_id()?;

        let mut node = match registry.construct_instance(class_id) {
            Ok(node) => Some(node),
            Err(Error::ClassNotConstructible { .. }) => {
                debug!(class = format_args!("0x{class_id:08X}"), "class not constructible, keeping body raw");
                None
            }
            Err(e) => return Err(e),
        };

        let mut user_data = if basic.has_user_data() {
            read_user_data(&mut r, class_id, node.as_mut().map(|n| n.data.as_mut()))?
        } else {
            Vec::new()
        };
        if let Some(node) = node.as_mut() {
            for chunk in user_data.drain(..) {
                node.chunks.attach(chunk);
            }
        }

        let num_nodes = r.read_u32()?;
        let refs = RefTable::read(&mut r, basic.version)?;
        debug!(
            version = basic.version,
            class = format_args!("0x{class_id:08X}"),
            num_nodes,
            external = refs.nodes.len(),
            "read header"
        );

        let header = Header {
            basic,
            class_id,
            user_data,
            num_nodes,
        };

        let wire = r.read_rest();
        let (node, raw_body, epoch) = match node {
            Some(mut node) if !settings.header_only => {
                let body = decode_body(&basic, wire, codec)?;
                let mut body_r = GbxReader::new(&body, registry, settings)
                    .with_session(r.session())
                    .with_external_nodes(refs.node_indices());
                body_r.reset_ids();
                stream::read_chunks(&mut node, &mut body_r)?;
                if body_r.remaining() > 0 {
                    warn!(trailing = body_r.remaining(), "bytes after the body terminator are dropped");
                }
                debug!(
                    chunks = node.chunks.len(),
                    nested = body_r.nodes_read(),
                    epoch = %body_r.epoch(),
                    "read body"
                );
                (Some(node), None, body_r.epoch())
            }
            node => (node, Some(wire.to_vec()), r.epoch()),
        };

        Ok(Self {
            header,
            refs,
            node,
            raw_body,
            epoch,
        })
    }

    pub fn class_id(&self) -> u32 {
        self.node.as_ref().map_or(self.header.class_id, |n| n.class_id)
    }

    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    pub fn node_mut(&mut self) -> Option<&mut Node> {
        self.node.as_mut()
    }

    pub fn into_node(self) -> Result<Node> {
        let class_id = self.class_id();
        self.node.ok_or(Error::ClassNotConstructible { class_id })
    }

    /// Undecoded body bytes (everything after the reference table).
    pub fn raw_body(&self) -> Option<&[u8]> {
        self.raw_body.as_deref()
    }

    /// Numbering detected while reading.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// User data entries, typed or raw.
    pub fn header_chunks(&self) -> Box<dyn Iterator<Item = &Chunk> + '_> {
        match &self.node {
            Some(node) => Box::new(node.chunks.header()),
            None => Box::new(self.header.user_data.iter()),
        }
    }

    pub fn write(&mut self, registry: &Registry, settings: &WriteSettings) -> Result<Vec<u8>> {
        self.write_with(registry, settings, None)
    }

    /// Serialize the file. Output is assembled in memory; on error nothing is returned.
    pub fn write_with(
        &mut self,
        registry: &Registry,
        settings: &WriteSettings,
        codec: Option<&dyn BodyCodec>,
    ) -> Result<Vec<u8>> {
        let class_id = self.class_id();
        if !registry.is_write_supported(class_id) {
            return Err(Error::ClassWriteNotSupported { class_id });
        }
        let epoch = settings.epoch.unwrap_or(self.epoch);
        let basic = self.header.basic;

        let (body, num_nodes) = match (&self.raw_body, self.node.as_mut()) {
            (Some(raw), _) => (raw.clone(), self.header.num_nodes),
            (None, Some(node)) => {
                let mut w = GbxWriter::new(registry, epoch).with_external_nodes(self.refs.node_indices());
                stream::write_chunks(node, &mut w)?;
                let external = u32::try_from(self.refs.nodes.len()).map_err(|_| Error::LengthOverflow {
                    len: self.refs.nodes.len(),
                })?;
                let num_nodes = 1 + w.nodes_written() + external;
                (encode_body(&basic, w.into_bytes(), codec)?, num_nodes)
            }
            (None, None) => return Err(Error::MissingBody),
        };

        let mut w = GbxWriter::new(registry, epoch);
        basic.write(&mut w);
        w.write_class_id(class_id);
        if basic.has_user_data() {
            match self.node.as_mut() {
                Some(node) => {
                    let (data, chunks) = node.split_mut();
                    write_user_data(&mut w, chunks.iter_mut().filter(|c| c.header), Some(data))?;
                }
                None => write_user_data(&mut w, self.header.user_data.iter_mut(), None)?,
            }
        }
        w.write_u32(num_nodes);
        self.refs.write(&mut w, basic.version)?;
        w.write_bytes(&body);

        self.header.class_id = class_id;
        self.header.num_nodes = num_nodes;
        debug!(
            class = format_args!("0x{class_id:08X}"),
            %epoch,
            num_nodes,
            len = w.position(),
            "wrote gbx"
        );
        Ok(w.into_bytes())
    }
}

fn decode_body<'d>(basic: &HeaderBasic, wire: &'d [u8], codec: Option<&dyn BodyCodec>) -> Result<Cow<'d, [u8]>> {
    if !basic.is_body_compressed() {
        return Ok(Cow::Borrowed(wire));
    }
    let codec = codec.ok_or(Error::CompressionUnavailable)?;

    let mut c = crate::cursor::Cursor::new(wire);
    let uncompressed_size = c.read_u32()? as usize;
    let compressed_size = c.read_u32()? as usize;
    let payload = c.read_bytes(compressed_size)?;
    if !c.is_empty() {
        warn!(trailing = c.remaining(), "bytes after the compressed body are dropped");
    }

    let body = codec.decompress(payload, uncompressed_size)?;
    if body.len() != uncompressed_size {
        return Err(Error::Compression {
            message: format!(
                "expected {uncompressed_size} bytes after decompression, got {}",
                body.len()
            ),
        });
    }
    Ok(Cow::Owned(body))
}

fn encode_body(basic: &HeaderBasic, body: Vec<u8>, codec: Option<&dyn BodyCodec>) -> Result<Vec<u8>> {
    if !basic.is_body_compressed() {
        return Ok(body);
    }
    let codec = codec.ok_or(Error::CompressionUnavailable)?;
    let compressed = codec.compress(&body)?;

    let mut w = crate::cursor::Writer::with_capacity(compressed.len() + 8);
    w.write_len(body.len())?;
    w.write_len(compressed.len())?;
    w.write_bytes(&compressed);
    Ok(w.into_bytes())
}
