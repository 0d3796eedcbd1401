//! Chunk stream codec.
//!
//! A node's body is a sequence of chunk records ended by [`FACADE`]:
//!
//! ```text
//! unskippable: [id] payload
//! skippable:   [id] [SKIP] [u32 len] payload[len]
//! ```
//!
//! Unskippable payloads are not length-prefixed, so an unknown unskippable
//! chunk cannot be stepped over and ends the decode.

use tracing::{debug, trace, warn};

use crate::chunk::Chunk;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::reader::GbxReader;
use crate::writer::GbxWriter;

/// Terminates a chunk stream.
pub const FACADE: u32 = 0xFACA_DE01;

/// Marks a length-prefixed (skippable) chunk payload. `"PIKS"` little-endian.
pub const SKIP: u32 = 0x534B_4950;

/// Decode chunk records into `node` until the terminator.
pub fn read_chunks(node: &mut Node, r: &mut GbxReader<'_>) -> Result<()> {
    let settings = r.settings();
    let mut previous: Option<u32> = None;

    loop {
        let raw = r.read_u32()?;
        if raw == FACADE {
            trace!(offset = r.position() - 4, "end of chunk stream");
            return Ok(());
        }

        let id = r.remap_id(raw);
        let chunk = r.registry().construct_chunk(node.class_id, id);

        match chunk {
            None => {
                let marker = r.read_u32()?;
                if marker != SKIP {
                    return Err(Error::UnknownUnskippableChunk { id, previous });
                }
                let len = r.read_u32()? as usize;
                let data = r.read_bytes(len)?.to_vec();
                warn!(
                    id = format_args!("0x{id:08X}"),
                    class = format_args!("0x{:08X}", node.class_id),
                    len,
                    "unknown skippable chunk kept as raw bytes"
                );
                node.chunks.attach(Chunk::opaque(id, data));
            }
            Some(mut chunk) if chunk.skippable => {
                let marker = r.read_u32()?;
                if marker != SKIP {
                    if settings.strict_skip_markers {
                        return Err(Error::MalformedSkipMarker { id, found: marker });
                    }
                    debug!(
                        id = format_args!("0x{id:08X}"),
                        found = format_args!("0x{marker:08X}"),
                        "known chunk without skip marker, ending stream"
                    );
                    return Ok(());
                }
                let len = r.read_u32()? as usize;
                let ignore = chunk.ignore || settings.is_ignored(id);
                debug!(id = format_args!("0x{id:08X}"), raw = format_args!("0x{raw:08X}"), len, "skippable chunk");

                if ignore || !chunk.can_read() {
                    chunk.data = Some(r.read_bytes(len)?.to_vec());
                } else {
                    let ((), consumed) = r.with_region(len, |r| chunk.read(node.data.as_mut(), r))?;
                    if settings.validate_chunk_size && consumed != len {
                        return Err(Error::ChunkSizeMismatch {
                            id,
                            declared: len,
                            consumed,
                        });
                    }
                }
                node.chunks.attach(chunk);
            }
            Some(mut chunk) => {
                debug!(id = format_args!("0x{id:08X}"), raw = format_args!("0x{raw:08X}"), "chunk");
                if chunk.ignore || settings.is_ignored(id) {
                    return Err(Error::IgnoredUnskippableChunk { id });
                }
                if !chunk.can_read() {
                    return Err(Error::ChunkReadUnsupported { id, previous });
                }
                chunk.read(node.data.as_mut(), r)?;
                node.chunks.attach(chunk);
            }
        }

        previous = Some(id);
    }
}

/// Encode the body chunks of `node` followed by the terminator.
///
/// Header chunks are skipped; they belong to the file header.
pub fn write_chunks(node: &mut Node, w: &mut GbxWriter<'_>) -> Result<()> {
    let (data, chunks) = node.split_mut();

    for chunk in chunks.iter_mut().filter(|c| !c.header) {
        if !chunk.can_write() {
            return Err(Error::ChunkWriteUnsupported { id: chunk.id });
        }
        w.write_chunk_id(chunk.id);

        if let Some(raw) = &chunk.data {
            w.write_u32(SKIP);
            w.write_data(raw)?;
        } else if chunk.skippable {
            w.write_u32(SKIP);
            let payload = w.buffered(|w| chunk.write(&mut *data, w))?;
            w.write_data(&payload)?;
        } else {
            chunk.write(data, w)?;
        }
    }

    w.write_u32(FACADE);
    Ok(())
}
