//! File header: fixed fields, class id and the user data (metadata) table.
//!
//! ```text
//! "GBX" u16 version  u8 format  u8 refs_compression  u8 body_compression  [u8 unknown (v4+)]
//! u32 class_id
//! [user data (v6+)]
//! u32 num_nodes
//! ```
//!
//! User data is a length-prefixed table of header chunks:
//!
//! ```text
//! u32 total  u32 count  { u32 id  u32 size|HEAVY_BIT }*count  payloads...
//! ```
//!
//! where `total = count * 8 + 4 + sum(size)`. An empty table is a single `u32 0`.

use serde::Serialize;
use tracing::debug;

use crate::chunk::{Chunk, Class};
use crate::error::{Error, Result};
use crate::reader::GbxReader;
use crate::writer::GbxWriter;

pub const GBX_MAGIC: &[u8; 3] = b"GBX";

/// Flag bit on a user data entry size. Orthogonal to the size itself.
pub const HEAVY_BIT: u32 = 0x8000_0000;

const SIZE_MASK: u32 = !HEAVY_BIT;

pub const MIN_VERSION: u16 = 3;
pub const MAX_VERSION: u16 = 6;

/// Fixed leading header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeaderBasic {
    pub version: u16,
    /// `'B'` binary. Text files are not supported.
    pub format: char,
    /// `'U'` or `'C'`.
    pub ref_table_compression: char,
    /// `'U'` or `'C'`.
    pub body_compression: char,
    /// Present from version 4 on; usually `'R'` or `'E'`.
    pub unknown: Option<char>,
}

impl Default for HeaderBasic {
    fn default() -> Self {
        Self {
            version: MAX_VERSION,
            format: 'B',
            ref_table_compression: 'U',
            body_compression: 'U',
            unknown: Some('R'),
        }
    }
}

impl HeaderBasic {
    pub fn is_body_compressed(&self) -> bool {
        self.body_compression == 'C'
    }

    pub fn has_user_data(&self) -> bool {
        self.version >= 6
    }

    pub fn read(r: &mut GbxReader<'_>) -> Result<Self> {
        let magic = r.read_bytes(3)?;
        if magic != GBX_MAGIC {
            let mut found = [0u8; 3];
            found.copy_from_slice(magic);
            return Err(Error::InvalidMagic { found });
        }

        let version = r.read_u16()?;
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(Error::UnsupportedVersion { version });
        }

        let format = r.read_u8()? as char;
        if format != 'B' {
            return Err(Error::UnsupportedFormat { format });
        }
        let ref_table_compression = compression_flag(r, "reference table")?;
        let body_compression = compression_flag(r, "body")?;
        let unknown = if version >= 4 {
            Some(r.read_u8()? as char)
        } else {
            None
        };

        Ok(Self {
            version,
            format,
            ref_table_compression,
            body_compression,
            unknown,
        })
    }

    pub fn write(&self, w: &mut GbxWriter<'_>) {
        w.write_bytes(GBX_MAGIC);
        w.write_u16(self.version);
        w.write_u8(self.format as u8);
        w.write_u8(self.ref_table_compression as u8);
        w.write_u8(self.body_compression as u8);
        if self.version >= 4 {
            w.write_u8(self.unknown.unwrap_or('R') as u8);
        }
    }
}

fn compression_flag(r: &mut GbxReader<'_>, section: &'static str) -> Result<char> {
    match r.read_u8()? as char {
        flag @ ('U' | 'C') => Ok(flag),
        flag => Err(Error::UnsupportedCompression { section, flag }),
    }
}

/// Everything in the header except the user data entries, which live either
/// on the node (typed) or in [`Header::user_data`] (raw).
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub basic: HeaderBasic,
    /// Canonical class id of the root node.
    pub class_id: u32,
    /// Raw user data entries of a file whose class could not be instantiated.
    pub user_data: Vec<Chunk>,
    pub num_nodes: u32,
}

/// Read the user data table.
///
/// With a node, entries the class declares are decoded into it; everything
/// else comes back as opaque header chunks. Each entry gets a fresh lookback
/// table.
pub fn read_user_data(r: &mut GbxReader<'_>, class_id: u32, mut node: Option<&mut dyn Class>) -> Result<Vec<Chunk>> {
    let total = r.read_u32()? as usize;
    if total == 0 {
        return Ok(Vec::new());
    }

    let (chunks, consumed) = r.with_region(total, |r| {
        let count = r.read_u32()? as usize;
        if count > r.remaining() / 8 {
            return Err(Error::HeaderSizeMismatch {
                declared: total,
                computed: count.saturating_mul(8).saturating_add(4),
            });
        }

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let id = r.read_chunk_id()?;
            let size = r.read_u32()?;
            entries.push((id, (size & SIZE_MASK) as usize, size & HEAVY_BIT != 0));
        }

        let computed = entries.iter().map(|(_, size, _)| *size).sum::<usize>() + count * 8 + 4;
        if computed != total {
            return Err(Error::HeaderSizeMismatch {
                declared: total,
                computed,
            });
        }

        let settings = r.settings();
        let mut chunks = Vec::with_capacity(count);
        for (id, size, heavy) in entries {
            let typed = match node.as_deref_mut() {
                Some(_) => r.registry().construct_header_chunk(class_id, id),
                None => None,
            };
            let chunk = match (typed, node.as_deref_mut()) {
                (Some(mut chunk), Some(data))
                    if chunk.can_read() && !chunk.ignore && !settings.is_ignored(id) =>
                {
                    r.reset_ids();
                    let ((), consumed) = r.with_region(size, |r| chunk.read(data, r))?;
                    if settings.validate_chunk_size && consumed != size {
                        return Err(Error::ChunkSizeMismatch {
                            id,
                            declared: size,
                            consumed,
                        });
                    }
                    chunk.heavy = heavy;
                    chunk
                }
                (Some(mut chunk), _) => {
                    chunk.data = Some(r.read_bytes(size)?.to_vec());
                    chunk.heavy = heavy;
                    chunk
                }
                (None, _) => Chunk::opaque_header(id, r.read_bytes(size)?.to_vec(), heavy),
            };
            debug!(id = format_args!("0x{id:08X}"), size, heavy, kind = chunk.kind.name(), "header chunk");
            chunks.push(chunk);
        }
        Ok(chunks)
    })?;
    debug_assert_eq!(consumed, total);

    Ok(chunks)
}

/// Write the user data table. Entries holding raw bytes are copied, the rest
/// are serialized from `node`, so a table can mix both. The whole table is
/// assembled in memory first and nothing is emitted if any entry fails.
pub fn write_user_data<'c>(
    w: &mut GbxWriter<'_>,
    chunks: impl IntoIterator<Item = &'c mut Chunk>,
    mut node: Option<&mut dyn Class>,
) -> Result<()> {
    let chunks: Vec<&mut Chunk> = chunks.into_iter().collect();
    if chunks.is_empty() {
        w.write_u32(0);
        return Ok(());
    }

    let raw = chunks.iter().filter(|c| c.data.is_some()).count();
    debug!(typed = chunks.len() - raw, raw, "writing user data");

    let mut entries = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let payload = match &chunk.data {
            Some(data) => data.clone(),
            None => {
                let data = node
                    .as_deref_mut()
                    .ok_or(Error::ChunkWriteUnsupported { id: chunk.id })?;
                if !chunk.can_write() {
                    return Err(Error::ChunkWriteUnsupported { id: chunk.id });
                }
                w.buffered(|w| {
                    w.reset_ids();
                    chunk.write(data, w)
                })?
            }
        };
        entries.push((chunk.id, chunk.heavy, payload));
    }

    let table = w.buffered(|w| {
        let payload_len: usize = entries.iter().map(|(_, _, p)| p.len()).sum();
        w.write_len(entries.len() * 8 + 4 + payload_len)?;
        w.write_len(entries.len())?;
        for (id, heavy, payload) in &entries {
            w.write_chunk_id(*id);
            let size = u32::try_from(payload.len())
                .ok()
                .filter(|s| s & HEAVY_BIT == 0)
                .ok_or(Error::LengthOverflow { len: payload.len() })?;
            w.write_u32(if *heavy { size | HEAVY_BIT } else { size });
        }
        for (_, _, payload) in &entries {
            w.write_bytes(payload);
        }
        Ok(())
    })?;
    w.write_bytes(&table);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Writer;
    use crate::registry::Registry;
    use crate::remap::Epoch;
    use crate::settings::ReadSettings;

    fn registry() -> Registry {
        Registry::builder().build().unwrap()
    }

    #[test]
    fn basic_fields_follow_the_version() {
        let registry = registry();
        let settings = ReadSettings::default();
        for basic in [
            HeaderBasic::default(),
            HeaderBasic {
                version: 3,
                unknown: None,
                body_compression: 'C',
                ..HeaderBasic::default()
            },
        ] {
            let mut w = GbxWriter::new(&registry, Epoch::Latest);
            basic.write(&mut w);
            let bytes = w.into_bytes();
            assert_eq!(bytes.len(), if basic.version >= 4 { 9 } else { 8 });
            let mut r = GbxReader::new(&bytes, &registry, &settings);
            assert_eq!(HeaderBasic::read(&mut r).unwrap(), basic);
        }
    }

    #[test]
    fn basic_fields_are_validated() {
        let registry = registry();
        let settings = ReadSettings::default();
        let parse = |bytes: &[u8]| {
            let mut r = GbxReader::new(bytes, &registry, &settings);
            HeaderBasic::read(&mut r)
        };
        assert!(matches!(parse(b"GBY\x06\x00BUUR"), Err(Error::InvalidMagic { found }) if &found == b"GBY"));
        assert!(matches!(parse(b"GBX\x02\x00BUUR"), Err(Error::UnsupportedVersion { version: 2 })));
        assert!(matches!(parse(b"GBX\x06\x00TUUR"), Err(Error::UnsupportedFormat { format: 'T' })));
        assert!(matches!(
            parse(b"GBX\x06\x00BUXR"),
            Err(Error::UnsupportedCompression { section: "body", flag: 'X' })
        ));
    }

    #[test]
    fn table_total_counts_entries_and_payloads() {
        let registry = registry();
        let mut chunks = vec![
            Chunk::opaque_header(0x0304_3002, vec![1; 5], false),
            Chunk::opaque_header(0x0304_3003, vec![2; 7], true),
            Chunk::opaque_header(0x0304_3004, vec![], false),
        ];
        let mut w = GbxWriter::new(&registry, Epoch::Latest);
        write_user_data(&mut w, chunks.iter_mut(), None).unwrap();
        let bytes = w.into_bytes();

        let total = u32::from_le_bytes(bytes[..4].try_into().unwrap());
        assert_eq!(total, 3 * 8 + 4 + 5 + 7);
        assert_eq!(bytes.len(), 4 + total as usize);
        let heavy_size = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
        assert_eq!(heavy_size & HEAVY_BIT, HEAVY_BIT);
        assert_eq!(heavy_size & SIZE_MASK, 7);

        let settings = ReadSettings::default();
        let mut r = GbxReader::new(&bytes, &registry, &settings);
        let read = read_user_data(&mut r, 0x0304_3000, None).unwrap();
        assert_eq!(read.len(), 3);
        assert!(read[1].heavy && !read[0].heavy);
        assert_eq!(read[1].data.as_deref(), Some(&[2; 7][..]));
        assert!(read.iter().all(|c| c.header));
    }

    #[test]
    fn empty_table_is_a_single_zero() {
        let registry = registry();
        let mut w = GbxWriter::new(&registry, Epoch::Latest);
        write_user_data(&mut w, std::iter::empty(), None).unwrap();
        assert_eq!(w.as_bytes(), [0, 0, 0, 0]);
    }

    #[test]
    fn inconsistent_total_is_rejected() {
        let registry = registry();
        let settings = ReadSettings::default();
        let mut b = Writer::new();
        b.write_u32(4 + 8 + 2);
        b.write_u32(1);
        b.write_u32(0x0304_3002);
        b.write_u32(1);
        b.write_bytes(&[0, 0]);
        let bytes = b.into_bytes();
        let mut r = GbxReader::new(&bytes, &registry, &settings);
        assert!(matches!(
            read_user_data(&mut r, 0x0304_3000, None),
            Err(Error::HeaderSizeMismatch { declared: 14, computed: 13 })
        ));
    }
}
