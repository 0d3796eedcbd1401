//! One description, both directions.
//!
//! A [`ReaderWriter`] chunk describes its layout once: each call either fills
//! the field from the reader or emits it through the writer.

use crate::error::Result;
use crate::id::{Id, Ident};
use crate::node::NodeRef;
use crate::reader::GbxReader;
use crate::writer::GbxWriter;

pub enum ReaderWriter<'r, 'a> {
    Reader(&'r mut GbxReader<'a>),
    Writer(&'r mut GbxWriter<'a>),
}

impl ReaderWriter<'_, '_> {
    pub fn u8(&mut self, value: &mut u8) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_u8()?,
            ReaderWriter::Writer(w) => w.write_u8(*value),
        }
        Ok(())
    }

    pub fn u16(&mut self, value: &mut u16) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_u16()?,
            ReaderWriter::Writer(w) => w.write_u16(*value),
        }
        Ok(())
    }

    pub fn i32(&mut self, value: &mut i32) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_i32()?,
            ReaderWriter::Writer(w) => w.write_i32(*value),
        }
        Ok(())
    }

    pub fn u32(&mut self, value: &mut u32) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_u32()?,
            ReaderWriter::Writer(w) => w.write_u32(*value),
        }
        Ok(())
    }

    pub fn f32(&mut self, value: &mut f32) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_f32()?,
            ReaderWriter::Writer(w) => w.write_f32(*value),
        }
        Ok(())
    }

    pub fn bool(&mut self, value: &mut bool) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_bool()?,
            ReaderWriter::Writer(w) => w.write_bool(*value),
        }
        Ok(())
    }

    pub fn string(&mut self, value: &mut String) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_string()?,
            ReaderWriter::Writer(w) => w.write_string(value)?,
        }
        Ok(())
    }

    /// Length-prefixed byte blob.
    pub fn data(&mut self, value: &mut Vec<u8>) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_data()?,
            ReaderWriter::Writer(w) => w.write_data(value)?,
        }
        Ok(())
    }

    /// Exactly `len` raw bytes, no prefix.
    pub fn bytes(&mut self, value: &mut Vec<u8>, len: usize) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_bytes(len)?.to_vec(),
            ReaderWriter::Writer(w) => w.write_bytes(value),
        }
        Ok(())
    }

    pub fn id(&mut self, value: &mut Id) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_id()?,
            ReaderWriter::Writer(w) => w.write_id(value)?,
        }
        Ok(())
    }

    pub fn ident(&mut self, value: &mut Ident) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_ident()?,
            ReaderWriter::Writer(w) => w.write_ident(value)?,
        }
        Ok(())
    }

    pub fn node_ref(&mut self, value: &mut Option<NodeRef>) -> Result<()> {
        match self {
            ReaderWriter::Reader(r) => *value = r.read_node_ref()?,
            ReaderWriter::Writer(w) => w.write_node_ref(value.as_mut())?,
        }
        Ok(())
    }

    /// Leading layout version of a chunk, as an i32.
    pub fn version_i32(&mut self, version: &mut i32) -> Result<()> {
        self.i32(version)?;
        tracing::trace!(version = *version, "chunk version");
        Ok(())
    }

    /// Leading layout version of a chunk, as a single byte.
    pub fn version_u8(&mut self, version: &mut u8) -> Result<()> {
        self.u8(version)?;
        tracing::trace!(version = *version, "chunk version");
        Ok(())
    }

    /// u32 count followed by each element, described by `item`.
    pub fn list<T: Default>(
        &mut self,
        items: &mut Vec<T>,
        mut item: impl FnMut(&mut Self, &mut T) -> Result<()>,
    ) -> Result<()> {
        let reading = match self {
            ReaderWriter::Reader(r) => Some((r.read_u32()? as usize, r.remaining())),
            ReaderWriter::Writer(w) => {
                w.write_len(items.len())?;
                None
            }
        };
        match reading {
            Some((count, remaining)) => {
                items.clear();
                // Every element takes at least one byte.
                items.reserve(count.min(remaining));
                for _ in 0..count {
                    let mut value = T::default();
                    item(self, &mut value)?;
                    items.push(value);
                }
            }
            None => {
                for value in items.iter_mut() {
                    item(self, value)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::remap::Epoch;
    use crate::settings::ReadSettings;

    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        version: i32,
        name: String,
        tags: Vec<String>,
        flag: bool,
    }

    fn describe(rw: &mut ReaderWriter<'_, '_>, s: &mut Sample) -> Result<()> {
        rw.version_i32(&mut s.version)?;
        rw.string(&mut s.name)?;
        rw.list(&mut s.tags, |rw, tag| rw.string(tag))?;
        if s.version >= 2 {
            rw.bool(&mut s.flag)?;
        }
        Ok(())
    }

    #[test]
    fn same_description_reads_what_it_wrote() {
        let registry = Registry::builder().build().unwrap();
        let mut sample = Sample {
            version: 2,
            name: "Canyon".into(),
            tags: vec!["a".into(), "bc".into()],
            flag: true,
        };

        let mut w = GbxWriter::new(&registry, Epoch::Latest);
        describe(&mut ReaderWriter::Writer(&mut w), &mut sample).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 4 + (4 + 6) + 4 + (4 + 1) + (4 + 2) + 4);

        let settings = ReadSettings::default();
        let mut r = GbxReader::new(&bytes, &registry, &settings);
        let mut decoded = Sample::default();
        describe(&mut ReaderWriter::Reader(&mut r), &mut decoded).unwrap();
        assert_eq!(decoded, sample);
        assert_eq!(r.remaining(), 0);
    }
}
