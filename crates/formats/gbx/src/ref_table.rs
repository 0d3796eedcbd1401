//! Reference table: nodes that live in other files.

use serde::Serialize;

use crate::error::Result;
use crate::reader::GbxReader;
use crate::writer::GbxWriter;

const FLAG_RESOURCE: u32 = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefTable {
    pub ancestor_level: u32,
    pub folders: Vec<RefFolder>,
    pub nodes: Vec<ExternalNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefFolder {
    pub name: String,
    pub folders: Vec<RefFolder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExternalFile {
    /// File name plus 1-based index into the flattened folder list (0 = root).
    Name { name: String, folder_index: u32 },
    /// Index into the game's resource table.
    Resource(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalNode {
    pub flags: u32,
    pub file: ExternalFile,
    pub node_index: u32,
    /// Present from version 5 on.
    pub use_file: Option<bool>,
}

impl RefTable {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node indices claimed by external references.
    pub fn node_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.iter().map(|n| n.node_index)
    }

    pub fn read(r: &mut GbxReader<'_>, version: u16) -> Result<Self> {
        let count = r.read_u32()? as usize;
        if count == 0 {
            return Ok(Self::default());
        }

        let ancestor_level = r.read_u32()?;
        let folders = read_folders(r)?;

        let mut nodes = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            let flags = r.read_u32()?;
            let mut file = if flags & FLAG_RESOURCE != 0 {
                ExternalFile::Resource(r.read_u32()?)
            } else {
                ExternalFile::Name {
                    name: r.read_string()?,
                    folder_index: 0,
                }
            };
            let node_index = r.read_u32()?;
            let use_file = if version >= 5 { Some(r.read_bool()?) } else { None };
            if let ExternalFile::Name { folder_index, .. } = &mut file {
                *folder_index = r.read_u32()?;
            }
            nodes.push(ExternalNode {
                flags,
                file,
                node_index,
                use_file,
            });
        }

        tracing::debug!(nodes = nodes.len(), folders = folders.len(), "read reference table");
        Ok(Self {
            ancestor_level,
            folders,
            nodes,
        })
    }

    pub fn write(&self, w: &mut GbxWriter<'_>, version: u16) -> Result<()> {
        w.write_len(self.nodes.len())?;
        if self.nodes.is_empty() {
            return Ok(());
        }

        w.write_u32(self.ancestor_level);
        write_folders(w, &self.folders)?;

        for node in &self.nodes {
            w.write_u32(node.flags);
            match &node.file {
                ExternalFile::Name { name, .. } => w.write_string(name)?,
                ExternalFile::Resource(index) => w.write_u32(*index),
            }
            w.write_u32(node.node_index);
            if version >= 5 {
                w.write_bool(node.use_file.unwrap_or(false));
            }
            if let ExternalFile::Name { folder_index, .. } = &node.file {
                w.write_u32(*folder_index);
            }
        }
        Ok(())
    }
}

fn read_folders(r: &mut GbxReader<'_>) -> Result<Vec<RefFolder>> {
    let count = r.read_u32()? as usize;
    let mut folders = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        let name = r.read_string()?;
        let children = read_folders(r)?;
        folders.push(RefFolder {
            name,
            folders: children,
        });
    }
    Ok(folders)
}

fn write_folders(w: &mut GbxWriter<'_>, folders: &[RefFolder]) -> Result<()> {
    w.write_len(folders.len())?;
    for folder in folders {
        w.write_string(&folder.name)?;
        write_folders(w, &folder.folders)?;
    }
    Ok(())
}
