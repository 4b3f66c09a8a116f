//! The in-memory image of a persisted volume.

use std::io::{Read, Write};

use crate::codec::{read_block, read_count, read_i32_le, write_block, write_i32_le};
use crate::error::PersistError;
use crate::{FORMAT_VERSION, MAGIC};

/// Everything needed to rebuild one volume: its node, payload and brick
/// arrays plus its brick resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VolumeFile {
    /// Bricks per axis.
    pub resolution: u32,
    /// Node words in virtual order.
    pub nodes: Vec<u32>,
    /// Payload words in virtual order.
    pub payloads: Vec<u32>,
    /// Padded brick voxel words.
    pub brick_data: Vec<u32>,
}

impl VolumeFile {
    /// Serialize to `w`.
    pub fn write_to(&self, w: &mut dyn Write) -> Result<(), PersistError> {
        w.write_all(&MAGIC)?;
        write_i32_le(w, FORMAT_VERSION)?;
        write_i32_le(w, header_field("resolution", self.resolution as usize)?)?;
        write_i32_le(w, header_field("node count", self.nodes.len())?)?;
        write_i32_le(w, header_field("payload count", self.payloads.len())?)?;
        write_i32_le(w, header_field("brick-data count", self.brick_data.len())?)?;
        write_block(w, &self.nodes)?;
        write_block(w, &self.payloads)?;
        write_block(w, &self.brick_data)?;
        Ok(())
    }

    /// Deserialize from `r`, validating the header and every block's word
    /// count.
    pub fn read_from(r: &mut dyn Read) -> Result<Self, PersistError> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(PersistError::InvalidMagic);
        }
        let version = read_i32_le(r)?;
        if version != FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion { found: version });
        }
        let resolution = read_count(r, "resolution")? as u32;
        let node_count = read_count(r, "node count")?;
        let payload_count = read_count(r, "payload count")?;
        let brick_count = read_count(r, "brick-data count")?;

        let nodes = read_block(r, "nodes", node_count)?;
        let payloads = read_block(r, "payloads", payload_count)?;
        let brick_data = read_block(r, "brick data", brick_count)?;
        Ok(Self {
            resolution,
            nodes,
            payloads,
            brick_data,
        })
    }
}

fn header_field(field: &str, value: usize) -> Result<i32, PersistError> {
    i32::try_from(value).map_err(|_| PersistError::MalformedBlock {
        block: "header",
        detail: format!("{field} {value} exceeds i32"),
    })
}
