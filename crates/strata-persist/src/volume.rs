//! Moving volumes between the arena and a [`VolumeFile`].

use strata_arena::{VolumeCounters, VolumeMemoryHandle, VolumePool, VolumeRequest};
use strata_core::PADDED_BRICK_VOLUME;

use crate::error::PersistError;
use crate::file::VolumeFile;

/// Snapshot a live volume.
///
/// Node and payload arrays are cut to the volume's recorded counters; the
/// whole brick-data range is saved.
pub fn export_volume(
    pool: &VolumePool,
    handle: &VolumeMemoryHandle,
    resolution: u32,
) -> Result<VolumeFile, PersistError> {
    let counters = pool.counters(handle)?;
    let mut nodes = vec![0; counters.node_count as usize];
    pool.read_nodes(handle, 0, &mut nodes)?;
    let mut payloads = vec![0; counters.payload_count as usize];
    pool.read_payloads(handle, 0, &mut payloads)?;
    let brick_data = pool.brick_data(handle)?.to_vec();
    log::debug!(
        "exported volume: {} nodes, {} payloads, {} brick words",
        nodes.len(),
        payloads.len(),
        brick_data.len()
    );
    Ok(VolumeFile {
        resolution,
        nodes,
        payloads,
        brick_data,
    })
}

/// Allocate a volume sized for `file` and fill it.
///
/// On any failure after allocation the volume is released again, so the
/// pool is left as it was.
pub fn import_volume(
    pool: &mut VolumePool,
    file: &VolumeFile,
) -> Result<VolumeMemoryHandle, PersistError> {
    if file.brick_data.len() % PADDED_BRICK_VOLUME != 0 {
        return Err(PersistError::MalformedBlock {
            block: "brick data",
            detail: format!(
                "{} words is not a whole number of {PADDED_BRICK_VOLUME}-word bricks",
                file.brick_data.len()
            ),
        });
    }
    let request = VolumeRequest {
        nodes: word_count(file.nodes.len().max(file.payloads.len()))?,
        bricks: word_count(file.brick_data.len() / PADDED_BRICK_VOLUME)?,
    };
    let handle = pool.acquire(request)?;
    if let Err(e) = fill(pool, &handle, file) {
        pool.release(&handle)?;
        return Err(e);
    }
    log::debug!("imported volume into page-table slot {}", handle.page_table_offset());
    Ok(handle)
}

fn fill(
    pool: &mut VolumePool,
    handle: &VolumeMemoryHandle,
    file: &VolumeFile,
) -> Result<(), PersistError> {
    pool.write_nodes(handle, 0, &file.nodes)?;
    pool.write_payloads(handle, 0, &file.payloads)?;
    pool.brick_data_mut(handle)?.copy_from_slice(&file.brick_data);
    pool.set_counters(
        handle,
        VolumeCounters {
            node_count: word_count(file.nodes.len())?,
            payload_count: word_count(file.payloads.len())?,
            brick_voxel_cursor: word_count(file.brick_data.len())?,
        },
    )?;
    Ok(())
}

fn word_count(len: usize) -> Result<u32, PersistError> {
    u32::try_from(len).map_err(|_| PersistError::MalformedBlock {
        block: "header",
        detail: format!("{len} words exceeds the arena's address space"),
    })
}
