//! Binary encode/decode for the volume file format.
//!
//! All integers are little-endian. Each word block is a `u32` compressed
//! length followed by that many bytes of a gzip stream; the decompressed
//! stream is a packed array of little-endian `u32` words.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::PersistError;

// ── Primitive writers ───────────────────────────────────────────

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), PersistError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian i32.
pub fn write_i32_le(w: &mut dyn Write, v: i32) -> Result<(), PersistError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, PersistError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian i32.
pub fn read_i32_le(r: &mut dyn Read) -> Result<i32, PersistError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read a header count field, rejecting negative values.
pub fn read_count(r: &mut dyn Read, field: &str) -> Result<usize, PersistError> {
    let v = read_i32_le(r)?;
    usize::try_from(v).map_err(|_| PersistError::MalformedBlock {
        block: "header",
        detail: format!("{field} is negative ({v})"),
    })
}

// ── Word blocks ─────────────────────────────────────────────────

/// Gzip `words` and write the result as a length-prefixed block.
pub fn write_block(w: &mut dyn Write, words: &[u32]) -> Result<(), PersistError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for word in words {
        encoder.write_all(&word.to_le_bytes())?;
    }
    let compressed = encoder.finish()?;
    let len = u32::try_from(compressed.len()).map_err(|_| PersistError::MalformedBlock {
        block: "output",
        detail: format!("compressed size {} exceeds u32", compressed.len()),
    })?;
    write_u32_le(w, len)?;
    w.write_all(&compressed)?;
    Ok(())
}

/// Read one length-prefixed gzip block and decode exactly `expected` words.
///
/// Neither the stored length nor the header count is trusted for
/// allocation: the compressed bytes are read through a bounded reader and
/// decoding stops one byte past `expected` words.
pub fn read_block(
    r: &mut dyn Read,
    block: &'static str,
    expected: usize,
) -> Result<Vec<u32>, PersistError> {
    let len = read_u32_le(r)?;
    let mut compressed = Vec::new();
    (&mut *r).take(u64::from(len)).read_to_end(&mut compressed)?;
    if compressed.len() as u64 != u64::from(len) {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{block} block holds {} of {len} bytes", compressed.len()),
        )
        .into());
    }

    let limit = (expected as u64).saturating_mul(4);
    let mut bytes = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| PersistError::MalformedBlock {
            block,
            detail: format!("gzip: {e}"),
        })?;
    if bytes.len() as u64 > limit {
        return Err(PersistError::MalformedBlock {
            block,
            detail: format!("decodes to more than {expected} words"),
        });
    }
    if bytes.len() % 4 != 0 {
        return Err(PersistError::MalformedBlock {
            block,
            detail: format!("{} bytes is not a whole number of words", bytes.len()),
        });
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if words.len() != expected {
        return Err(PersistError::CountMismatch {
            block,
            expected,
            found: words.len(),
        });
    }
    Ok(words)
}
