//! The deduplicating tile stager: content-hashes each payload, writes unique
//! bytes to a scratch file once, and emits the RLE-collapsed entry stream.

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use twox_hash::XxHash3_64;

use crate::directory::Entry;

/// Consumes `(id, payload)` pairs in strictly increasing `id` order and
/// produces the deduplicated, RLE-collapsed entry list plus a scratch file
/// holding each unique payload exactly once.
///
/// The scratch file is a [`NamedTempFile`]; it is removed from disk when the
/// returned handle is dropped, whether or not the conversion ultimately
/// succeeds.
pub struct TileStager {
    file: NamedTempFile,
    cursor: u64,
    hash_to_location: HashMap<u64, (u64, u32)>,
    entries: Vec<Entry>,
    unique_tiles: u64,
    total_tiles: u64,
}

impl TileStager {
    pub fn new() -> Result<Self> {
        let file = NamedTempFile::new().context("create tile payload scratch file")?;
        Ok(Self {
            file,
            cursor: 0,
            hash_to_location: HashMap::new(),
            entries: Vec::new(),
            unique_tiles: 0,
            total_tiles: 0,
        })
    }

    /// Stages one tile. `id` must be strictly greater than the `id` of the
    /// previous call.
    pub fn push(&mut self, id: u64, data: &[u8]) -> Result<()> {
        if let Some(last) = self.entries.last() {
            anyhow::ensure!(id > last.id, "tile ids must be strictly increasing");
        }
        self.total_tiles += 1;

        let hash = XxHash3_64::oneshot(data);
        if let Some(&(offset, length)) = self.hash_to_location.get(&hash) {
            if let Some(last) = self.entries.last_mut() {
                if id == last.id + last.run_length as u64 && offset == last.offset {
                    last.run_length += 1;
                    return Ok(());
                }
            }
            self.entries.push(Entry {
                id,
                offset,
                length,
                run_length: 1,
            });
        } else {
            let offset = self.cursor;
            let length = data.len() as u32;
            self.file
                .write_all(data)
                .context("write tile payload to scratch file")?;
            self.cursor += length as u64;
            self.hash_to_location.insert(hash, (offset, length));
            self.unique_tiles += 1;
            self.entries.push(Entry {
                id,
                offset,
                length,
                run_length: 1,
            });
        }
        Ok(())
    }

    /// Finalizes staging, returning the entry stream, the scratch file
    /// (positioned for sequential reading from the start), the total byte
    /// length of the tile-data section, and the tile/unique-tile counts.
    pub fn finish(mut self) -> Result<StagedTiles> {
        self.file.flush().context("flush tile payload scratch file")?;
        Ok(StagedTiles {
            entries: self.entries,
            payloads: self.file,
            data_length: self.cursor,
            total_tiles: self.total_tiles,
            unique_tiles: self.unique_tiles,
        })
    }
}

pub struct StagedTiles {
    pub entries: Vec<Entry>,
    pub payloads: NamedTempFile,
    pub data_length: u64,
    pub total_tiles: u64,
    pub unique_tiles: u64,
}
