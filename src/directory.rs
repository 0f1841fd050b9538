//! Directory entries and their column-oriented varint serialization.

use anyhow::{Context, Result};
use varint_rs::{VarintReader, VarintWriter};

/// One directory entry: `run_length == 0` marks a leaf-directory pointer
/// (its `offset`/`length` locate a child directory in the leaves section
/// rather than a tile payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: u64,
    pub offset: u64,
    pub length: u32,
    pub run_length: u32,
}

impl Entry {
    pub fn is_leaf_pointer(&self) -> bool {
        self.run_length == 0
    }
}

/// Encodes entries as the length-prefixed, delta-encoded, column-oriented
/// layout: entry count, ID-delta column, run-length column, length column,
/// then an offset column using `0` as a contiguous-with-previous sentinel.
pub fn encode_entries(entries: &[Entry]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.write_usize_varint(entries.len())?;

    let mut last_id = 0u64;
    for entry in entries {
        buf.write_u64_varint(entry.id - last_id)?;
        last_id = entry.id;
    }

    for entry in entries {
        buf.write_u32_varint(entry.run_length)?;
    }

    for entry in entries {
        buf.write_u32_varint(entry.length)?;
    }

    for (idx, entry) in entries.iter().enumerate() {
        let contiguous = idx > 0 && {
            let prev = &entries[idx - 1];
            entry.offset == prev.offset + prev.length as u64
        };
        if contiguous {
            buf.write_u64_varint(0)?;
        } else {
            buf.write_u64_varint(entry.offset + 1)?;
        }
    }

    Ok(buf)
}

/// Inverse of [`encode_entries`].
pub fn decode_entries(mut data: &[u8]) -> Result<Vec<Entry>> {
    let n = data.read_usize_varint().context("read entry count")?;
    let mut entries = vec![
        Entry {
            id: 0,
            offset: 0,
            length: 0,
            run_length: 0,
        };
        n
    ];

    let mut next_id = 0u64;
    for entry in entries.iter_mut() {
        next_id += data.read_u64_varint().context("read id delta")?;
        entry.id = next_id;
    }
    for entry in entries.iter_mut() {
        entry.run_length = data.read_u32_varint().context("read run_length")?;
    }
    for entry in entries.iter_mut() {
        entry.length = data.read_u32_varint().context("read length")?;
    }

    let mut prev: Option<Entry> = None;
    for entry in entries.iter_mut() {
        let code = data.read_u64_varint().context("read offset code")?;
        entry.offset = if code == 0 {
            let prev = prev
                .as_ref()
                .context("offset sentinel on the first directory entry")?;
            prev.offset + prev.length as u64
        } else {
            code - 1
        };
        prev = Some(entry.clone());
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entries() -> Vec<Entry> {
        vec![
            Entry {
                id: 0,
                offset: 0,
                length: 10,
                run_length: 1,
            },
            Entry {
                id: 1,
                offset: 10,
                length: 20,
                run_length: 3,
            },
            Entry {
                id: 5,
                offset: 0,
                length: 10,
                run_length: 1,
            },
        ]
    }

    #[test]
    fn round_trips_mixed_contiguous_and_shared_offsets() {
        let entries = sample_entries();
        let bytes = encode_entries(&entries).unwrap();
        let decoded = decode_entries(&bytes).unwrap();
        assert_eq!(entries, decoded);
    }

    #[test]
    fn round_trips_a_single_entry() {
        let entries = vec![Entry {
            id: 42,
            offset: 7,
            length: 3,
            run_length: 1,
        }];
        let bytes = encode_entries(&entries).unwrap();
        assert_eq!(decode_entries(&bytes).unwrap(), entries);
    }

    #[test]
    fn round_trips_an_empty_directory() {
        let bytes = encode_entries(&[]).unwrap();
        assert!(decode_entries(&bytes).unwrap().is_empty());
    }

    #[test]
    fn leaf_pointer_entries_keep_their_zero_run_length() {
        let entries = vec![Entry {
            id: 100,
            offset: 512,
            length: 64,
            run_length: 0,
        }];
        let decoded = decode_entries(&encode_entries(&entries).unwrap()).unwrap();
        assert!(decoded[0].is_leaf_pointer());
    }
}
