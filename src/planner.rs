//! Hierarchical directory planner: chooses a single root directory, or a
//! root of leaf pointers plus a leaves section, so the root stays inside a
//! byte budget cheap enough to prefetch alongside the header.

use anyhow::Result;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

use crate::directory::{Entry, decode_entries, encode_entries};
use crate::error::PmtError;

/// Root directory budget: a header-plus-root prefetch must fit one typical
/// small range request. This is the literal figure the format commits to,
/// not a value recomputed from the header size.
pub const ROOT_BUDGET: usize = 16_301;

/// The candidate leaf sizes the reference builder probes, in order; the
/// planner returns the first that makes the root fit, rather than keeping
/// only the result of the final probe.
const LEAF_SIZE_PROBES: [usize; 3] = [4096, 8192, 16384];

pub struct PlannedDirectories {
    pub root: Vec<u8>,
    pub leaves: Vec<u8>,
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Gzip-compresses `entries` as a single directory blob.
pub fn compress_directory(entries: &[Entry]) -> Result<Vec<u8>> {
    gzip(&encode_entries(entries)?)
}

/// Builds a root-of-leaf-pointers plus a leaves section for the given leaf
/// size, returning `None` if the resulting root still exceeds the budget.
fn try_leaf_size(entries: &[Entry], leaf_size: usize) -> Result<Option<PlannedDirectories>> {
    let mut leaves = Vec::new();
    let mut root_entries = Vec::with_capacity(entries.len().div_ceil(leaf_size));

    for chunk in entries.chunks(leaf_size) {
        let blob = compress_directory(chunk)?;
        root_entries.push(Entry {
            id: chunk[0].id,
            offset: leaves.len() as u64,
            length: blob.len() as u32,
            run_length: 0,
        });
        leaves.extend_from_slice(&blob);
    }

    let root = compress_directory(&root_entries)?;
    if root.len() <= ROOT_BUDGET {
        Ok(Some(PlannedDirectories { root, leaves }))
    } else {
        Ok(None)
    }
}

/// Picks a single root directory if it fits the budget; otherwise splits
/// into leaves, probing [`LEAF_SIZE_PROBES`] and then geometrically growing
/// the leaf size until the root fits.
pub fn plan(entries: &[Entry]) -> Result<PlannedDirectories> {
    let whole_root = compress_directory(entries)?;
    if whole_root.len() <= ROOT_BUDGET {
        return Ok(PlannedDirectories {
            root: whole_root,
            leaves: Vec::new(),
        });
    }

    for &leaf_size in &LEAF_SIZE_PROBES {
        if let Some(planned) = try_leaf_size(entries, leaf_size)? {
            return Ok(planned);
        }
    }

    let mut leaf_size = *LEAF_SIZE_PROBES.last().unwrap();
    loop {
        leaf_size += leaf_size / 5 + 1;
        if let Some(planned) = try_leaf_size(entries, leaf_size)? {
            return Ok(planned);
        }
        if leaf_size > entries.len().max(1) {
            let size = try_leaf_size(entries, leaf_size)?
                .map(|p| p.root.len())
                .unwrap_or(usize::MAX);
            return Err(PmtError::RootBudgetExceeded {
                size,
                budget: ROOT_BUDGET,
            }
            .into());
        }
    }
}

/// Decodes a root directory, following leaf pointers via `resolve_leaf` to
/// reconstruct the full, flattened entry list. Used by tests to verify a
/// plan round-trips back to the original entries.
pub fn flatten(root: &[u8], resolve_leaf: impl Fn(u64, u32) -> Result<Vec<u8>>) -> Result<Vec<Entry>> {
    let root_entries = decode_entries(root)?;
    if root_entries.iter().all(|e| !e.is_leaf_pointer()) {
        return Ok(root_entries);
    }
    let mut flattened = Vec::new();
    for pointer in root_entries {
        let blob = resolve_leaf(pointer.offset, pointer.length)?;
        flattened.extend(decode_entries(&blob)?);
    }
    Ok(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_entries(n: u64) -> Vec<Entry> {
        (0..n)
            .map(|id| Entry {
                id,
                offset: id * 4,
                length: 4,
                run_length: 1,
            })
            .collect()
    }

    #[test]
    fn small_directories_need_no_leaves() {
        let entries = linear_entries(10);
        let planned = plan(&entries).unwrap();
        assert!(planned.leaves.is_empty());
        assert_eq!(decode_entries(&planned.root).unwrap(), entries);
    }

    #[test]
    fn large_directories_split_into_leaves_with_pointer_sentinels() {
        let entries = linear_entries(200_000);
        let planned = plan(&entries).unwrap();
        assert!(!planned.leaves.is_empty());
        assert!(planned.root.len() <= ROOT_BUDGET);

        let root_entries = decode_entries(&planned.root).unwrap();
        assert!(root_entries.iter().all(|e| e.run_length == 0));

        let leaves = planned.leaves.clone();
        let flattened = flatten(&planned.root, |offset, length| {
            Ok(leaves[offset as usize..offset as usize + length as usize].to_vec())
        })
        .unwrap();
        assert_eq!(flattened, entries);
    }

    #[test]
    fn root_never_exceeds_budget() {
        let entries = linear_entries(500_000);
        let planned = plan(&entries).unwrap();
        assert!(planned.root.len() <= ROOT_BUDGET);
    }
}
