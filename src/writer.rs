//! Archive writer: streams header, root, metadata, leaves, and tile
//! payloads to the output file in one forward pass with no seek-backs.
//!
//! All section sizes are known before the first byte is written: the
//! caller has already run the tile stager and the directory planner to
//! completion, so the header can be built up front instead of reserved and
//! rewritten.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};

use crate::header::Header;
use crate::planner::PlannedDirectories;

/// Writes a complete archive. `tile_payloads` must be positioned at the
/// start of the scratch file's unique-payload bytes.
pub fn write_archive(
    output: &mut File,
    header: &Header,
    planned: &PlannedDirectories,
    metadata_bytes: &[u8],
    tile_payloads: &mut impl std::io::Read,
) -> Result<()> {
    let mut out = BufWriter::new(output);

    out.write_all(&header.to_bytes())
        .context("write archive header")?;
    out.write_all(&planned.root).context("write root directory")?;
    out.write_all(metadata_bytes).context("write metadata blob")?;
    out.write_all(&planned.leaves).context("write leaves section")?;
    std::io::copy(tile_payloads, &mut out).context("stream tile payloads")?;

    out.flush().context("flush archive output")?;
    Ok(())
}
