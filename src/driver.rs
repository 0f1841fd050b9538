//! Orchestrates the conversion: the four phases named in the driver design
//! (indexing, staging, metadata, planning + writing) wired up against a real
//! input database and output file.

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::dedup::TileStager;
use crate::error::PmtError;
use crate::header::Header;
use crate::planner::plan;
use crate::progress::progress_for_phase;
use crate::source::{fetch_tile, flip_row, index_tile_ids, open_readonly, parse_metadata, read_metadata_table};
use crate::tile_id::id_to_zxy;
use crate::writer::write_archive;

pub struct ConvertOptions {
    pub show_progress: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { show_progress: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertStats {
    pub total_tiles: u64,
    pub total_entries: u64,
    pub unique_tiles: u64,
    pub root_bytes: usize,
    pub leaf_bytes: usize,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub elapsed: std::time::Duration,
}

/// Converts `input` (an mbtiles-style SQLite archive) into a single PMTiles
/// archive at `output`. The output path is never touched until the whole
/// archive is ready: the archive is assembled in a sibling temp file and
/// renamed into place on success, so a failed run leaves no partial file.
pub fn convert_mbtiles_to_pmtiles(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> Result<ConvertStats> {
    let started = Instant::now();
    let conn = open_readonly(input)?;

    // Phase 1: indexing.
    let mut indexing_progress = progress_for_phase("indexing tiles", 0, false, !options.show_progress);
    let ids = index_tile_ids(&conn).context("index input tile ids")?;
    if let Some(p) = indexing_progress.take() {
        p.finish();
    }
    tracing::info!(tiles = ids.len(), "indexed input archive");

    // Phase 2: staging (dedup + RLE).
    let mut stager = TileStager::new().context("create tile stager")?;
    let mut min_zoom = u8::MAX;
    let mut max_zoom = 0u8;
    let mut staging_progress =
        progress_for_phase("staging tiles", ids.len() as u64, true, !options.show_progress);
    for id in &ids {
        let (z, x, y) = id_to_zxy(*id);
        min_zoom = min_zoom.min(z);
        max_zoom = max_zoom.max(z);
        let y_db = flip_row(z, y);
        let data = fetch_tile(&conn, z, x, y_db)
            .map_err(|_| PmtError::MissingRow { id: *id })
            .with_context(|| format!("re-read tile z={z} x={x} y_db={y_db}"))?;
        stager.push(*id, &data).context("stage tile payload")?;
        if let Some(p) = staging_progress.as_mut() {
            p.inc(1);
        }
    }
    if let Some(p) = staging_progress.take() {
        p.finish();
    }
    if ids.is_empty() {
        min_zoom = 0;
    }
    let staged = stager.finish().context("finish tile staging")?;
    tracing::info!(
        total = staged.total_tiles,
        unique = staged.unique_tiles,
        entries = staged.entries.len(),
        "deduplicated tile payloads"
    );

    // Phase 3: metadata.
    let raw_metadata = read_metadata_table(&conn).context("read metadata table")?;
    let parsed = parse_metadata(raw_metadata);
    let metadata_bytes = serde_json::to_vec(&Value::Object(parsed.blob.clone().into_iter().collect()))
        .context("serialize metadata blob")?;

    // Phase 4: planning + writing.
    let planned = plan(&staged.entries).context("plan hierarchical directory layout")?;

    let mut header = Header {
        root_length: planned.root.len() as u32,
        metadata_length: metadata_bytes.len() as u32,
        total_tiles: staged.total_tiles,
        total_entries: staged.entries.len() as u64,
        unique_tiles: staged.unique_tiles,
        min_zoom: parsed.min_zoom.unwrap_or(min_zoom),
        max_zoom: parsed.max_zoom.unwrap_or(max_zoom),
        ..Header::default()
    };
    if let Some(format) = &parsed.tile_format {
        header.set_tile_format(format);
    }
    if let Some((min_lon, min_lat, max_lon, max_lat)) = parsed.bounds {
        header.min_lon = min_lon as f32;
        header.min_lat = min_lat as f32;
        header.max_lon = max_lon as f32;
        header.max_lat = max_lat as f32;
    }
    if let Some((lon, lat, zoom)) = parsed.center {
        header.center_lon = lon as f32;
        header.center_lat = lat as f32;
        header.center_zoom = zoom;
    }

    let output_dir = output.parent().filter(|p| !p.as_os_str().is_empty());
    let mut staging_file = match output_dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir),
        None => tempfile::NamedTempFile::new(),
    }
    .context("create output staging file")?;

    let mut payloads = staged.payloads.reopen().context("reopen tile payload scratch file")?;
    {
        let file: &mut File = staging_file.as_file_mut();
        write_archive(file, &header, &planned, &metadata_bytes, &mut payloads)
            .context("write archive contents")?;
    }
    staging_file
        .persist(output)
        .map_err(|err| err.error)
        .with_context(|| format!("finalize output archive at {}", output.display()))?;

    Ok(ConvertStats {
        total_tiles: staged.total_tiles,
        total_entries: staged.entries.len() as u64,
        unique_tiles: staged.unique_tiles,
        root_bytes: planned.root.len(),
        leaf_bytes: planned.leaves.len(),
        min_zoom: header.min_zoom,
        max_zoom: header.max_zoom,
        elapsed: started.elapsed(),
    })
}
