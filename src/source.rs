//! Reading the input archive database: an ordered cursor over
//! `(z, x, y, tile_data)` rows plus the `metadata` key/value table.
//!
//! Treated as an external collaborator by the spec, but something has to
//! implement it — this follows the read-only, pragma-tuned connection
//! pattern used elsewhere in this codebase for bulk, read-mostly scans.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;

use crate::tile_id::zxy_to_id;

pub fn open_readonly(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open input archive: {}", path.display()))?;
    apply_read_pragmas(&conn)?;
    Ok(conn)
}

fn apply_read_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA query_only = ON;
        PRAGMA temp_store = MEMORY;
        PRAGMA synchronous = OFF;
        PRAGMA cache_size = -204800;
        ",
    )
    .context("apply read pragmas")?;
    Ok(())
}

/// Phase 1: scans the `tiles` table and returns the set of Hilbert tile
/// IDs addressed by the archive, with the bottom-origin row convention
/// flipped to the canonical top-origin one on the way in.
pub fn index_tile_ids(conn: &Connection) -> Result<BTreeSet<u64>> {
    let mut stmt = conn
        .prepare("SELECT zoom_level, tile_column, tile_row FROM tiles")
        .context("prepare tile index scan")?;
    let mut rows = stmt.query([]).context("query tile index scan")?;

    let mut ids = BTreeSet::new();
    while let Some(row) = rows.next().context("read tile index row")? {
        let z: u8 = row.get(0).context("read zoom_level")?;
        let x: u32 = row.get(1).context("read tile_column")?;
        let y_db: u32 = row.get(2).context("read tile_row")?;
        let y = flip_row(z, y_db);
        let id = zxy_to_id(z, x, y).with_context(|| format!("index row z={z} x={x} y_db={y_db}"))?;
        ids.insert(id);
    }
    Ok(ids)
}

/// `y = (2^z - 1) - y_db`: bottom-origin to top-origin row conversion.
pub fn flip_row(z: u8, y: u32) -> u32 {
    ((1u64 << z) - 1 - y as u64) as u32
}

/// Phase 2 point lookup: fetches the payload for a single `(z, x, y_db)`
/// row, reverse-mapped from a tile ID discovered in phase 1.
pub fn fetch_tile(conn: &Connection, z: u8, x: u32, y_db: u32) -> Result<Vec<u8>> {
    conn.query_row(
        "SELECT tile_data FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
        (z, x, y_db),
        |row| row.get::<_, Vec<u8>>(0),
    )
    .context("fetch tile payload")
}

/// Reads the raw `metadata(name, value)` table; a missing table is not an
/// error, since the input format treats metadata as optional.
pub fn read_metadata_table(conn: &Connection) -> Result<BTreeMap<String, String>> {
    let mut stmt = match conn.prepare("SELECT name, value FROM metadata") {
        Ok(stmt) => stmt,
        Err(err) if err.to_string().contains("no such table") => return Ok(BTreeMap::new()),
        Err(err) => return Err(err).context("prepare metadata query"),
    };
    let mut rows = stmt.query([]).context("query metadata")?;
    let mut metadata = BTreeMap::new();
    while let Some(row) = rows.next().context("read metadata row")? {
        let name: String = row.get(0)?;
        let value: String = row.get(1)?;
        metadata.insert(name, value);
    }
    Ok(metadata)
}

/// The subset of metadata keys that feed directly into the archive header,
/// plus whatever else survives verbatim into the metadata blob.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedMetadata {
    pub tile_format: Option<String>,
    pub center: Option<(f64, f64, u8)>,
    pub bounds: Option<(f64, f64, f64, f64)>,
    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,
    /// Everything that ends up in the metadata blob, including a re-embedded
    /// `json` key when present and parseable.
    pub blob: BTreeMap<String, Value>,
}

/// Applies the recognized-key table: `version`/`compression` are dropped,
/// `format`/`center`/`bounds`/`minzoom`/`maxzoom` are consumed into header
/// fields and do not survive into the blob, `json` is parsed and
/// re-embedded, and anything else is stored verbatim.
pub fn parse_metadata(raw: BTreeMap<String, String>) -> ParsedMetadata {
    let mut parsed = ParsedMetadata::default();

    for (key, value) in raw {
        match key.as_str() {
            "version" | "compression" => {}
            "format" => {
                parsed.tile_format = Some(value);
            }
            "center" => match parse_center(&value) {
                Ok(center) => {
                    parsed.center = Some(center);
                }
                Err(err) => {
                    tracing::warn!(key = "center", %value, error = %err, "failed to parse metadata value");
                }
            },
            "bounds" => match parse_bounds(&value) {
                Ok(bounds) => {
                    parsed.bounds = Some(bounds);
                }
                Err(err) => {
                    tracing::warn!(key = "bounds", %value, error = %err, "failed to parse metadata value");
                }
            },
            "minzoom" => match value.parse::<u8>() {
                Ok(z) => {
                    parsed.min_zoom = Some(z);
                }
                Err(err) => {
                    tracing::warn!(key = "minzoom", %value, error = %err, "failed to parse metadata value");
                }
            },
            "maxzoom" => match value.parse::<u8>() {
                Ok(z) => {
                    parsed.max_zoom = Some(z);
                }
                Err(err) => {
                    tracing::warn!(key = "maxzoom", %value, error = %err, "failed to parse metadata value");
                }
            },
            "json" => match serde_json::from_str::<Value>(&value) {
                Ok(parsed_json) => {
                    parsed.blob.insert(key, parsed_json);
                }
                Err(err) => {
                    tracing::warn!(key = "json", error = %err, "failed to parse metadata json, dropping key");
                }
            },
            other => {
                parsed.blob.insert(other.to_string(), Value::String(value));
            }
        }
    }

    parsed
}

fn parse_center(value: &str) -> Result<(f64, f64, u8)> {
    let parts: Vec<&str> = value.split(',').collect();
    anyhow::ensure!(parts.len() == 3, "expected \"lon,lat,zoom\"");
    let lon: f64 = parts[0].trim().parse().context("parse center lon")?;
    let lat: f64 = parts[1].trim().parse().context("parse center lat")?;
    let zoom: u8 = parts[2].trim().parse().context("parse center zoom")?;
    Ok((lon, lat, zoom))
}

fn parse_bounds(value: &str) -> Result<(f64, f64, f64, f64)> {
    let parts: Vec<&str> = value.split(',').collect();
    anyhow::ensure!(parts.len() == 4, "expected \"minlon,minlat,maxlon,maxlat\"");
    let min_lon: f64 = parts[0].trim().parse().context("parse min_lon")?;
    let min_lat: f64 = parts[1].trim().parse().context("parse min_lat")?;
    let max_lon: f64 = parts[2].trim().parse().context("parse max_lon")?;
    let max_lat: f64 = parts[3].trim().parse().context("parse max_lat")?;
    Ok((min_lon, min_lat, max_lon, max_lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_flip_is_its_own_inverse() {
        for z in 0..10u8 {
            let max_y = (1u32 << z) - 1;
            for y in [0, max_y / 2, max_y] {
                assert_eq!(flip_row(z, flip_row(z, y)), y);
            }
        }
    }

    #[test]
    fn recognized_keys_populate_header_fields_and_are_consumed_out_of_the_blob() {
        let mut raw = BTreeMap::new();
        raw.insert("version".to_string(), "2".to_string());
        raw.insert("compression".to_string(), "gzip".to_string());
        raw.insert("format".to_string(), "pbf".to_string());
        raw.insert("center".to_string(), "-122.4,37.7,10".to_string());
        raw.insert("bounds".to_string(), "-123.0,37.0,-122.0,38.0".to_string());
        raw.insert("minzoom".to_string(), "0".to_string());
        raw.insert("maxzoom".to_string(), "14".to_string());
        raw.insert("attribution".to_string(), "(c) someone".to_string());
        raw.insert("json".to_string(), r#"{"vector_layers":[]}"#.to_string());

        let parsed = parse_metadata(raw);
        assert_eq!(parsed.tile_format.as_deref(), Some("pbf"));
        assert_eq!(parsed.center, Some((-122.4, 37.7, 10)));
        assert_eq!(parsed.bounds, Some((-123.0, 37.0, -122.0, 38.0)));
        assert_eq!(parsed.min_zoom, Some(0));
        assert_eq!(parsed.max_zoom, Some(14));
        assert!(!parsed.blob.contains_key("version"));
        assert!(!parsed.blob.contains_key("compression"));
        assert!(!parsed.blob.contains_key("format"));
        assert!(!parsed.blob.contains_key("center"));
        assert!(!parsed.blob.contains_key("bounds"));
        assert!(!parsed.blob.contains_key("minzoom"));
        assert!(!parsed.blob.contains_key("maxzoom"));
        assert_eq!(parsed.blob["attribution"], Value::String("(c) someone".into()));
        assert!(parsed.blob["json"].is_object());
    }

    #[test]
    fn malformed_json_key_is_dropped_not_fatal() {
        let mut raw = BTreeMap::new();
        raw.insert("json".to_string(), "{not json".to_string());
        let parsed = parse_metadata(raw);
        assert!(!parsed.blob.contains_key("json"));
    }
}
