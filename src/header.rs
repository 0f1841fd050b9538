//! The fixed-size archive header.
//!
//! The field table below ends at byte 83, but the spec-version-3 reader
//! ecosystem assumes a fixed 127-byte header region (the reference
//! converter's own 83-byte header is the open question flagged in its
//! design notes); this crate writes 127 bytes, zero-padding bytes
//! `83..127`, and starts the root directory at byte 127.

use anyhow::{Context, Result};

use crate::error::PmtError;

pub const MAGIC: &[u8; 2] = b"PM";
pub const SPEC_VERSION: u8 = 3;
pub const HEADER_SIZE: usize = 127;
const FIELD_TABLE_END: usize = 83;

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub root_length: u32,
    pub metadata_length: u32,
    pub total_tiles: u64,
    pub total_entries: u64,
    pub unique_tiles: u64,
    pub index_compression: [u8; 10],
    pub clustered: u8,
    pub tile_format: [u8; 10],
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub min_lon: f32,
    pub min_lat: f32,
    pub max_lon: f32,
    pub max_lat: f32,
    pub center_zoom: u8,
    pub center_lon: f32,
    pub center_lat: f32,
}

fn ascii_field(value: &str) -> [u8; 10] {
    let mut field = [0u8; 10];
    let bytes = value.as_bytes();
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

fn ascii_field_to_string(field: &[u8; 10]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

impl Header {
    pub fn index_compression_str(&self) -> String {
        ascii_field_to_string(&self.index_compression)
    }

    pub fn tile_format_str(&self) -> String {
        ascii_field_to_string(&self.tile_format)
    }

    pub fn set_tile_format(&mut self, format: &str) {
        self.tile_format = ascii_field(format);
    }

    /// Serializes the header to exactly [`HEADER_SIZE`] bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..2].copy_from_slice(MAGIC);
        buf[2] = SPEC_VERSION;
        buf[3..7].copy_from_slice(&self.root_length.to_le_bytes());
        buf[7..11].copy_from_slice(&self.metadata_length.to_le_bytes());
        buf[11..19].copy_from_slice(&self.total_tiles.to_le_bytes());
        buf[19..27].copy_from_slice(&self.total_entries.to_le_bytes());
        buf[27..35].copy_from_slice(&self.unique_tiles.to_le_bytes());
        buf[35..45].copy_from_slice(&self.index_compression);
        buf[45] = self.clustered;
        buf[46..56].copy_from_slice(&self.tile_format);
        buf[56] = self.min_zoom;
        buf[57] = self.max_zoom;
        buf[58..62].copy_from_slice(&self.min_lon.to_le_bytes());
        buf[62..66].copy_from_slice(&self.min_lat.to_le_bytes());
        buf[66..70].copy_from_slice(&self.max_lon.to_le_bytes());
        buf[70..74].copy_from_slice(&self.max_lat.to_le_bytes());
        buf[74] = self.center_zoom;
        buf[75..79].copy_from_slice(&self.center_lon.to_le_bytes());
        buf[79..83].copy_from_slice(&self.center_lat.to_le_bytes());
        debug_assert!(buf[FIELD_TABLE_END..].iter().all(|&b| b == 0));
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        anyhow::ensure!(
            buf.len() >= HEADER_SIZE,
            "header too short: {} bytes",
            buf.len()
        );
        anyhow::ensure!(&buf[0..2] == MAGIC, "bad magic: expected \"PM\"");
        let version = buf[2];
        if version != SPEC_VERSION {
            return Err(PmtError::MalformedHeader(format!(
                "unsupported spec version {version}"
            ))
            .into());
        }

        let u32_at = |range: std::ops::Range<usize>| -> u32 {
            u32::from_le_bytes(buf[range].try_into().unwrap())
        };
        let u64_at = |range: std::ops::Range<usize>| -> u64 {
            u64::from_le_bytes(buf[range].try_into().unwrap())
        };
        let f32_at = |range: std::ops::Range<usize>| -> f32 {
            f32::from_le_bytes(buf[range].try_into().unwrap())
        };

        Ok(Header {
            root_length: u32_at(3..7),
            metadata_length: u32_at(7..11),
            total_tiles: u64_at(11..19),
            total_entries: u64_at(19..27),
            unique_tiles: u64_at(27..35),
            index_compression: buf[35..45].try_into().unwrap(),
            clustered: buf[45],
            tile_format: buf[46..56].try_into().unwrap(),
            min_zoom: buf[56],
            max_zoom: buf[57],
            min_lon: f32_at(58..62),
            min_lat: f32_at(62..66),
            max_lon: f32_at(66..70),
            max_lat: f32_at(70..74),
            center_zoom: buf[74],
            center_lon: f32_at(75..79),
            center_lat: f32_at(79..83),
        })
    }
}

impl Default for Header {
    fn default() -> Self {
        Header {
            root_length: 0,
            metadata_length: 0,
            total_tiles: 0,
            total_entries: 0,
            unique_tiles: 0,
            index_compression: ascii_field("gzip"),
            clustered: 1,
            tile_format: ascii_field(""),
            min_zoom: 0,
            max_zoom: 0,
            min_lon: 0.0,
            min_lat: 0.0,
            max_lon: 0.0,
            max_lat: 0.0,
            center_zoom: 0,
            center_lon: 0.0,
            center_lat: 0.0,
        }
    }
}

pub fn read_header(reader: &mut impl std::io::Read) -> Result<Header> {
    let mut buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut buf).context("read archive header")?;
    Header::from_bytes(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let mut header = Header {
            root_length: 123,
            metadata_length: 456,
            total_tiles: 10,
            total_entries: 7,
            unique_tiles: 5,
            min_zoom: 0,
            max_zoom: 14,
            min_lon: -122.5,
            min_lat: 37.0,
            max_lon: -122.0,
            max_lat: 37.5,
            center_zoom: 10,
            center_lon: -122.25,
            center_lat: 37.25,
            ..Header::default()
        };
        header.set_tile_format("pbf");

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..2], b"PM");
        assert_eq!(bytes[2], SPEC_VERSION);
        assert_eq!(bytes[45], 1);

        let decoded = Header::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.tile_format_str(), "pbf");
        assert_eq!(decoded.index_compression_str(), "gzip");
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Header::default().to_bytes();
        bytes[0] = b'X';
        assert!(Header::from_bytes(&bytes).is_err());
    }
}
