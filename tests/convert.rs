use std::process::Command;

use rusqlite::Connection;

fn create_sample_mbtiles(path: &std::path::Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "
        CREATE TABLE metadata (name TEXT, value TEXT);
        CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
        ",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO metadata (name, value) VALUES \
         ('format', 'pbf'), ('minzoom', '0'), ('maxzoom', '1'), \
         ('bounds', '-123.0,37.0,-122.0,38.0'), ('center', '-122.5,37.5,1')",
        [],
    )
    .unwrap();

    let rows: [(u8, u32, u32, &[u8]); 5] = [
        (0, 0, 0, b"root-tile"),
        (1, 0, 0, b"shared"),
        (1, 0, 1, b"shared"),
        (1, 1, 0, b"unique-a"),
        (1, 1, 1, b"unique-b"),
    ];
    for (z, x, y_db, data) in rows {
        conn.execute(
            "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![z, x, y_db, data],
        )
        .unwrap();
    }
}

#[test]
fn convert_subcommand_produces_a_well_formed_archive() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mbtiles");
    let output = dir.path().join("out.pmtiles");
    create_sample_mbtiles(&input);

    let status = Command::new(env!("CARGO_BIN_EXE_pmtiles-convert"))
        .args([
            "convert",
            input.to_str().unwrap(),
            output.to_str().unwrap(),
            "--no-progress",
        ])
        .status()
        .expect("run pmtiles-convert");
    assert!(status.success());

    let bytes = std::fs::read(&output).unwrap();
    assert_eq!(&bytes[0..2], b"PM", "header must start with the PM magic");
    assert_eq!(bytes[2], 3, "spec version must be 3");
    assert_eq!(bytes[45], 1, "clustered flag must be set");
    assert!(bytes.len() > 127, "archive must contain more than a bare header");
}

#[test]
fn convert_subcommand_fails_cleanly_on_a_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pmtiles");

    let status = Command::new(env!("CARGO_BIN_EXE_pmtiles-convert"))
        .args([
            "convert",
            dir.path().join("nope.mbtiles").to_str().unwrap(),
            output.to_str().unwrap(),
        ])
        .status()
        .expect("run pmtiles-convert");
    assert!(!status.success());
    assert!(!output.exists());
}
