use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pmtiles-convert",
    version,
    about = "Converts an mbtiles-style tile archive into a single PMTiles archive file"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (error|warn|info|debug|trace).
    #[arg(long, default_value = "info", global = true)]
    pub log: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert an mbtiles archive into a PMTiles archive.
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Input mbtiles-style SQLite archive.
    pub input: PathBuf,

    /// Output PMTiles archive path.
    pub output: PathBuf,

    /// Disable the progress bar (useful for non-interactive logs).
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}
