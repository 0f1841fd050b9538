use anyhow::Result;
use clap::Parser;

use pmtiles_build::cli::{Cli, Command};
use pmtiles_build::driver::{ConvertOptions, convert_mbtiles_to_pmtiles};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match cli.command {
        Command::Convert(args) => {
            let options = ConvertOptions {
                show_progress: !args.no_progress,
            };
            let stats = convert_mbtiles_to_pmtiles(&args.input, &args.output, &options)?;
            tracing::info!(
                total_tiles = stats.total_tiles,
                total_entries = stats.total_entries,
                unique_tiles = stats.unique_tiles,
                root_bytes = stats.root_bytes,
                leaf_bytes = stats.leaf_bytes,
                min_zoom = stats.min_zoom,
                max_zoom = stats.max_zoom,
                elapsed_ms = stats.elapsed.as_millis() as u64,
                "conversion complete"
            );
        }
    }

    Ok(())
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
