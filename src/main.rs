//! compact-cache - inspect and extract Esri compact V2 tile caches.

use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use compact_cache::{
    config::{Cli, Command, ExtractConfig, GlobalOptions, InfoConfig},
    CompactCacheDataset,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.global.verbose);

    if let Err(e) = cli.global.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match cli.command {
        Command::Info(config) => run_info(&cli.global, config),
        Command::Extract(config) => run_extract(&cli.global, config),
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "compact_cache=debug"
    } else {
        "compact_cache=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Info Command
// =============================================================================

#[derive(Serialize)]
struct InfoReport {
    root: String,
    tile_format: &'static str,
    packet_size: u32,
    width: u32,
    height: u32,
    block_width: u32,
    block_height: u32,
    bands: Vec<&'static str>,
    geo_transform: [f64; 6],
    spatial_ref: String,
    levels: Vec<LevelReport>,
}

#[derive(Serialize)]
struct LevelReport {
    level: usize,
    storage_level: u32,
    width: u32,
    height: u32,
    blocks_x: u32,
    blocks_y: u32,
    resolution: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<f64>,
}

fn run_info(global: &GlobalOptions, config: InfoConfig) -> ExitCode {
    let dataset = match CompactCacheDataset::open_with_options(&config.path, global.dataset_options())
    {
        Ok(dataset) => dataset,
        Err(e) => {
            error!("Failed to open {}: {}", config.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let (width, height) = dataset.raster_size();
    let (block_width, block_height) = dataset.block_size();
    let report = InfoReport {
        root: dataset.root().display().to_string(),
        tile_format: dataset.tile_format().name(),
        packet_size: dataset.info().packet_size,
        width,
        height,
        block_width,
        block_height,
        bands: (1..=dataset.band_count())
            .filter_map(|b| dataset.band(b, 0).ok())
            .map(|b| b.color_interp.name())
            .collect(),
        geo_transform: dataset.geo_transform(),
        spatial_ref: dataset.spatial_ref().to_string(),
        levels: (0..dataset.level_count())
            .filter_map(|l| dataset.level(l).ok())
            .map(|l| LevelReport {
                level: l.level,
                storage_level: l.storage_level,
                width: l.width,
                height: l.height,
                blocks_x: l.blocks_x(),
                blocks_y: l.blocks_y(),
                resolution: l.resolution,
                scale: l.scale,
            })
            .collect(),
    };

    if config.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&report);
    }

    ExitCode::SUCCESS
}

fn print_report(report: &InfoReport) {
    println!("Cache:        {}", report.root);
    println!("Tile format:  {}", report.tile_format);
    println!("Packet size:  {}", report.packet_size);
    println!("Size:         {} x {}", report.width, report.height);
    println!("Block size:   {} x {}", report.block_width, report.block_height);
    println!("Bands:        {}", report.bands.join(", "));
    println!("GeoTransform: {:?}", report.geo_transform);
    println!("SRS:          {}", report.spatial_ref);
    println!();
    println!(
        "{:>5}  {:>5}  {:>12}  {:>10}  {:>14}",
        "level", "dir", "size", "blocks", "resolution"
    );
    for level in &report.levels {
        println!(
            "{:>5}  {:>5}  {:>12}  {:>10}  {:>14.6}",
            level.level,
            format!("L{:02}", level.storage_level),
            format!("{}x{}", level.width, level.height),
            format!("{}x{}", level.blocks_x, level.blocks_y),
            level.resolution
        );
    }
}

// =============================================================================
// Extract Command
// =============================================================================

fn run_extract(global: &GlobalOptions, config: ExtractConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let mut dataset =
        match CompactCacheDataset::open_with_options(&config.path, global.dataset_options()) {
            Ok(dataset) => dataset,
            Err(e) => {
                error!("Failed to open {}: {}", config.path.display(), e);
                return ExitCode::FAILURE;
            }
        };

    let band_count = dataset.band_count();
    let (width, height) = dataset.block_size();
    let mut interleaved = vec![0u8; width as usize * height as usize * band_count];

    for band in 1..=band_count {
        let block = match dataset.read_block(band, config.level, config.block_x, config.block_y) {
            Ok(block) => block,
            Err(e) => {
                error!(
                    "Failed to read block ({}, {}) at level {}: {}",
                    config.block_x, config.block_y, config.level, e
                );
                return ExitCode::FAILURE;
            }
        };
        for (pixel, sample) in interleaved
            .chunks_exact_mut(band_count)
            .zip(block.iter())
        {
            pixel[band - 1] = *sample;
        }
    }

    let color = if band_count == 4 {
        image::ExtendedColorType::Rgba8
    } else {
        image::ExtendedColorType::Rgb8
    };

    if let Err(e) = image::save_buffer(&config.output, &interleaved, width, height, color) {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        output = %config.output.display(),
        level = config.level,
        block_x = config.block_x,
        block_y = config.block_y,
        "block extracted"
    );
    ExitCode::SUCCESS
}
