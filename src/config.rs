//! Command-line configuration for the `compact-cache` tool.
//!
//! Options can be given as arguments or through environment variables with
//! the `COMPACT_CACHE_` prefix:
//!
//! - `COMPACT_CACHE_BUNDLE_HANDLES` - Open bundles kept per dataset (default: 4)
//! - `COMPACT_CACHE_BLOCK_CACHE_BYTES` - Block cache budget in bytes (default: 64MB)
//!
//! # Example
//!
//! ```text
//! compact-cache info /data/Layers --json
//! compact-cache extract /data/Layers --level 2 --block-x 3 --block-y 1 --output tile.png
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::bundle::DEFAULT_POOL_CAPACITY;
use crate::raster::DatasetOptions;
use crate::tile::DEFAULT_BLOCK_CACHE_CAPACITY;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Reader for Esri compact V2 tile caches.
#[derive(Parser, Debug, Clone)]
#[command(name = "compact-cache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalOptions {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Maximum number of bundle files kept open.
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_POOL_CAPACITY,
        env = "COMPACT_CACHE_BUNDLE_HANDLES"
    )]
    pub bundle_handles: usize,

    /// Byte budget of the decoded block cache.
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_BLOCK_CACHE_CAPACITY,
        env = "COMPACT_CACHE_BLOCK_CACHE_BYTES"
    )]
    pub block_cache_bytes: usize,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the layout of a cache.
    Info(InfoConfig),

    /// Decode one block of every band into a PNG file.
    Extract(ExtractConfig),
}

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Cache directory or its conf.xml.
    pub path: PathBuf,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractConfig {
    /// Cache directory or its conf.xml.
    pub path: PathBuf,

    /// Level to read (0 = full resolution).
    #[arg(long, default_value_t = 0)]
    pub level: usize,

    /// Block column.
    #[arg(long)]
    pub block_x: u32,

    /// Block row.
    #[arg(long)]
    pub block_y: u32,

    /// Output PNG file.
    #[arg(short, long)]
    pub output: PathBuf,
}

impl GlobalOptions {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.bundle_handles == 0 {
            return Err("bundle_handles must be greater than 0".to_string());
        }
        if self.block_cache_bytes == 0 {
            return Err("block_cache_bytes must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Dataset options matching these settings.
    pub fn dataset_options(&self) -> DatasetOptions {
        DatasetOptions {
            pool_capacity: self.bundle_handles,
            block_cache_bytes: self.block_cache_bytes,
            ..DatasetOptions::default()
        }
    }
}

impl ExtractConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.output.extension().map_or(true, |e| !e.eq_ignore_ascii_case("png")) {
            return Err(format!(
                "output must be a .png file, got {}",
                self.output.display()
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
