//! Build the persisted grid index for one or more resolutions.
//!
//! Reads the rasterized county/state fips layers and the admin table from
//! the admin directory, derives land mask, grid ids, gradient and the
//! equal-area template, and writes `grid_index_<res>.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use drought_engine::{EngineConfig, GridIndexStore, StoredAdminRasters};

#[derive(Parser, Debug)]
#[command(name = "build-grid-index")]
#[command(about = "Build grid index artifacts from rasterized admin layers")]
struct Args {
    /// Output directory for grid index artifacts
    #[arg(long, env = "DROUGHT_GRID_INDEX_DIR")]
    grid_index_dir: Option<PathBuf>,

    /// Directory holding county_fips.zarr, state_fips.zarr and admin_table.json
    /// (defaults to the grid index directory)
    #[arg(long, env = "DROUGHT_ADMIN_DIR")]
    admin_dir: Option<PathBuf>,

    /// Grid resolution in degrees; repeat for several
    #[arg(short, long)]
    resolution: Vec<f64>,

    /// Equal-area cell size in meters
    #[arg(long, env = "DROUGHT_EQUAL_AREA_CELL_M")]
    equal_area_cell_m: Option<f64>,

    /// Rebuild even when an index already exists
    #[arg(long)]
    force: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let mut config = EngineConfig::from_env();
    if let Some(dir) = args.grid_index_dir {
        config.grid_index_dir = dir;
    }
    if let Some(cell) = args.equal_area_cell_m {
        config.equal_area_cell_m = cell;
    }
    config.validate().map_err(anyhow::Error::msg)?;

    let resolutions = if args.resolution.is_empty() {
        vec![config.resolution]
    } else {
        args.resolution
    };

    let admin_dir = args.admin_dir.unwrap_or_else(|| config.grid_index_dir.clone());
    let rasterizer = StoredAdminRasters::new(admin_dir);
    let store = GridIndexStore::new(config.grid_index_dir.clone(), config.equal_area_cell_m);

    for resolution in resolutions {
        let built = if args.force {
            store.rebuild(resolution, &rasterizer)
        } else {
            store.elements(resolution, &rasterizer)
        };
        let elements = built.with_context(|| format!("building grid index at {} degrees", resolution))?;

        info!(
            resolution = resolution,
            path = %store.path_for(resolution).display(),
            land_cells = elements.lookup().len(),
            equal_area_cols = elements.equal_area_template.nx,
            equal_area_rows = elements.equal_area_template.ny,
            "Grid index ready"
        );
    }

    Ok(())
}
