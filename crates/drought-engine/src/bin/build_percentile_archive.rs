//! Build the derived archive cubes from the raw ones.
//!
//! For every index with a raw cube, writes the percentile-space cube and,
//! with `--with-equal-area`, the equal-area cube used by area statistics.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use drought_common::{DroughtIndex, GridSpec, ValueSpace};
use drought_engine::dataset::cube_path;
use drought_engine::reduce::build_percentile_cube;
use drought_engine::reprojection::build_equal_area_cube;
use drought_engine::{
    ArchiveStore, CubeWriter, EngineConfig, EngineError, FilesystemArchive, GridIndexStore, StoredAdminRasters,
    ZarrCompression,
};

#[derive(Parser, Debug)]
#[command(name = "build-percentile-archive")]
#[command(about = "Derive percentile and equal-area cubes from the raw archive")]
struct Args {
    /// Archive root (`<root>/raw/<index>.zarr`)
    #[arg(long, env = "DROUGHT_ARCHIVE_DIR")]
    archive_dir: Option<PathBuf>,

    /// Indices to process (default: every catalogued index)
    #[arg(short, long)]
    index: Vec<String>,

    /// Also write the equal-area cubes
    #[arg(long)]
    with_equal_area: bool,

    /// Time steps per chunk
    #[arg(long, env = "DROUGHT_TIME_CHUNK")]
    time_chunk: Option<usize>,

    /// Compression (none, lz4, zstd)
    #[arg(long, env = "DROUGHT_COMPRESSION")]
    compression: Option<String>,

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
    if let Some(dir) = args.archive_dir {
        config.archive_dir = dir;
    }
    if let Some(chunk) = args.time_chunk {
        config.time_chunk = chunk;
    }
    if let Some(compression) = &args.compression {
        config.compression = ZarrCompression::from_str(compression);
    }
    config.validate().map_err(anyhow::Error::msg)?;

    let indices: Vec<DroughtIndex> = if args.index.is_empty() {
        DroughtIndex::ALL.to_vec()
    } else {
        args.index
            .iter()
            .map(|name| name.parse::<DroughtIndex>())
            .collect::<Result<_, _>>()?
    };

    let equal_area: Option<GridSpec> = if args.with_equal_area {
        let rasterizer = StoredAdminRasters::new(config.grid_index_dir.clone());
        let elements = GridIndexStore::new(config.grid_index_dir.clone(), config.equal_area_cell_m)
            .elements(config.resolution, &rasterizer)
            .context("loading grid index for the equal-area template")?;
        Some(elements.equal_area_template)
    } else {
        None
    };

    let archive = FilesystemArchive::new(config.archive_dir.clone(), config.chunk_cache_size_bytes());
    let writer = CubeWriter::from_config(&config);

    let mut built = 0usize;
    for index in indices {
        let raw = match archive.open(index, ValueSpace::Raw) {
            Ok(cube) => cube,
            Err(EngineError::MissingArtifact(msg)) => {
                warn!(index = %index, reason = %msg, "No raw cube, skipping");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let dest = cube_path(&config.archive_dir, index, ValueSpace::Percentile);
        let result = build_percentile_cube(raw.as_ref(), &writer, &dest)
            .with_context(|| format!("building percentile cube for {}", index))?;
        info!(index = %index, bytes = result.bytes_written, chunks = result.num_chunks, "Wrote percentile cube");

        if let Some(target) = &equal_area {
            let dest = cube_path(&config.archive_dir, index, ValueSpace::EqualAreaProjected);
            let result = build_equal_area_cube(raw.as_ref(), target, &writer, &dest)
                .with_context(|| format!("building equal-area cube for {}", index))?;
            info!(index = %index, bytes = result.bytes_written, "Wrote equal-area cube");
        }

        built += 1;
    }

    info!(indices = built, archive = %config.archive_dir.display(), "Archive build complete");
    Ok(())
}
