//! On-disk deployment fixture shared by the service tests.
//!
//! Builds a CONUS grid at 1 degree with a block of synthetic counties,
//! the admin artifacts, raw/percentile/equal-area cubes for a few indices
//! and the persisted grid index, all inside a temp directory.

#![allow(dead_code)]

use std::path::PathBuf;

use drought_common::grid::grids;
use drought_common::time::monthly_series;
use drought_common::{DroughtIndex, GridSpec, ValueSpace};
use drought_engine::dataset::{cube_path, FILL_SENTINEL};
use drought_engine::grid_index::AdminUnit;
use drought_engine::reduce::build_percentile_cube;
use drought_engine::reprojection::build_equal_area_cube;
use drought_engine::writer::write_raster_2d;
use drought_engine::{
    ArchiveStore, CubeMeta, CubeWriter, EngineConfig, FilesystemArchive, GridIndexStore, MemoryCube,
    StoredAdminRasters, ZarrCompression,
};
use test_utils::create_index_cube;

pub const RESOLUTION: f64 = 1.0;
pub const EQUAL_AREA_CELL_M: f64 = 100_000.0;
pub const STEPS: usize = 24;

/// Land block: rows 5..25, cols 10..60.
pub const LAND_ROWS: std::ops::Range<usize> = 5..25;
pub const LAND_COLS: std::ops::Range<usize> = 10..60;

pub struct Deployment {
    pub dir: tempfile::TempDir,
    pub config: EngineConfig,
    pub grid: GridSpec,
}

impl Deployment {
    pub fn archive_dir(&self) -> PathBuf {
        self.config.archive_dir.clone()
    }
}

/// State fips 10-14 by column band, four counties per state by row band.
pub fn county_at(row: usize, col: usize) -> Option<u32> {
    if !LAND_ROWS.contains(&row) || !LAND_COLS.contains(&col) {
        return None;
    }
    let state = 10 + (col - LAND_COLS.start) as u32 / 10;
    let county = 1 + (row - LAND_ROWS.start) as u32 / 5;
    Some(state * 1000 + county * 2 - 1)
}

fn admin_units() -> Vec<AdminUnit> {
    let mut units = Vec::new();
    for state in 10..15u32 {
        for county in 1..5u32 {
            let code = county * 2 - 1;
            units.push(AdminUnit {
                fips: state * 1000 + code,
                state_fips: state,
                county: format!("County {:03}", code),
                state: format!("State {}", state),
                state_abbr: format!("S{}", state),
                place: format!("County {:03}, S{}", code, state),
            });
        }
    }
    units
}

fn cube_meta(index: DroughtIndex, grid: GridSpec) -> CubeMeta {
    CubeMeta {
        index,
        value_space: ValueSpace::Raw,
        grid,
        times: monthly_series(2000, 1, STEPS),
        fill_value: FILL_SENTINEL,
        units: String::new(),
    }
}

/// Raw values: index-like noise on land, NaN over water. EDDI is the
/// negated SPI3 field.
pub fn raw_data(index: DroughtIndex, grid: &GridSpec) -> Vec<f32> {
    let seed = match index {
        DroughtIndex::Pdsi => 1,
        _ => 3,
    };
    let mut data = create_index_cube(grid.nx, grid.ny, STEPS, seed);
    let cells = grid.len();
    for (i, v) in data.iter_mut().enumerate() {
        let cell = grid.cell_of(i % cells);
        if county_at(cell.row, cell.col).is_none() {
            *v = f32::NAN;
        } else {
            match index {
                DroughtIndex::Pdsi => *v *= 2.0,
                DroughtIndex::Eddi3 => *v = -*v,
                _ => {}
            }
        }
    }
    data
}

pub const INDICES: [DroughtIndex; 3] = [DroughtIndex::Pdsi, DroughtIndex::Spi3, DroughtIndex::Eddi3];

pub fn deploy() -> Deployment {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let archive_dir = dir.path().join("archive");
    let index_dir = dir.path().join("grid_index");

    let config = EngineConfig {
        archive_dir: archive_dir.clone(),
        grid_index_dir: index_dir.clone(),
        resolution: RESOLUTION,
        chunk_cache_size_mb: 16,
        equal_area_cell_m: EQUAL_AREA_CELL_M,
        time_chunk: 12,
        compression: ZarrCompression::None,
        ..EngineConfig::default()
    };

    let grid = GridSpec::geographic(grids::conus_bbox(), RESOLUTION);

    // admin artifacts
    let mut county = vec![f32::NAN; grid.len()];
    let mut state = vec![f32::NAN; grid.len()];
    for flat in 0..grid.len() {
        let cell = grid.cell_of(flat);
        if let Some(fips) = county_at(cell.row, cell.col) {
            county[flat] = fips as f32;
            state[flat] = (fips / 1000) as f32;
        }
    }
    write_raster_2d(&index_dir.join("county_fips.zarr"), &grid, &county).unwrap();
    write_raster_2d(&index_dir.join("state_fips.zarr"), &grid, &state).unwrap();
    std::fs::write(
        index_dir.join("admin_table.json"),
        serde_json::to_vec(&admin_units()).unwrap(),
    )
    .unwrap();

    let elements = GridIndexStore::new(index_dir.clone(), EQUAL_AREA_CELL_M)
        .elements(RESOLUTION, &StoredAdminRasters::new(index_dir.clone()))
        .unwrap();

    // cubes
    let writer = CubeWriter::from_config(&config);
    for index in INDICES {
        let meta = cube_meta(index, grid);
        let data = raw_data(index, &grid);
        writer
            .write_cube_to_dir(&cube_path(&archive_dir, index, ValueSpace::Raw), &meta, &data)
            .unwrap();
        let raw = MemoryCube::new(meta, data).unwrap();
        build_percentile_cube(&raw, &writer, &cube_path(&archive_dir, index, ValueSpace::Percentile)).unwrap();
        build_equal_area_cube(
            &raw,
            &elements.equal_area_template,
            &writer,
            &cube_path(&archive_dir, index, ValueSpace::EqualAreaProjected),
        )
        .unwrap();
    }

    // sanity: the archive opens
    let archive = FilesystemArchive::new(archive_dir, 1 << 20);
    archive.open(DroughtIndex::Pdsi, ValueSpace::Raw).unwrap();

    Deployment { dir, config, grid }
}
