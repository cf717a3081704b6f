//! Integration test: write cubes to an on-disk archive and read them back
//! through the accessor.
//!
//! Covers the archive layout, chunked reads across time-chunk boundaries,
//! fill-value translation and the chunk cache.

use std::path::Path;
use std::sync::Arc;

use drought_common::time::monthly_series;
use drought_common::{BoundingBox, DroughtIndex, GridCell, GridSpec, MonthSet, StaticCatalog, TimeFilter, ValueSpace};
use drought_engine::dataset::{cube_path, FILL_SENTINEL};
use drought_engine::reduce::{build_percentile_cube, reduce_mean, series};
use drought_engine::{
    ArchiveStore, CubeMeta, CubeWriter, DatasetAccessor, EngineError, FilesystemArchive, Selection, ZarrCompression,
};
use test_utils::{assert_approx_eq, create_positional_cube};

const WIDTH: usize = 4;
const HEIGHT: usize = 3;
const STEPS: usize = 14;

fn grid() -> GridSpec {
    GridSpec::geographic(BoundingBox::new(-104.0, 37.0, -100.0, 40.0), 1.0)
}

fn meta(index: DroughtIndex, space: ValueSpace) -> CubeMeta {
    CubeMeta {
        index,
        value_space: space,
        grid: grid(),
        times: monthly_series(2000, 1, STEPS),
        fill_value: FILL_SENTINEL,
        units: "index".to_string(),
    }
}

fn write(root: &Path, meta: &CubeMeta, data: &[f32], compression: ZarrCompression) {
    let writer = CubeWriter::new(5, compression, 3);
    writer
        .write_cube_to_dir(&cube_path(root, meta.index, meta.value_space), meta, data)
        .expect("Failed to write cube");
}

fn accessor(root: &Path) -> (Arc<FilesystemArchive>, DatasetAccessor) {
    let archive = Arc::new(FilesystemArchive::new(root, 8 << 20));
    let accessor = DatasetAccessor::new(archive.clone(), Arc::new(StaticCatalog::new()));
    (archive, accessor)
}

#[test]
fn test_positional_cube_roundtrip() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data = create_positional_cube(WIDTH, HEIGHT, STEPS);
    write(temp_dir.path(), &meta(DroughtIndex::Spi3, ValueSpace::Raw), &data, ZarrCompression::BloscZstd);

    let (_, accessor) = accessor(temp_dir.path());
    let cube = accessor.open(DroughtIndex::Spi3, ValueSpace::Raw).unwrap();
    assert_eq!(cube.meta().steps(), STEPS);
    assert!(cube.meta().grid.is_aligned_with(&grid()));

    // step 6 lives in the second time chunk
    let step = cube.read_step(6).unwrap();
    assert_eq!(step[0], 600.0);
    assert_eq!(step[WIDTH + 2], 612.0);

    let series = cube.read_cell_series(GridCell::new(2, 3)).unwrap();
    assert_eq!(series.len(), STEPS);
    assert_eq!(series[13], 1323.0);
}

#[test]
fn test_time_filter_across_chunks() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data = create_positional_cube(WIDTH, HEIGHT, STEPS);
    write(temp_dir.path(), &meta(DroughtIndex::Pdsi, ValueSpace::Raw), &data, ZarrCompression::None);

    let (_, accessor) = accessor(temp_dir.path());
    // Jan 2000 - Feb 2001, summer and January only
    let months = MonthSet::from_months([1, 6, 7, 8]).unwrap();
    let filter = TimeFilter::new(2000, 2001, 1, 2, months).unwrap();
    let interval = accessor.interval(DroughtIndex::Pdsi, ValueSpace::Raw, &filter).unwrap();

    // 2000-01, 06, 07, 08, 2001-01
    assert_eq!(interval.len(), 5);
    assert!(!interval.is_placeholder());

    let point = series(&interval, &Selection::SinglePoint { cell: GridCell::new(1, 1), grid_id: None }, None).unwrap();
    assert_eq!(point, vec![11.0, 511.0, 611.0, 711.0, 1211.0]);

    let mean = reduce_mean(&interval, None).unwrap();
    assert_approx_eq!(mean.at(GridCell::new(0, 0)).unwrap(), (0.0 + 500.0 + 600.0 + 700.0 + 1200.0) / 5.0, 1e-3);
}

#[test]
fn test_fill_values_become_nan() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let mut data = create_positional_cube(WIDTH, HEIGHT, STEPS);
    data[1] = FILL_SENTINEL;
    data[2] = f32::NAN;
    write(temp_dir.path(), &meta(DroughtIndex::Spei1, ValueSpace::Raw), &data, ZarrCompression::BloscLz4);

    let mut leri = vec![42.0; WIDTH * HEIGHT * STEPS];
    leri[0] = -3.0;
    write(temp_dir.path(), &meta(DroughtIndex::Leri1, ValueSpace::Raw), &leri, ZarrCompression::None);

    let (_, accessor) = accessor(temp_dir.path());
    let spei = accessor.open(DroughtIndex::Spei1, ValueSpace::Raw).unwrap().read_step(0).unwrap();
    assert!(spei[1].is_nan());
    assert!(spei[2].is_nan());
    assert_eq!(spei[3], 3.0);

    let leri = accessor.open(DroughtIndex::Leri1, ValueSpace::Raw).unwrap().read_step(0).unwrap();
    assert!(leri[0].is_nan());
    assert_eq!(leri[1], 42.0);
}

#[test]
fn test_chunk_cache_serves_repeat_reads() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data = create_positional_cube(WIDTH, HEIGHT, STEPS);
    write(temp_dir.path(), &meta(DroughtIndex::Eddi2, ValueSpace::Raw), &data, ZarrCompression::None);

    let (archive, accessor) = accessor(temp_dir.path());
    let cube = accessor.open(DroughtIndex::Eddi2, ValueSpace::Raw).unwrap();

    cube.read_step(0).unwrap();
    cube.read_step(1).unwrap();
    cube.read_step(4).unwrap();
    let stats = archive.chunk_cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);

    cube.read_step(5).unwrap();
    assert_eq!(archive.chunk_cache_stats().misses, 2);
}

#[test]
fn test_missing_and_mislabeled_cubes() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let (_, accessor) = accessor(temp_dir.path());
    assert!(matches!(
        accessor.open(DroughtIndex::Pzi, ValueSpace::Raw),
        Err(EngineError::MissingArtifact(_))
    ));

    // a percentile cube stored under the raw path
    let data = create_positional_cube(WIDTH, HEIGHT, STEPS);
    let mislabeled = meta(DroughtIndex::Scpdsi, ValueSpace::Percentile);
    CubeWriter::new(5, ZarrCompression::None, 1)
        .write_cube_to_dir(&cube_path(temp_dir.path(), DroughtIndex::Scpdsi, ValueSpace::Raw), &mislabeled, &data)
        .unwrap();

    let archive = FilesystemArchive::new(temp_dir.path(), 1 << 20);
    assert!(matches!(
        archive.open(DroughtIndex::Scpdsi, ValueSpace::Raw),
        Err(EngineError::InvalidMetadata(_))
    ));
}

#[test]
fn test_percentile_archive_from_raw() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data = create_positional_cube(WIDTH, HEIGHT, STEPS);
    write(temp_dir.path(), &meta(DroughtIndex::Spi6, ValueSpace::Raw), &data, ZarrCompression::None);

    let (_, accessor) = accessor(temp_dir.path());
    let raw = accessor.open(DroughtIndex::Spi6, ValueSpace::Raw).unwrap();
    let dest = cube_path(temp_dir.path(), DroughtIndex::Spi6, ValueSpace::Percentile);
    build_percentile_cube(raw.as_ref(), &CubeWriter::new(5, ZarrCompression::None, 1), &dest).unwrap();

    let ranked = accessor.open(DroughtIndex::Spi6, ValueSpace::Percentile).unwrap();
    // values rise with time, so rank t+1 of 14
    let series = ranked.read_cell_series(GridCell::new(0, 2)).unwrap();
    for (t, v) in series.iter().enumerate() {
        assert_approx_eq!(*v, (t + 1) as f32 / STEPS as f32 * 100.0, 1e-4);
    }

    let filter = TimeFilter::full_years(2000, 2001).unwrap();
    let interval = accessor.interval(DroughtIndex::Spi6, ValueSpace::Percentile, &filter).unwrap();
    assert_eq!(interval.display_range().min, 0.0);
    assert_eq!(interval.display_range().max, 100.0);
}
