//! High-level drought query service.
//!
//! `DroughtService` answers the three dashboard queries (map, series, area)
//! on top of the accessor, the grid index and the reductions. Results are
//! kept in per-kind LRU caches keyed by the full query, and every
//! computation runs on the blocking pool so async callers are never stalled
//! by chunk reads.
//!
//! # Example
//!
//! ```rust,ignore
//! use drought_engine::{DroughtQuery, DroughtService, EngineConfig, SelectionTrigger, Statistic};
//!
//! let service = DroughtService::from_config(EngineConfig::from_env())?;
//! let selection = service.resolve(&SelectionTrigger::CountyPick { fips: 30063 }, 0)?;
//!
//! let query = DroughtQuery::new(DroughtIndex::Spei6, TimeFilter::full_years(2000, 2020)?)
//!     .with_statistic(Statistic::Correlation)
//!     .over(selection);
//! let map = service.map(&query).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use drought_common::{StaticCatalog, ValueRange, ValueSpace};
use serde::{Deserialize, Serialize};

use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::dataset::{ArchiveStore, DatasetAccessor, DatasetInterval, FilesystemArchive};
use crate::error::{EngineError, Result};
use crate::grid_index::{GridElements, GridIndexStore, StoredAdminRasters};
use crate::query::{AreaResult, DroughtQuery, MapResult, QueryKey, SeriesResult, Statistic};
use crate::reduce::{correlation_field, drought_area, reduce_max, reduce_mean, reduce_min, series};
use crate::reprojection::project_mask;
use crate::selection::{Selection, SelectionResolver, SelectionTrigger, SpatialSelection};
use crate::types::CacheStats;

/// Hit/miss counters of the three result caches.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub map: CacheStats,
    pub series: CacheStats,
    pub area: CacheStats,
}

/// State shared with blocking workers.
struct Engine {
    accessor: DatasetAccessor,
    elements: Arc<GridElements>,
    catalog: Arc<StaticCatalog>,
}

impl Engine {
    /// Interval of a map or series query on the geographic grid.
    ///
    /// The cube must share the grid index's geographic grid, since the land
    /// mask bounds every map and whole-domain series.
    fn source_interval(&self, query: &DroughtQuery) -> Result<DatasetInterval> {
        if query.value_space == ValueSpace::EqualAreaProjected {
            return Err(EngineError::Config(
                "equal-area cubes only serve area statistics".to_string(),
            ));
        }

        let interval = self
            .accessor
            .interval(query.index, query.value_space, &query.time_filter)?;

        if !interval.grid().is_aligned_with(&self.elements.source_template) {
            return Err(EngineError::grid_mismatch(format!(
                "{} cube is {}x{}, grid index is {}x{}",
                query.index,
                interval.grid().nx,
                interval.grid().ny,
                self.elements.source_template.nx,
                self.elements.source_template.ny
            )));
        }

        Ok(interval)
    }

    fn map(&self, query: &DroughtQuery) -> Result<MapResult> {
        let interval = self.source_interval(query)?;
        let land = Some(self.elements.land_mask.as_slice());

        let field = match query.statistic {
            Statistic::Mean => reduce_mean(&interval, land)?,
            Statistic::Min => reduce_min(&interval, land)?,
            Statistic::Max => reduce_max(&interval, land)?,
            Statistic::Correlation => {
                let reference = series(&interval, &query.selection.selection, land)?;
                correlation_field(&reference, &interval, land)?
            }
        };

        let (value_range, reversed_scale) = match query.statistic {
            Statistic::Correlation => (ValueRange::new(-1.0, 1.0), false),
            _ => (interval.display_range(), self.catalog.reversed_scale(query.index)),
        };

        Ok(MapResult {
            field,
            value_range,
            reversed_scale,
            is_placeholder: interval.is_placeholder(),
        })
    }

    fn series(&self, query: &DroughtQuery) -> Result<SeriesResult> {
        let interval = self.source_interval(query)?;
        let land = Some(self.elements.land_mask.as_slice());
        let values = series(&interval, &query.selection.selection, land)?;

        Ok(SeriesResult {
            timestamps: interval.times().to_vec(),
            values,
            value_range: interval.display_range(),
            label: query.selection.label.clone(),
            is_placeholder: interval.is_placeholder(),
        })
    }

    fn area(&self, query: &DroughtQuery) -> Result<AreaResult> {
        let interval = self
            .accessor
            .interval(query.index, ValueSpace::EqualAreaProjected, &query.time_filter)?;

        let source = &self.elements.source_template;
        let target = interval.grid();
        if !target.is_aligned_with(&self.elements.equal_area_template) {
            return Err(EngineError::grid_mismatch(format!(
                "{} equal-area cube is {}x{}, grid index expects {}x{}",
                query.index,
                target.nx,
                target.ny,
                self.elements.equal_area_template.nx,
                self.elements.equal_area_template.ny
            )));
        }

        let land = project_mask(&self.elements.land_mask, source, target)?;
        let mask = match &query.selection.selection {
            Selection::AllDomain => land,
            selection => {
                let projected = project_mask(&self.elements.mask_for(selection.cells()), source, target)?;
                if projected.iter().any(|&m| m) {
                    projected
                } else {
                    // smaller than one equal-area cell
                    tracing::debug!(
                        kind = ?selection.kind(),
                        "Selection vanished on the equal-area grid, using the whole domain"
                    );
                    land
                }
            }
        };

        let area = drought_area(&interval, Some(&mask))?;
        Ok(AreaResult {
            timestamps: interval.times().to_vec(),
            area,
            label: query.selection.label.clone(),
            is_placeholder: interval.is_placeholder(),
        })
    }
}

/// Async query façade with result caching.
pub struct DroughtService {
    config: EngineConfig,
    engine: Arc<Engine>,
    resolver: SelectionResolver,
    maps: ResultCache<QueryKey, MapResult>,
    series: ResultCache<QueryKey, SeriesResult>,
    areas: ResultCache<QueryKey, AreaResult>,
}

impl DroughtService {
    /// Create a service over an already-built grid index and archive.
    pub fn new(
        config: EngineConfig,
        catalog: Arc<StaticCatalog>,
        elements: Arc<GridElements>,
        store: Arc<dyn ArchiveStore>,
    ) -> Self {
        let capacity = config.result_cache_capacity;
        let engine = Engine {
            accessor: DatasetAccessor::new(store, Arc::clone(&catalog)),
            elements: Arc::clone(&elements),
            catalog,
        };

        Self {
            config,
            engine: Arc::new(engine),
            resolver: SelectionResolver::new(elements),
            maps: ResultCache::new(capacity),
            series: ResultCache::new(capacity),
            areas: ResultCache::new(capacity),
        }
    }

    /// Wire up the on-disk deployment described by `config`.
    ///
    /// Loads (or builds and persists) the grid index from the admin
    /// artifacts in `grid_index_dir`, and opens the archive lazily.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate().map_err(EngineError::Config)?;

        let mut catalog = StaticCatalog::new();
        if let Some(path) = &config.range_table {
            catalog = catalog.with_range_table(path)?;
        }

        let rasterizer = StoredAdminRasters::new(config.grid_index_dir.clone());
        let elements = GridIndexStore::new(config.grid_index_dir.clone(), config.equal_area_cell_m)
            .elements(config.resolution, &rasterizer)?;

        let archive = FilesystemArchive::new(config.archive_dir.clone(), config.chunk_cache_size_bytes());

        tracing::info!(
            archive = %config.archive_dir.display(),
            resolution = config.resolution,
            land_cells = elements.lookup().len(),
            "Drought service ready"
        );

        Ok(Self::new(config, Arc::new(catalog), Arc::new(elements), Arc::new(archive)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StaticCatalog {
        &self.engine.catalog
    }

    pub fn elements(&self) -> &GridElements {
        &self.engine.elements
    }

    /// Resolve a selection event against the service's grid index.
    pub fn resolve(&self, trigger: &SelectionTrigger, origin: usize) -> Result<SpatialSelection> {
        self.resolver.resolve(trigger, origin)
    }

    /// Reduced field for the map panel.
    ///
    /// Correlation fields are bounded by the configured timeout.
    pub async fn map(&self, query: &DroughtQuery) -> Result<Arc<MapResult>> {
        let timeout = (query.statistic == Statistic::Correlation).then(|| self.config.correlation_timeout());

        self.maps
            .get_or_try_insert_with(query.key(), || {
                let engine = Arc::clone(&self.engine);
                let query = query.clone();
                tracing::info!(
                    index = %query.index,
                    statistic = %query.statistic,
                    selection = ?query.selection.kind(),
                    "Computing map"
                );
                run_blocking("correlation field", timeout, move || engine.map(&query))
            })
            .await
    }

    /// Spatially aggregated series of the query's selection.
    pub async fn series(&self, query: &DroughtQuery) -> Result<Arc<SeriesResult>> {
        // the statistic only shapes the map
        let key = QueryKey {
            statistic: Statistic::Mean,
            ..query.key()
        };

        self.series
            .get_or_try_insert_with(key, || {
                let engine = Arc::clone(&self.engine);
                let query = query.clone();
                tracing::info!(index = %query.index, selection = ?query.selection.kind(), "Computing series");
                run_blocking("series", None, move || engine.series(&query))
            })
            .await
    }

    /// Drought-category coverage of the selection, on the equal-area grid.
    pub async fn drought_area(&self, query: &DroughtQuery) -> Result<Arc<AreaResult>> {
        let key = QueryKey {
            value_space: ValueSpace::EqualAreaProjected,
            statistic: Statistic::Mean,
            ..query.key()
        };

        self.areas
            .get_or_try_insert_with(key, || {
                let engine = Arc::clone(&self.engine);
                let query = query.clone();
                tracing::info!(index = %query.index, selection = ?query.selection.kind(), "Computing drought area");
                run_blocking("drought area", None, move || engine.area(&query))
            })
            .await
    }

    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            map: self.maps.stats().await,
            series: self.series.stats().await,
            area: self.areas.stats().await,
        }
    }

    /// Drop every cached result.
    pub async fn clear_cache(&self) {
        self.maps.clear().await;
        self.series.clear().await;
        self.areas.clear().await;
    }
}

/// Run `work` on the blocking pool, optionally under a time budget.
///
/// A timed-out worker is detached, not killed; its result is discarded.
async fn run_blocking<T, F>(operation: &str, timeout: Option<Duration>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(operation = operation, seconds = limit.as_secs(), "Computation timed out");
                return Err(EngineError::Timeout {
                    operation: operation.to_string(),
                    seconds: limit.as_secs(),
                });
            }
        },
        None => handle.await,
    };

    joined?
}
