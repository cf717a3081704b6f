//! A cube narrowed to the time steps of a [`TimeFilter`].

use std::sync::Arc;

use chrono::NaiveDate;
use drought_common::time::placeholder_times;
use drought_common::{DroughtIndex, GridSpec, StaticCatalog, TimeFilter, ValueRange};

use super::{CubeMeta, MemoryCube, RasterCube};
use crate::error::{EngineError, Result};

/// The selected time steps of one cube plus its display bounds.
///
/// Never empty: a filter matching nothing yields a two-step placeholder
/// of NaN on the same grid, flagged with [`DatasetInterval::is_placeholder`].
#[derive(Clone)]
pub struct DatasetInterval {
    cube: Arc<dyn RasterCube>,
    steps: Vec<usize>,
    times: Vec<NaiveDate>,
    placeholder: bool,
    display_range: ValueRange,
}

impl DatasetInterval {
    /// Apply `filter` to `cube`. `today` anchors the placeholder axis.
    pub fn filter(
        cube: Arc<dyn RasterCube>,
        filter: &TimeFilter,
        catalog: &StaticCatalog,
        today: NaiveDate,
    ) -> Result<Self> {
        let meta = cube.meta();
        let display_range = catalog.display_range(meta.index, meta.value_space);
        let steps = filter.select(&meta.times);

        if steps.is_empty() {
            tracing::info!(
                index = %meta.index,
                year_start = filter.year_start,
                year_end = filter.year_end,
                "Time filter matched no steps, using placeholder"
            );
            return Self::placeholder(meta, display_range, today);
        }

        let times = steps.iter().map(|&t| meta.times[t]).collect();
        tracing::debug!(index = %meta.index, timesteps = steps.len(), "Filtered time axis");

        Ok(Self {
            cube,
            steps,
            times,
            placeholder: false,
            display_range,
        })
    }

    /// Every step of `cube`.
    pub fn full(cube: Arc<dyn RasterCube>, catalog: &StaticCatalog) -> Self {
        let meta = cube.meta();
        let display_range = catalog.display_range(meta.index, meta.value_space);
        let steps = (0..meta.steps()).collect();
        let times = meta.times.clone();
        Self {
            cube,
            steps,
            times,
            placeholder: false,
            display_range,
        }
    }

    fn placeholder(source: &CubeMeta, display_range: ValueRange, today: NaiveDate) -> Result<Self> {
        let times = placeholder_times(today);
        let meta = CubeMeta {
            times: times.clone(),
            ..source.clone()
        };
        let data = vec![f32::NAN; meta.steps() * meta.cells()];
        let cube: Arc<dyn RasterCube> = Arc::new(MemoryCube::new(meta, data)?);

        Ok(Self {
            cube,
            steps: vec![0, 1],
            times,
            placeholder: true,
            display_range,
        })
    }

    pub fn meta(&self) -> &CubeMeta {
        self.cube.meta()
    }

    pub fn grid(&self) -> &GridSpec {
        &self.cube.meta().grid
    }

    pub fn index(&self) -> DroughtIndex {
        self.cube.meta().index
    }

    pub fn times(&self) -> &[NaiveDate] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// True when the filter matched nothing and this is the NaN stand-in.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn display_range(&self) -> ValueRange {
        self.display_range
    }

    pub fn data_min(&self) -> f64 {
        self.display_range.min
    }

    pub fn data_max(&self) -> f64 {
        self.display_range.max
    }

    /// Values of the `i`-th selected step.
    pub fn step(&self, i: usize) -> Result<Vec<f32>> {
        let t = *self.steps.get(i).ok_or_else(|| {
            EngineError::read_failed(format!("interval step {} out of range ({})", i, self.len()))
        })?;
        self.cube.read_step(t)
    }

    /// All selected steps, time-major.
    pub fn materialize(&self) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(self.len() * self.grid().len());
        for i in 0..self.len() {
            out.extend(self.step(i)?);
        }
        Ok(out)
    }

    /// Series of one cell over the selected steps.
    pub fn cell_series(&self, cell: drought_common::GridCell) -> Result<Vec<f32>> {
        let full = self.cube.read_cell_series(cell)?;
        Ok(self.steps.iter().map(|&t| full[t]).collect())
    }
}

impl std::fmt::Debug for DatasetInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetInterval")
            .field("index", &self.index())
            .field("steps", &self.steps)
            .field("placeholder", &self.placeholder)
            .finish()
    }
}
