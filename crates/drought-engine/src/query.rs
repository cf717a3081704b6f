//! Query and result types of the drought engine.
//!
//! A query names an index, a value space, a statistic, a time window and a
//! resolved selection:
//!
//! ```rust
//! use drought_common::{DroughtIndex, TimeFilter, ValueSpace};
//! use drought_engine::query::{DroughtQuery, Statistic};
//! use drought_engine::selection::SpatialSelection;
//!
//! let query = DroughtQuery::new(DroughtIndex::Spei6, TimeFilter::full_years(2000, 2010).unwrap())
//!     .in_space(ValueSpace::Percentile)
//!     .with_statistic(Statistic::Max)
//!     .over(SpatialSelection::all_domain(0));
//! assert_eq!(query.statistic, Statistic::Max);
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use drought_common::{DroughtIndex, TimeFilter, ValueRange, ValueSpace};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::reduce::DroughtArea;
use crate::selection::{Selection, SpatialSelection};
use crate::types::Field2D;

/// Statistic drawn on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
    Min,
    Max,
    /// Pearson correlation of every cell with the selection's series.
    Correlation,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Correlation => "correlation",
        }
    }
}

impl FromStr for Statistic {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(Statistic::Mean),
            "min" | "minimum" => Ok(Statistic::Min),
            "max" | "maximum" => Ok(Statistic::Max),
            "correlation" | "corr" => Ok(Statistic::Correlation),
            other => Err(EngineError::Config(format!("unknown statistic '{}'", other))),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dashboard query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroughtQuery {
    pub index: DroughtIndex,
    /// `Raw` or `Percentile`; area statistics always read the equal-area cube.
    pub value_space: ValueSpace,
    pub statistic: Statistic,
    pub time_filter: TimeFilter,
    pub selection: SpatialSelection,
}

impl DroughtQuery {
    /// Mean of raw values over the whole domain.
    pub fn new(index: DroughtIndex, time_filter: TimeFilter) -> Self {
        Self {
            index,
            value_space: ValueSpace::Raw,
            statistic: Statistic::Mean,
            time_filter,
            selection: SpatialSelection::all_domain(0),
        }
    }

    pub fn in_space(mut self, value_space: ValueSpace) -> Self {
        self.value_space = value_space;
        self
    }

    pub fn with_statistic(mut self, statistic: Statistic) -> Self {
        self.statistic = statistic;
        self
    }

    pub fn during(mut self, time_filter: TimeFilter) -> Self {
        self.time_filter = time_filter;
        self
    }

    pub fn over(mut self, selection: SpatialSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Cache key: everything that changes the numbers, nothing that only
    /// changes presentation (label, originating control).
    pub fn key(&self) -> QueryKey {
        QueryKey {
            index: self.index,
            value_space: self.value_space,
            statistic: self.statistic,
            time_filter: self.time_filter,
            selection: self.selection.selection.clone(),
        }
    }
}

/// Hashable identity of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub index: DroughtIndex,
    pub value_space: ValueSpace,
    pub statistic: Statistic,
    pub time_filter: TimeFilter,
    pub selection: Selection,
}

/// A reduced field for the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapResult {
    pub field: Field2D,
    /// Color-scale bounds.
    pub value_range: ValueRange,
    /// Whether larger values mean drier (EDDI).
    pub reversed_scale: bool,
    /// The time window matched nothing and the field is all NaN.
    pub is_placeholder: bool,
}

/// A spatially aggregated series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesResult {
    pub timestamps: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub value_range: ValueRange,
    pub label: String,
    pub is_placeholder: bool,
}

/// Drought-category coverage over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaResult {
    pub timestamps: Vec<NaiveDate>,
    #[serde(flatten)]
    pub area: DroughtArea,
    pub label: String,
    pub is_placeholder: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use drought_common::{GridCell, MonthSet};

    fn filter() -> TimeFilter {
        TimeFilter::full_years(2000, 2000).unwrap()
    }

    #[test]
    fn test_query_builder() {
        let query = DroughtQuery::new(DroughtIndex::Pdsi, filter())
            .in_space(ValueSpace::Percentile)
            .with_statistic(Statistic::Correlation);

        assert_eq!(query.value_space, ValueSpace::Percentile);
        assert_eq!(query.statistic, Statistic::Correlation);
        assert!(query.selection.selection.is_all_domain());
    }

    #[test]
    fn test_key_ignores_label_and_origin() {
        let selection = |label: &str, origin| SpatialSelection {
            selection: Selection::SinglePoint {
                cell: GridCell::new(3, 4),
                grid_id: Some(9),
            },
            label: label.to_string(),
            origin,
        };

        let a = DroughtQuery::new(DroughtIndex::Spi1, filter()).over(selection("a", 0));
        let b = DroughtQuery::new(DroughtIndex::Spi1, filter()).over(selection("b", 3));
        assert_eq!(a.key(), b.key());

        let summer = TimeFilter::new(2000, 2000, 1, 12, MonthSet::from_months([6, 7, 8]).unwrap()).unwrap();
        assert_ne!(a.key(), a.clone().during(summer).key());
        assert_ne!(a.key(), a.clone().with_statistic(Statistic::Max).key());
    }

    #[test]
    fn test_statistic_from_str() {
        assert_eq!("Maximum".parse::<Statistic>().unwrap(), Statistic::Max);
        assert_eq!("corr".parse::<Statistic>().unwrap(), Statistic::Correlation);
        assert!("median".parse::<Statistic>().is_err());
    }
}
