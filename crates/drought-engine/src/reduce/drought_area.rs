//! Drought-category area coverage and the DSCI.
//!
//! Each index family has five bands, D0 (abnormally dry) to D4
//! (exceptional drought). A value falls in band `i` when
//! `lower_i < v <= upper_i`; the D4 band is open below. Exclusive
//! fractions count each band on its own, inclusive fractions count every
//! value at or below the band's upper bound.
//!
//! | family      | D0           | D1           | D2           | D3           | D4      |
//! |-------------|--------------|--------------|--------------|--------------|---------|
//! | SPI/SPEI    | (-0.8, -0.5] | (-1.3, -0.8] | (-1.6, -1.3] | (-2.0, -1.6] | <= -2.0 |
//! | EDDI (neg.) | as SPI       |              |              |              |         |
//! | PDSI        | (-2, -1]     | (-3, -2]     | (-4, -3]     | (-5, -4]     | <= -5   |
//! | LERI        | (20, 30]     | (10, 20]     | (5, 10]      | (2, 5]       | <= 2    |

use drought_common::IndexFamily;
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetInterval;
use crate::error::Result;
use crate::reduce::temporal::check_mask;

/// Number of drought categories.
pub const CATEGORIES: usize = 5;

/// One category's value band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryBand {
    pub lower: f64,
    pub upper: f64,
}

impl CategoryBand {
    const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, v: f64) -> bool {
        self.lower < v && v <= self.upper
    }
}

const SPI_BANDS: [CategoryBand; CATEGORIES] = [
    CategoryBand::new(-0.8, -0.5),
    CategoryBand::new(-1.3, -0.8),
    CategoryBand::new(-1.6, -1.3),
    CategoryBand::new(-2.0, -1.6),
    CategoryBand::new(f64::NEG_INFINITY, -2.0),
];

const PDSI_BANDS: [CategoryBand; CATEGORIES] = [
    CategoryBand::new(-2.0, -1.0),
    CategoryBand::new(-3.0, -2.0),
    CategoryBand::new(-4.0, -3.0),
    CategoryBand::new(-5.0, -4.0),
    CategoryBand::new(f64::NEG_INFINITY, -5.0),
];

const LERI_BANDS: [CategoryBand; CATEGORIES] = [
    CategoryBand::new(20.0, 30.0),
    CategoryBand::new(10.0, 20.0),
    CategoryBand::new(5.0, 10.0),
    CategoryBand::new(2.0, 5.0),
    CategoryBand::new(f64::NEG_INFINITY, 2.0),
];

/// Category bands of an index family, D0 first.
pub fn category_table(family: IndexFamily) -> &'static [CategoryBand; CATEGORIES] {
    match family {
        IndexFamily::SpiSpei | IndexFamily::Eddi => &SPI_BANDS,
        IndexFamily::Pdsi => &PDSI_BANDS,
        IndexFamily::Leri => &LERI_BANDS,
    }
}

/// Area percentages per category and step, plus the DSCI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroughtArea {
    /// `inclusive[i][t]`: percent of valid cells at or below D`i`'s upper bound.
    pub inclusive: [Vec<f64>; CATEGORIES],
    /// `exclusive[i][t]`: percent of valid cells inside D`i`'s band.
    pub exclusive: [Vec<f64>; CATEGORIES],
    /// `sum(exclusive[i][t] * (i + 1))`, in `[0, 500]`.
    pub dsci: Vec<f64>,
}

impl DroughtArea {
    pub fn len(&self) -> usize {
        self.dsci.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dsci.is_empty()
    }
}

/// Coverage of one step. Returns `(inclusive, exclusive, dsci)`, all NaN
/// when no cell is valid.
fn step_coverage(
    values: &[f32],
    mask: Option<&[bool]>,
    bands: &[CategoryBand; CATEGORIES],
    flip: bool,
) -> ([f64; CATEGORIES], [f64; CATEGORIES], f64) {
    let mut inclusive = [0usize; CATEGORIES];
    let mut exclusive = [0usize; CATEGORIES];
    let mut valid = 0usize;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() || mask.is_some_and(|m| !m[i]) {
            continue;
        }
        valid += 1;
        let v = if flip { -(v as f64) } else { v as f64 };
        for (c, band) in bands.iter().enumerate() {
            if v <= band.upper {
                inclusive[c] += 1;
            }
            if band.contains(v) {
                exclusive[c] += 1;
            }
        }
    }

    if valid == 0 {
        return ([f64::NAN; CATEGORIES], [f64::NAN; CATEGORIES], f64::NAN);
    }

    let pct = |n: usize| n as f64 / valid as f64 * 100.0;
    let inclusive = inclusive.map(pct);
    let exclusive = exclusive.map(pct);
    let dsci = exclusive
        .iter()
        .enumerate()
        .map(|(c, p)| p * (c + 1) as f64)
        .sum();

    (inclusive, exclusive, dsci)
}

/// Drought-category coverage of every step of `interval`.
///
/// `mask` restricts the cells counted and must match the interval grid.
/// EDDI values are negated before thresholding since EDDI rises with dryness.
pub fn drought_area(interval: &DatasetInterval, mask: Option<&[bool]>) -> Result<DroughtArea> {
    check_mask(interval.grid(), mask, "area")?;

    let family = interval.index().family();
    let bands = category_table(family);
    let flip = family == IndexFamily::Eddi;

    let steps = interval.len();
    let mut area = DroughtArea {
        inclusive: std::array::from_fn(|_| Vec::with_capacity(steps)),
        exclusive: std::array::from_fn(|_| Vec::with_capacity(steps)),
        dsci: Vec::with_capacity(steps),
    };

    for i in 0..steps {
        let values = interval.step(i)?;
        let (inclusive, exclusive, dsci) = step_coverage(&values, mask, bands, flip);
        for c in 0..CATEGORIES {
            area.inclusive[c].push(inclusive[c]);
            area.exclusive[c].push(exclusive[c]);
        }
        area.dsci.push(dsci);
    }

    tracing::debug!(index = %interval.index(), steps = steps, "Computed drought area");
    Ok(area)
}
