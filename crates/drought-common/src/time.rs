//! Time handling for monthly drought archives.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{DroughtError, DroughtResult};

/// A subset of the twelve calendar months, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonthSet(u16);

impl MonthSet {
    const ALL_BITS: u16 = 0b1111_1111_1111;

    /// All twelve months.
    pub fn all() -> Self {
        Self(Self::ALL_BITS)
    }

    /// No months.
    pub fn none() -> Self {
        Self(0)
    }

    /// Build from month numbers (1 = January).
    pub fn from_months<I: IntoIterator<Item = u32>>(months: I) -> DroughtResult<Self> {
        let mut bits = 0u16;
        for month in months {
            if !(1..=12).contains(&month) {
                return Err(DroughtError::InvalidMonth(month));
            }
            bits |= 1 << (month - 1);
        }
        Ok(Self(bits))
    }

    pub fn contains(&self, month: u32) -> bool {
        (1..=12).contains(&month) && self.0 & (1 << (month - 1)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Month numbers in calendar order.
    pub fn months(&self) -> Vec<u32> {
        (1..=12).filter(|m| self.contains(*m)).collect()
    }
}

impl Default for MonthSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Year/month window applied to a monthly time axis.
///
/// A timestamp is kept when it falls within
/// `[first day of (year_start, month_start), last day of (year_end, month_end)]`
/// and its month is one of `included_months`. The start and end months
/// therefore only clip the two boundary years, while the month set applies
/// to every year in the window. A window whose start is after its end is
/// valid and matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeFilter {
    pub year_start: i32,
    pub year_end: i32,
    pub month_start: u32,
    pub month_end: u32,
    pub included_months: MonthSet,
}

impl TimeFilter {
    pub fn new(
        year_start: i32,
        year_end: i32,
        month_start: u32,
        month_end: u32,
        included_months: MonthSet,
    ) -> DroughtResult<Self> {
        for month in [month_start, month_end] {
            if !(1..=12).contains(&month) {
                return Err(DroughtError::InvalidMonth(month));
            }
        }
        Ok(Self {
            year_start,
            year_end,
            month_start,
            month_end,
            included_months,
        })
    }

    /// January of `year_start` through December of `year_end`, every month.
    pub fn full_years(year_start: i32, year_end: i32) -> DroughtResult<Self> {
        Self::new(year_start, year_end, 1, 12, MonthSet::all())
    }

    /// First day of the window.
    pub fn start_date(&self) -> NaiveDate {
        first_of_month(self.year_start, self.month_start)
    }

    /// Last day of the window.
    pub fn end_date(&self) -> NaiveDate {
        last_of_month(self.year_end, self.month_end)
    }

    /// Check whether a timestamp passes the filter.
    pub fn matches(&self, date: NaiveDate) -> bool {
        date >= self.start_date()
            && date <= self.end_date()
            && self.included_months.contains(date.month())
    }

    /// Positions in `times` that pass the filter, in order.
    pub fn select(&self, times: &[NaiveDate]) -> Vec<usize> {
        times
            .iter()
            .enumerate()
            .filter(|(_, t)| self.matches(**t))
            .map(|(i, _)| i)
            .collect()
    }
}

/// First day of the given month. Out-of-range input clamps to the nearest
/// valid month.
pub fn first_of_month(year: i32, month: u32) -> NaiveDate {
    let month = month.clamp(1, 12);
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// Last day of the given month.
pub fn last_of_month(year: i32, month: u32) -> NaiveDate {
    let month = month.clamp(1, 12);
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    first_of_month(next_year, next_month)
        .pred_opt()
        .unwrap_or(NaiveDate::MAX)
}

/// Monthly timestamps (first of each month) starting at `(year, month)`.
pub fn monthly_series(year: i32, month: u32, count: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(count);
    let (mut y, mut m) = (year, month.clamp(1, 12));
    for _ in 0..count {
        out.push(first_of_month(y, m));
        if m == 12 {
            y += 1;
            m = 1;
        } else {
            m += 1;
        }
    }
    out
}

/// The two timestamps of the "no data" placeholder axis: 30 days ago and today.
pub fn placeholder_times(today: NaiveDate) -> Vec<NaiveDate> {
    vec![today - Duration::days(30), today]
}

/// Parse an ISO `YYYY-MM-DD` date as stored in archive attributes.
pub fn parse_date(s: &str) -> DroughtResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| DroughtError::InvalidTimeFilter(format!("invalid date '{}': {}", s, e)))
}
