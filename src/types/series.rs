//! Annual macroeconomic series (CPI, RPI, FX)

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{HpiError, Result};

/// Which economic series a value belongs to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    /// UK CPI, all items (index)
    Cpi,
    /// UK RPI, all items (index)
    Rpi,
    /// USD per GBP
    Fx,
    /// FX adjusted by relative CPI, derived locally
    RealFx,
}

impl SeriesKind {
    /// Short identifier used in cache file names
    pub fn slug(self) -> &'static str {
        match self {
            SeriesKind::Cpi => "cpi",
            SeriesKind::Rpi => "rpi",
            SeriesKind::Fx => "fx",
            SeriesKind::RealFx => "real_fx",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeriesKind::Cpi => "UK CPI",
            SeriesKind::Rpi => "UK RPI",
            SeriesKind::Fx => "GBP/USD",
            SeriesKind::RealFx => "real GBP/USD",
        };
        f.write_str(name)
    }
}

/// A dated observation as published by an upstream source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

/// Year-keyed annual series. Keys are strictly increasing; gaps are allowed
/// but lookups on a gap fail explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicSeries {
    pub kind: SeriesKind,
    values: BTreeMap<i32, f64>,
}

impl EconomicSeries {
    pub fn new(kind: SeriesKind, values: BTreeMap<i32, f64>) -> Self {
        Self { kind, values }
    }

    /// Series with no entries; every lookup fails
    pub fn empty(kind: SeriesKind) -> Self {
        Self::new(kind, BTreeMap::new())
    }

    /// Resample dated observations to annual granularity.
    ///
    /// Each year takes the value of its latest observation dated within that
    /// calendar year. Input order does not matter; ties on the same date keep
    /// the later element.
    pub fn from_observations(kind: SeriesKind, observations: &[DatedValue]) -> Self {
        let mut latest: BTreeMap<i32, DatedValue> = BTreeMap::new();

        for obs in observations {
            if !obs.value.is_finite() {
                continue;
            }
            let year = obs.date.year();
            match latest.get(&year) {
                Some(current) if current.date > obs.date => {}
                _ => {
                    latest.insert(year, *obs);
                }
            }
        }

        let values = latest.into_iter().map(|(y, v)| (y, v.value)).collect();
        Self::new(kind, values)
    }

    pub fn get(&self, year: i32) -> Option<f64> {
        self.values.get(&year).copied()
    }

    /// Value for `year`, or `MissingEconomicData`
    pub fn value(&self, year: i32) -> Result<f64> {
        self.get(year).ok_or(HpiError::MissingEconomicData {
            series: self.kind,
            year,
        })
    }

    /// Years in `start..=end` with no value
    pub fn missing_years(&self, start: i32, end: i32) -> Vec<i32> {
        (start..=end)
            .filter(|y| !self.values.contains_key(y))
            .collect()
    }

    pub fn covers(&self, start: i32, end: i32) -> bool {
        self.missing_years(start, end).is_empty()
    }

    /// Sub-series for `start..=end`; fails unless every year is present
    pub fn slice(&self, start: i32, end: i32) -> Result<EconomicSeries> {
        let missing = self.missing_years(start, end);
        if !missing.is_empty() {
            return Err(HpiError::RangeUnavailable {
                series: self.kind,
                start,
                end,
                missing,
            });
        }
        Ok(self.within(start, end))
    }

    /// Entries within `start..=end`, gaps kept as gaps
    pub fn within(&self, start: i32, end: i32) -> EconomicSeries {
        if start > end {
            return Self::empty(self.kind);
        }
        let values = self
            .values
            .range(start..=end)
            .map(|(y, v)| (*y, *v))
            .collect();
        Self::new(self.kind, values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.values.iter().map(|(y, v)| (*y, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.values.keys().next().copied()
    }

    pub fn last_year(&self) -> Option<i32> {
        self.values.keys().next_back().copied()
    }
}

/// The economic series one normalization request reads, all anchored to the
/// same base year. Series a mode does not need are left empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EconomicData {
    pub base_year: i32,
    pub cpi: EconomicSeries,
    pub rpi: EconomicSeries,
    pub fx: EconomicSeries,
    pub real_fx: EconomicSeries,
}

impl EconomicData {
    pub fn empty(base_year: i32) -> Self {
        Self {
            base_year,
            cpi: EconomicSeries::empty(SeriesKind::Cpi),
            rpi: EconomicSeries::empty(SeriesKind::Rpi),
            fx: EconomicSeries::empty(SeriesKind::Fx),
            real_fx: EconomicSeries::empty(SeriesKind::RealFx),
        }
    }

    pub fn series(&self, kind: SeriesKind) -> &EconomicSeries {
        match kind {
            SeriesKind::Cpi => &self.cpi,
            SeriesKind::Rpi => &self.rpi,
            SeriesKind::Fx => &self.fx,
            SeriesKind::RealFx => &self.real_fx,
        }
    }
}
