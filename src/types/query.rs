//! Request parameters shared by the store, aggregator and pipeline

use serde::{Deserialize, Serialize};

use super::{HpiError, Result};

/// Region set and inclusive year range of one request.
///
/// Regions keep the caller's order (first occurrence wins on duplicates);
/// that order becomes the column order of the resulting table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceQuery {
    regions: Vec<String>,
    pub start_year: i32,
    pub end_year: i32,
}

impl PriceQuery {
    pub fn new<I, S>(regions: I, start_year: i32, end_year: i32) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if start_year > end_year {
            return Err(HpiError::InvalidQuery(format!(
                "start year {} is after end year {}",
                start_year, end_year
            )));
        }

        let mut unique: Vec<String> = Vec::new();
        for region in regions {
            let region = region.into();
            if !unique.contains(&region) {
                unique.push(region);
            }
        }

        Ok(Self {
            regions: unique,
            start_year,
            end_year,
        })
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn years(&self) -> Vec<i32> {
        (self.start_year..=self.end_year).collect()
    }

    pub fn contains_year(&self, year: i32) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }
}

/// Filters for transaction volume counts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VolumeQuery {
    /// `None` counts every region
    pub regions: Option<Vec<String>>,
    pub start_year: i32,
    pub end_year: i32,
    pub by_quarter: bool,
    /// Only flats held leasehold (property type F, tenure L)
    pub leasehold_flats_only: bool,
}

/// Price band layout, amounts in £'000s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBands {
    pub interval_k: u32,
    pub limit_k: u32,
}

impl PriceBands {
    pub fn new(interval_k: u32, limit_k: u32) -> Result<Self> {
        if interval_k == 0 {
            return Err(HpiError::InvalidQuery("price band interval must be positive".into()));
        }
        if limit_k < interval_k {
            return Err(HpiError::InvalidQuery(format!(
                "price limit {}K is below the band interval {}K",
                limit_k, interval_k
            )));
        }
        Ok(Self {
            interval_k,
            limit_k,
        })
    }

    /// Lower bounds of the regular bands: 0, interval, .. < limit
    fn lower_bounds(&self) -> impl Iterator<Item = u32> {
        (0..self.limit_k).step_by(self.interval_k as usize)
    }

    fn band_count(&self) -> u32 {
        self.limit_k.div_ceil(self.interval_k)
    }

    /// Upper bound (£'000s) of the last regular band
    pub fn top_k(&self) -> u32 {
        self.band_count() * self.interval_k
    }

    /// Band labels in ascending order, overflow band last
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .lower_bounds()
            .map(|lo| format!("{}-{}", bound_label(lo), bound_label(lo + self.interval_k)))
            .collect();
        labels.push(format!("Over {}", bound_label(self.top_k())));
        labels
    }

    /// Index into `labels()` for a price in GBP. Upper bounds are inclusive.
    pub fn band_index(&self, price_gbp: f64) -> usize {
        let step = f64::from(self.interval_k) * 1000.0;
        if price_gbp > f64::from(self.top_k()) * 1000.0 {
            return self.band_count() as usize;
        }
        let idx = (price_gbp / step).ceil() as i64 - 1;
        idx.max(0) as usize
    }
}

fn bound_label(k: u32) -> String {
    if k < 1000 {
        format!("{}K", k)
    } else if k % 1000 == 0 {
        format!("{}M", k / 1000)
    } else {
        format!("{}M", f64::from(k) / 1000.0)
    }
}

/// Filters for price band volume counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBandQuery {
    pub bands: PriceBands,
    pub regions: Option<Vec<String>>,
    pub start_year: i32,
    pub end_year: i32,
}

/// Which year real (inflation-adjusted) values are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BaseYearPolicy {
    /// Always this year, independent of the query
    Fixed(i32),
    /// The last year of the requested range
    #[default]
    RangeEnd,
}

impl BaseYearPolicy {
    pub fn resolve(self, _start_year: i32, end_year: i32) -> i32 {
        match self {
            BaseYearPolicy::Fixed(year) => year,
            BaseYearPolicy::RangeEnd => end_year,
        }
    }
}
