//! Price and volume records produced from the transaction store

use serde::{Deserialize, Serialize};

/// Quantile reported for a (year, region) group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    P25,
    P50,
    P75,
}

impl Statistic {
    pub const ALL: [Statistic; 3] = [Statistic::P25, Statistic::P50, Statistic::P75];

    /// Percentile as a fraction in (0, 1]
    pub fn fraction(self) -> f64 {
        match self {
            Statistic::P25 => 0.25,
            Statistic::P50 => 0.50,
            Statistic::P75 => 0.75,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Statistic::P25 => "p25",
            Statistic::P50 => "p50",
            Statistic::P75 => "p75",
        }
    }
}

/// One quantile of one (year, region) group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub year: i32,
    pub region: String,
    pub statistic: Statistic,
    pub price_gbp: f64,
}

/// Store-level row: the three quantiles of a (year, region) group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileRow {
    pub year: i32,
    pub region: String,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
}

impl QuantileRow {
    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::P25 => self.p25,
            Statistic::P50 => self.p50,
            Statistic::P75 => self.p75,
        }
    }

    pub fn iqr(&self) -> f64 {
        self.p75 - self.p25
    }

    /// Expand into one observation per statistic (p25, p50, p75 order)
    pub fn into_observations(self) -> impl Iterator<Item = PriceObservation> {
        Statistic::ALL.into_iter().map(move |statistic| PriceObservation {
            year: self.year,
            region: self.region.clone(),
            statistic,
            price_gbp: self.get(statistic),
        })
    }
}

/// Interquartile range of a (year, region) group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalIqr {
    pub year: i32,
    pub region: String,
    pub iqr: f64,
}

/// Transaction count per (year[, quarter], region)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRow {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<u32>,
    pub region: String,
    pub transaction_count: u64,
}

/// Transaction count per (year, quarter, region, price band)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBandRow {
    pub year: i32,
    pub quarter: u32,
    pub region: String,
    pub price_band: String,
    pub transaction_count: u64,
}

/// Year-over-year change of one price band's total count, summed over regions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandChange {
    pub price_band: String,
    pub previous: u64,
    pub current: u64,
    /// `None` when the previous year had no sales in the band
    pub change_pct: Option<f64>,
}
