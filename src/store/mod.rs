//! Transaction store boundary
//!
//! Sales are grouped by (year of sale, region). Regions come from a
//! county → region reference table joined on the sale's county. A sale whose
//! county has no mapping is excluded from every aggregate; this is policy,
//! not an error.

mod percentile;
mod sqlite;

pub use percentile::{percentile_disc, quantile_row};
pub use sqlite::{PricePaidRecord, SqliteStore};

use crate::types::{PriceBandQuery, PriceBandRow, PriceQuery, QuantileRow, Result, VolumeQuery, VolumeRow};

/// Read access to per-transaction sale records
pub trait TransactionStore: Send + Sync {
    /// Store name for logs
    fn name(&self) -> &str;

    /// Discrete p25/p50/p75 per (year, region) within the query, ordered by
    /// year then region. Groups without sales are absent.
    fn regional_quantiles(&self, query: &PriceQuery) -> Result<Vec<QuantileRow>>;

    /// Distinct region labels of the reference mapping, sorted
    fn regions(&self) -> Result<Vec<String>>;

    /// Inclusive (min, max) sale year; `None` when the store is empty
    fn year_bounds(&self) -> Result<Option<(i32, i32)>>;

    /// Sale counts per (year[, quarter], region)
    fn transaction_volumes(&self, query: &VolumeQuery) -> Result<Vec<VolumeRow>>;

    /// Sale counts per (year, quarter, region, price band)
    fn price_band_volumes(&self, query: &PriceBandQuery) -> Result<Vec<PriceBandRow>>;
}
