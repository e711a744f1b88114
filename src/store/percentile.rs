//! Discrete percentiles
//!
//! The discrete percentile at fraction `f` of `n` ascending values is the
//! first value whose cumulative position `i / n` (1-based `i`) reaches `f`,
//! i.e. the element at rank `ceil(f * n)`. It is always an observed value;
//! when `f * n` lands exactly on a boundary the lower candidate is taken.
//! For `[100, 200, 300, 400]` the 50th percentile is `200`.

use crate::types::{QuantileRow, Statistic};

/// Discrete percentile of ascending `sorted` values. `None` when empty.
pub fn percentile_disc(sorted: &[f64], fraction: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let rank = (fraction * n as f64).ceil() as usize;
    let idx = rank.clamp(1, n) - 1;
    Some(sorted[idx])
}

/// p25/p50/p75 of one (year, region) group. `prices` must be ascending.
pub fn quantile_row(year: i32, region: String, prices: &[f64]) -> Option<QuantileRow> {
    Some(QuantileRow {
        year,
        region,
        p25: percentile_disc(prices, Statistic::P25.fraction())?,
        p50: percentile_disc(prices, Statistic::P50.fraction())?,
        p75: percentile_disc(prices, Statistic::P75.fraction())?,
    })
}
