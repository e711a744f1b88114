//! Regional Price Aggregator

use std::sync::Arc;

use crate::store::TransactionStore;
use crate::types::{
    BandChange, HpiError, PriceBandQuery, PriceBandRow, PriceObservation, PriceQuery, QuantileRow,
    RegionalIqr, Result, VolumeQuery, VolumeRow,
};

/// Per-year, per-region price statistics over the transaction store
pub struct RegionalPriceAggregator {
    store: Arc<dyn TransactionStore>,
}

impl RegionalPriceAggregator {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Quantile rows for the query, checked for p25 <= p50 <= p75
    pub fn get_regional_quantiles(&self, query: &PriceQuery) -> Result<Vec<QuantileRow>> {
        let rows = self.store.regional_quantiles(query)?;
        if let Some(bad) = rows.iter().find(|r| !(r.p25 <= r.p50 && r.p50 <= r.p75)) {
            return Err(HpiError::Data(format!(
                "{} returned non-monotone quantiles for {} {}",
                self.store.name(),
                bad.region,
                bad.year
            )));
        }
        tracing::debug!(
            regions = query.regions().len(),
            start_year = query.start_year,
            end_year = query.end_year,
            groups = rows.len(),
            "regional quantiles"
        );
        Ok(rows)
    }

    /// One (p25, p50, p75) observation triple per (year, region) with sales,
    /// ordered by year then region
    pub fn get_regional_prices(&self, query: &PriceQuery) -> Result<Vec<PriceObservation>> {
        Ok(self
            .get_regional_quantiles(query)?
            .into_iter()
            .flat_map(QuantileRow::into_observations)
            .collect())
    }

    /// p75 - p25 per (year, region)
    pub fn get_regional_iqr(&self, query: &PriceQuery) -> Result<Vec<RegionalIqr>> {
        Ok(self
            .get_regional_quantiles(query)?
            .into_iter()
            .map(|r| RegionalIqr {
                iqr: r.iqr(),
                year: r.year,
                region: r.region,
            })
            .collect())
    }

    /// Every region of the reference mapping, regardless of dates
    pub fn get_available_regions(&self) -> Result<Vec<String>> {
        self.store.regions()
    }

    /// Inclusive (min, max) sale year
    pub fn get_year_range(&self) -> Result<(i32, i32)> {
        self.store
            .year_bounds()?
            .ok_or_else(|| HpiError::Data("transaction store has no sales".into()))
    }

    pub fn get_transaction_volumes(&self, query: &VolumeQuery) -> Result<Vec<VolumeRow>> {
        if query.start_year > query.end_year {
            return Err(HpiError::InvalidQuery(format!(
                "start year {} is after end year {}",
                query.start_year, query.end_year
            )));
        }
        self.store.transaction_volumes(query)
    }

    pub fn volume_by_price_band(&self, query: &PriceBandQuery) -> Result<Vec<PriceBandRow>> {
        if query.start_year > query.end_year {
            return Err(HpiError::InvalidQuery(format!(
                "start year {} is after end year {}",
                query.start_year, query.end_year
            )));
        }
        self.store.price_band_volumes(query)
    }
}

/// Per-band change in total sales from `year - 1` to `year`, in band order
pub fn band_year_over_year(rows: &[PriceBandRow], labels: &[String], year: i32) -> Vec<BandChange> {
    let total = |band: &str, y: i32| -> u64 {
        rows.iter()
            .filter(|r| r.year == y && r.price_band == band)
            .map(|r| r.transaction_count)
            .sum()
    };

    labels
        .iter()
        .map(|band| {
            let previous = year.checked_sub(1).map_or(0, |prev| total(band, prev));
            let current = total(band, year);
            let change_pct = (previous > 0)
                .then(|| (current as f64 - previous as f64) / previous as f64 * 100.0);
            BandChange {
                price_band: band.clone(),
                previous,
                current,
                change_pct,
            }
        })
        .collect()
}
