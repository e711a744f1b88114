//! Request-level facade over the aggregator, provider and pipeline
//!
//! Built once per process and shared by every request handler.

use serde::Serialize;
use std::sync::Arc;

use super::aggregator::RegionalPriceAggregator;
use super::economic::EconomicSeriesProvider;
use super::normalizer;
use super::series_cache::SeriesDiskCache;
use super::sources::HttpEconomicSource;
use crate::config::Config;
use crate::store::SqliteStore;
use crate::types::{
    axis_label, EconomicData, EconomicSeries, HpiError, NormalizationMode, PriceObservation,
    PriceQuery, QuantileRow, RegionChange, Result, SeriesKind, WidePriceTable,
};

/// One price-trend request
#[derive(Debug, Clone)]
pub struct TrendRequest {
    pub query: PriceQuery,
    pub mode: NormalizationMode,
    pub rebase: bool,
    /// Overrides the provider's base-year policy
    pub base_year: Option<i32>,
}

/// Everything the presentation layer needs to draw a trend chart
#[derive(Debug, Clone, Serialize)]
pub struct TrendView {
    pub title: String,
    pub axis_label: &'static str,
    pub mode: NormalizationMode,
    pub rebased: bool,
    /// `None` for nominal GBP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_year: Option<i32>,
    pub table: WidePriceTable,
    /// Raw p25/p50/p75 observations behind the table
    pub observations: Vec<PriceObservation>,
    /// Nominal GBP/USD used by USD modes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fx_context: Option<EconomicSeries>,
    /// First-to-last change per region; only for non-rebased tables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_change: Option<Vec<RegionChange>>,
}

pub struct DashboardService {
    aggregator: RegionalPriceAggregator,
    provider: EconomicSeriesProvider,
}

impl DashboardService {
    pub fn new(aggregator: RegionalPriceAggregator, provider: EconomicSeriesProvider) -> Self {
        Self {
            aggregator,
            provider,
        }
    }

    /// SQLite store + FRED/ONS source, with the disk cache unless disabled
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = SqliteStore::open(&config.database_path)?;
        let aggregator = RegionalPriceAggregator::new(Arc::new(store));

        let source = HttpEconomicSource::from_config(config)?;
        let mut provider = EconomicSeriesProvider::new(Arc::new(source), config.base_year);
        if config.disk_cache_enabled() {
            let dir = match &config.cache_dir {
                Some(dir) => dir.clone(),
                None => SeriesDiskCache::default_dir()?,
            };
            provider = provider.with_disk_cache(SeriesDiskCache::new(dir, config.cache_ttl_secs));
        }

        Ok(Self::new(aggregator, provider))
    }

    pub fn aggregator(&self) -> &RegionalPriceAggregator {
        &self.aggregator
    }

    pub fn provider(&self) -> &EconomicSeriesProvider {
        &self.provider
    }

    /// Normalized median trend for the request
    pub fn price_trends(&self, request: &TrendRequest) -> Result<TrendView> {
        let query = &request.query;
        if query.regions().is_empty() {
            return Err(HpiError::InvalidQuery("select at least one region".into()));
        }

        let observations = self.aggregator.get_regional_prices(query)?;
        let econ = match request.mode {
            NormalizationMode::Nominal => EconomicData::empty(query.end_year),
            mode => self.provider.economic_data(query, mode, request.base_year)?,
        };
        let table = normalizer::normalize(query, &observations, &econ, request.mode, request.rebase)?;

        tracing::info!(
            mode = ?request.mode,
            rebase = request.rebase,
            rows = table.years().len(),
            columns = table.regions().len(),
            "price trends"
        );

        let base_year = match request.mode {
            NormalizationMode::Nominal | NormalizationMode::UsdNominal => None,
            _ => Some(econ.base_year),
        };
        let fx_context = request.mode.is_usd().then(|| econ.fx.clone());
        let total_change = (!request.rebase).then(|| table.total_change());

        Ok(TrendView {
            title: format!("Median House Prices - {}", request.mode.title()),
            axis_label: axis_label(request.mode, request.rebase),
            mode: request.mode,
            rebased: request.rebase,
            base_year,
            table,
            observations,
            fx_context,
            total_change,
        })
    }

    /// p25/p50/p75 per (year, region) for the distribution view
    pub fn distribution(&self, query: &PriceQuery) -> Result<Vec<QuantileRow>> {
        if query.regions().is_empty() {
            return Err(HpiError::InvalidQuery("select at least one region".into()));
        }
        self.aggregator.get_regional_quantiles(query)
    }

    /// One economic series over `start..=end`; real FX uses the base-year policy
    pub fn series(&self, kind: SeriesKind, start_year: i32, end_year: i32) -> Result<EconomicSeries> {
        match kind {
            SeriesKind::Cpi => self.provider.get_cpi(start_year, end_year),
            SeriesKind::Rpi => self.provider.get_rpi(start_year, end_year),
            SeriesKind::Fx => self.provider.get_fx(start_year, end_year),
            SeriesKind::RealFx => self.provider.get_real_exchange_rate(start_year, end_year),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sources::EconomicSource;
    use crate::store::{PricePaidRecord, TransactionStore};
    use crate::types::{BaseYearPolicy, DatedValue};
    use chrono::NaiveDate;

    struct AnnualSource;

    impl EconomicSource for AnnualSource {
        fn name(&self) -> &str {
            "annual"
        }

        fn fetch(&self, kind: SeriesKind, start_year: i32, end_year: i32) -> Result<Vec<DatedValue>> {
            let value = |year: i32| match kind {
                SeriesKind::Cpi => 100.0 + (year - 2015) as f64 * 2.0,
                SeriesKind::Rpi => 260.0 + (year - 2015) as f64 * 5.0,
                _ => 1.5 - (year - 2015) as f64 * 0.1,
            };
            Ok((start_year..=end_year)
                .map(|year| DatedValue {
                    date: NaiveDate::from_ymd_opt(year, 12, 1).unwrap(),
                    value: value(year),
                })
                .collect())
        }
    }

    fn record(id: &str, price: i64, date: &str, county: &str) -> PricePaidRecord {
        PricePaidRecord {
            id: id.to_string(),
            price_gbp: price,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            county: county.to_string(),
            property_type: "T".to_string(),
            tenure: "F".to_string(),
        }
    }

    fn service() -> DashboardService {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_region_mappings(&[
                ("GREATER LONDON".to_string(), "London".to_string()),
                ("MERSEYSIDE".to_string(), "North West".to_string()),
            ])
            .unwrap();
        store
            .insert_records(&[
                record("a", 400_000, "2015-03-01", "GREATER LONDON"),
                record("b", 500_000, "2015-07-01", "GREATER LONDON"),
                record("c", 600_000, "2016-02-01", "GREATER LONDON"),
                record("d", 120_000, "2015-05-01", "MERSEYSIDE"),
                record("e", 150_000, "2016-05-01", "MERSEYSIDE"),
            ])
            .unwrap();
        assert_eq!(store.name(), "sqlite");

        DashboardService::new(
            RegionalPriceAggregator::new(Arc::new(store)),
            EconomicSeriesProvider::new(Arc::new(AnnualSource), BaseYearPolicy::RangeEnd),
        )
    }

    fn request(mode: NormalizationMode, rebase: bool) -> TrendRequest {
        TrendRequest {
            query: PriceQuery::new(["London", "North West"], 2015, 2016).unwrap(),
            mode,
            rebase,
            base_year: None,
        }
    }

    #[test]
    fn test_nominal_trend_view() {
        let view = service()
            .price_trends(&request(NormalizationMode::Nominal, false))
            .unwrap();

        assert_eq!(view.axis_label, "Price (GBP)");
        assert_eq!(view.base_year, None);
        assert!(view.fx_context.is_none());
        // Discrete median of [400k, 500k] is the lower value
        assert_eq!(view.table.get(2015, "London"), Some(400_000.0));
        assert_eq!(view.observations.len(), 12);
        let changes = view.total_change.unwrap();
        assert!((changes[0].change_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_usd_trend_carries_fx_context() {
        let view = service()
            .price_trends(&request(NormalizationMode::UsdNominal, false))
            .unwrap();

        let fx = view.fx_context.unwrap();
        assert_eq!(fx.len(), 2);
        assert!((view.table.get(2015, "London").unwrap() - 600_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_rebased_trend_has_no_total_change() {
        let view = service()
            .price_trends(&request(NormalizationMode::RealCpi, true))
            .unwrap();

        assert_eq!(view.axis_label, "Price Index (First Year = 1)");
        assert_eq!(view.base_year, Some(2016));
        assert!(view.total_change.is_none());
        assert_eq!(view.table.get(2015, "North West"), Some(1.0));
    }

    #[test]
    fn test_empty_region_set_rejected() {
        let mut req = request(NormalizationMode::Nominal, false);
        req.query = PriceQuery::new(Vec::<String>::new(), 2015, 2016).unwrap();

        assert!(matches!(
            service().price_trends(&req),
            Err(HpiError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_series_real_fx() {
        let real = service().series(SeriesKind::RealFx, 2015, 2016).unwrap();
        assert_eq!(real.kind, SeriesKind::RealFx);
        // Base year (range end) is unadjusted
        assert!((real.get(2016).unwrap() - 1.4).abs() < 1e-12);
    }
}
