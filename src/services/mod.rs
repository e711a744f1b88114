//! Services for series loading, aggregation and normalization

pub mod aggregator;
pub mod dashboard;
pub mod economic;
pub mod normalizer;
pub mod series_cache;
pub mod sources;

pub use aggregator::{band_year_over_year, RegionalPriceAggregator};
pub use dashboard::{DashboardService, TrendRequest, TrendView};
pub use economic::{derive_real_exchange_rate, EconomicSeriesProvider};
pub use normalizer::{apply_mode, normalize, rebase_to_first, reshape};
pub use series_cache::SeriesDiskCache;
pub use sources::{EconomicSource, HttpEconomicSource};
