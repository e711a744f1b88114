//! Economic Series Provider
//!
//! Serves annual CPI, RPI and GBP/USD series and derives the real exchange
//! rate. Each distinct (series, year range) is fetched upstream at most once
//! per process; concurrent requests for the same key wait on that key only.
//! A range inside one already loaded for the same series is served from
//! memory without touching the source.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::series_cache::SeriesDiskCache;
use super::sources::EconomicSource;
use crate::types::{
    BaseYearPolicy, EconomicData, EconomicSeries, HpiError, NormalizationMode, PriceQuery, Result,
    SeriesKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SeriesKey {
    kind: SeriesKind,
    start_year: i32,
    end_year: i32,
}

/// Per-key cell; filled once on first successful load
type Slot = Arc<Mutex<Option<Arc<EconomicSeries>>>>;

pub struct EconomicSeriesProvider {
    source: Arc<dyn EconomicSource>,
    disk_cache: Option<SeriesDiskCache>,
    base_year: BaseYearPolicy,
    slots: Mutex<HashMap<SeriesKey, Slot>>,
}

impl EconomicSeriesProvider {
    pub fn new(source: Arc<dyn EconomicSource>, base_year: BaseYearPolicy) -> Self {
        Self {
            source,
            disk_cache: None,
            base_year,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_disk_cache(mut self, cache: SeriesDiskCache) -> Self {
        self.disk_cache = Some(cache);
        self
    }

    pub fn base_year_policy(&self) -> BaseYearPolicy {
        self.base_year
    }

    /// UK CPI for every year in `start_year..=end_year`
    pub fn get_cpi(&self, start_year: i32, end_year: i32) -> Result<EconomicSeries> {
        self.get_series(SeriesKind::Cpi, start_year, end_year)
    }

    /// USD per GBP for every year in `start_year..=end_year`
    pub fn get_fx(&self, start_year: i32, end_year: i32) -> Result<EconomicSeries> {
        self.get_series(SeriesKind::Fx, start_year, end_year)
    }

    /// UK RPI for every year in `start_year..=end_year`
    pub fn get_rpi(&self, start_year: i32, end_year: i32) -> Result<EconomicSeries> {
        self.get_series(SeriesKind::Rpi, start_year, end_year)
    }

    /// Real exchange rate anchored at the configured base year
    pub fn get_real_exchange_rate(&self, start_year: i32, end_year: i32) -> Result<EconomicSeries> {
        let base_year = self.base_year.resolve(start_year, end_year);
        self.real_exchange_rate_at(start_year, end_year, base_year)
    }

    /// Real exchange rate `FX(y) * CPI(y) / CPI(base_year)`
    pub fn real_exchange_rate_at(
        &self,
        start_year: i32,
        end_year: i32,
        base_year: i32,
    ) -> Result<EconomicSeries> {
        let fx = self.get_fx(start_year, end_year)?;
        let cpi = self.get_cpi(start_year.min(base_year), end_year.max(base_year))?;
        derive_real_exchange_rate(&cpi, &fx, base_year, start_year, end_year)
    }

    /// Load the series `mode` needs for `query`. `base_year` overrides the
    /// configured policy.
    pub fn economic_data(
        &self,
        query: &PriceQuery,
        mode: NormalizationMode,
        base_year: Option<i32>,
    ) -> Result<EconomicData> {
        let (start, end) = (query.start_year, query.end_year);
        let base_year = base_year.unwrap_or_else(|| self.base_year.resolve(start, end));
        let (lo, hi) = (start.min(base_year), end.max(base_year));

        let mut data = EconomicData::empty(base_year);
        for kind in mode.required_series() {
            match kind {
                SeriesKind::Cpi => data.cpi = self.get_cpi(lo, hi)?,
                SeriesKind::Rpi => data.rpi = self.get_rpi(lo, hi)?,
                SeriesKind::Fx => data.fx = self.get_fx(start, end)?,
                SeriesKind::RealFx => {
                    data.real_fx =
                        derive_real_exchange_rate(&data.cpi, &data.fx, base_year, start, end)?
                }
            }
        }
        Ok(data)
    }

    /// Number of keys with a loaded series
    pub fn cached_len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    fn get_series(&self, kind: SeriesKind, start_year: i32, end_year: i32) -> Result<EconomicSeries> {
        if start_year > end_year {
            return Err(HpiError::InvalidQuery(format!(
                "start year {} is after end year {}",
                start_year, end_year
            )));
        }
        let key = SeriesKey {
            kind,
            start_year,
            end_year,
        };
        self.cached(key)?.slice(start_year, end_year)
    }

    fn cached(&self, key: SeriesKey) -> Result<Arc<EconomicSeries>> {
        // The map lock is held only long enough to find the key's slot
        let slot: Slot = self.slots.lock().entry(key).or_default().clone();

        let mut guard = slot.lock();
        if let Some(series) = guard.as_ref() {
            tracing::debug!(
                series = %key.kind,
                start_year = key.start_year,
                end_year = key.end_year,
                "series cache hit"
            );
            return Ok(Arc::clone(series));
        }

        if let Some(series) = self.covering(key) {
            tracing::debug!(
                series = %key.kind,
                start_year = key.start_year,
                end_year = key.end_year,
                "series served from a wider cached range"
            );
            *guard = Some(Arc::clone(&series));
            return Ok(series);
        }

        let series = Arc::new(self.load(key)?);
        *guard = Some(Arc::clone(&series));
        Ok(series)
    }

    /// A loaded series of the same kind whose range contains `key`'s range.
    /// Slots still being filled by another thread are skipped.
    fn covering(&self, key: SeriesKey) -> Option<Arc<EconomicSeries>> {
        let candidates: Vec<Slot> = self
            .slots
            .lock()
            .iter()
            .filter(|(k, _)| {
                **k != key
                    && k.kind == key.kind
                    && k.start_year <= key.start_year
                    && k.end_year >= key.end_year
            })
            .map(|(_, slot)| Arc::clone(slot))
            .collect();

        candidates
            .iter()
            .find_map(|slot| slot.try_lock().and_then(|guard| guard.as_ref().map(Arc::clone)))
    }

    fn load(&self, key: SeriesKey) -> Result<EconomicSeries> {
        let SeriesKey {
            kind,
            start_year,
            end_year,
        } = key;

        if let Some(disk) = &self.disk_cache {
            if let Some(series) = disk.load_fresh(kind, start_year, end_year) {
                tracing::debug!(series = %kind, start_year, end_year, "series loaded from disk cache");
                return Ok(series);
            }
        }

        let observations = self.source.fetch(kind, start_year, end_year)?;
        let series =
            EconomicSeries::from_observations(kind, &observations).within(start_year, end_year);
        tracing::info!(
            series = %kind,
            source = self.source.name(),
            start_year,
            end_year,
            years = series.len(),
            "fetched economic series"
        );

        if let Some(disk) = &self.disk_cache {
            if let Err(e) = disk.save(&series, start_year, end_year) {
                tracing::warn!(error = %e, "failed to write series cache");
            }
        }
        Ok(series)
    }
}

/// `FX(y) * CPI(y) / CPI(base_year)` for every `y` in `start_year..=end_year`.
/// Fails with `RangeUnavailable` if either input lacks any year in range, or
/// CPI lacks the base year.
pub fn derive_real_exchange_rate(
    cpi: &EconomicSeries,
    fx: &EconomicSeries,
    base_year: i32,
    start_year: i32,
    end_year: i32,
) -> Result<EconomicSeries> {
    let fx = fx.slice(start_year, end_year)?;
    let cpi_in_range = cpi.slice(start_year, end_year)?;
    let base_cpi = cpi.slice(base_year, base_year)?.value(base_year)?;
    if base_cpi == 0.0 {
        return Err(HpiError::Data(format!("{} is zero in base year {}", cpi.kind, base_year)));
    }

    let values = fx
        .iter()
        .map(|(year, rate)| -> Result<(i32, f64)> {
            let cpi_y = cpi_in_range.value(year)?;
            Ok((year, rate * cpi_y / base_cpi))
        })
        .collect::<Result<_>>()?;

    Ok(EconomicSeries::new(SeriesKind::RealFx, values))
}
