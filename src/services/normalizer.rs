//! Price Normalization Pipeline
//!
//! Pure transform from median observations plus economic series to a wide
//! year × region table. No I/O and no retained state.

use std::collections::{BTreeSet, HashMap};

use crate::types::{
    EconomicData, EconomicSeries, HpiError, NormalizationMode, PriceObservation, PriceQuery,
    Result, Statistic, WidePriceTable,
};

/// Reshape → mode transform → optional rebase
pub fn normalize(
    query: &PriceQuery,
    observations: &[PriceObservation],
    econ: &EconomicData,
    mode: NormalizationMode,
    rebase_to_first_year: bool,
) -> Result<WidePriceTable> {
    let table = reshape(observations, query)?;
    let table = apply_mode(table, econ, mode)?;
    if rebase_to_first_year {
        rebase_to_first(table)
    } else {
        Ok(table)
    }
}

/// Build the wide table from p50 observations.
///
/// First pass collects the years present, second pass fills a dense matrix.
/// Rows are ascending years; columns are every requested region in the
/// query's order, all-absent when a region has no data. Observations outside
/// the query are dropped.
pub fn reshape(observations: &[PriceObservation], query: &PriceQuery) -> Result<WidePriceTable> {
    let medians = || {
        observations
            .iter()
            .filter(|o| o.statistic == Statistic::P50)
    };

    let mut years = BTreeSet::new();
    let mut dropped = 0usize;
    for obs in medians() {
        if !query.contains_year(obs.year) || !query.regions().contains(&obs.region) {
            dropped += 1;
            continue;
        }
        years.insert(obs.year);
    }
    if dropped > 0 {
        tracing::debug!(dropped, "dropped observations outside the query");
    }

    let regions: Vec<String> = query.regions().to_vec();
    let columns: HashMap<&str, usize> = regions
        .iter()
        .enumerate()
        .map(|(i, r)| (r.as_str(), i))
        .collect();

    let mut table = WidePriceTable::empty(years.into_iter().collect(), regions.clone());
    for obs in medians() {
        let (Some(row), Some(&col)) = (table.row_index(obs.year), columns.get(obs.region.as_str()))
        else {
            continue;
        };
        if table.cell(row, col).is_some() {
            return Err(HpiError::Data(format!(
                "duplicate median for {} {}",
                obs.region, obs.year
            )));
        }
        table.set(row, col, obs.price_gbp);
    }

    Ok(table)
}

/// Transform every present cell by its row year
pub fn apply_mode(
    table: WidePriceTable,
    econ: &EconomicData,
    mode: NormalizationMode,
) -> Result<WidePriceTable> {
    if table.cell_count() == 0 {
        return Ok(table);
    }
    match mode {
        NormalizationMode::Nominal => Ok(table),
        NormalizationMode::RealCpi => deflate(table, &econ.cpi, econ.base_year),
        NormalizationMode::RealRpi => deflate(table, &econ.rpi, econ.base_year),
        NormalizationMode::UsdNominal => convert(table, &econ.fx),
        NormalizationMode::UsdReal => convert(table, &econ.real_fx),
    }
}

/// `value * index[base_year] / index[year]`: base-year pounds
fn deflate(table: WidePriceTable, index: &EconomicSeries, base_year: i32) -> Result<WidePriceTable> {
    let base = index.value(base_year)?;
    table.try_map_cells(|year, _, value| {
        let at_year = index.value(year)?;
        if at_year == 0.0 {
            return Err(HpiError::Data(format!("{} is zero in {}", index.kind, year)));
        }
        Ok(value * base / at_year)
    })
}

/// `value * rate[year]`
fn convert(table: WidePriceTable, rate: &EconomicSeries) -> Result<WidePriceTable> {
    table.try_map_cells(|year, _, value| Ok(value * rate.value(year)?))
}

/// Divide each column by its own earliest present cell. A zero baseline
/// fails the whole table.
pub fn rebase_to_first(table: WidePriceTable) -> Result<WidePriceTable> {
    let mut baselines = Vec::with_capacity(table.regions().len());
    for (col, region) in table.regions().iter().enumerate() {
        let baseline = table.first_observed(col).map(|(_, v)| v);
        if baseline == Some(0.0) {
            return Err(HpiError::DegenerateRebase(region.clone()));
        }
        baselines.push(baseline);
    }

    table.try_map_cells(|_, col, value| match baselines[col] {
        Some(baseline) => Ok(value / baseline),
        None => Ok(value),
    })
}
