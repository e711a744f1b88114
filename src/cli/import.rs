//! `hpitrack import` subcommand for loading the SQLite transaction store

use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::store::{PricePaidRecord, SqliteStore};
use crate::types::{HpiError, Result};

/// Rows per insert transaction
const DEFAULT_BATCH_SIZE: usize = 10_000;

// Price-paid CSV column positions
const COL_ID: usize = 0;
const COL_PRICE: usize = 1;
const COL_DATE: usize = 2;
const COL_PROPERTY_TYPE: usize = 4;
const COL_TENURE: usize = 6;
const COL_COUNTY: usize = 13;
const COL_STATUS: usize = 15;

/// Load sales or the county → region mapping into the store
#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(subcommand)]
    pub target: ImportTarget,
}

#[derive(Subcommand, Debug)]
pub enum ImportTarget {
    /// HM Land Registry price-paid CSV (no header row)
    Prices {
        #[arg(value_name = "CSV")]
        path: PathBuf,

        /// Rows per insert transaction
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },

    /// County to region mapping CSV with a `county,region` header
    Regions {
        #[arg(value_name = "CSV")]
        path: PathBuf,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub inserted: usize,
    /// Deleted-status rows and rows already present
    pub skipped: usize,
    pub malformed: usize,
}

impl ImportArgs {
    pub fn run(self, store: &SqliteStore) -> Result<ImportSummary> {
        match self.target {
            ImportTarget::Prices { path, batch_size } => {
                let file = File::open(&path)?;
                let summary = import_prices(store, file, batch_size.max(1))?;
                tracing::info!(
                    path = %path.display(),
                    inserted = summary.inserted,
                    skipped = summary.skipped,
                    malformed = summary.malformed,
                    "imported price-paid records"
                );
                Ok(summary)
            }
            ImportTarget::Regions { path } => {
                let file = File::open(&path)?;
                let written = import_regions(store, file)?;
                tracing::info!(path = %path.display(), written, "imported region mappings");
                Ok(ImportSummary {
                    rows_read: written,
                    inserted: written,
                    ..ImportSummary::default()
                })
            }
        }
    }
}

fn column(record: &csv::StringRecord, idx: usize) -> Result<&str> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| HpiError::Data(format!("missing column {}", idx)))
}

/// Parse one price-paid row. `Ok(None)` for deleted-status rows.
fn parse_price_paid(record: &csv::StringRecord) -> Result<Option<PricePaidRecord>> {
    let field = |idx: usize| column(record, idx);

    if field(COL_STATUS)? == "D" {
        return Ok(None);
    }

    let raw_price = field(COL_PRICE)?;
    let price_gbp: i64 = raw_price
        .parse()
        .map_err(|_| HpiError::Data(format!("invalid price {:?}", raw_price)))?;

    // "2015-06-26 00:00"
    let raw_date = field(COL_DATE)?;
    let date = raw_date
        .get(..10)
        .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| HpiError::Data(format!("invalid date {:?}", raw_date)))?;

    Ok(Some(PricePaidRecord {
        id: field(COL_ID)?.trim_matches(|c: char| c == '{' || c == '}').to_string(),
        price_gbp,
        date,
        county: field(COL_COUNTY)?.to_uppercase(),
        property_type: field(COL_PROPERTY_TYPE)?.to_string(),
        tenure: field(COL_TENURE)?.to_string(),
    }))
}

/// Stream a price-paid CSV into the store in batches
pub fn import_prices<R: Read>(
    store: &SqliteStore,
    reader: R,
    batch_size: usize,
) -> Result<ImportSummary> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut summary = ImportSummary::default();
    let mut batch = Vec::with_capacity(batch_size);
    for (line, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|e| HpiError::Data(format!("invalid CSV: {}", e)))?;
        summary.rows_read += 1;
        match parse_price_paid(&record) {
            Ok(Some(sale)) => batch.push(sale),
            Ok(None) => summary.skipped += 1,
            Err(e) => {
                tracing::debug!(line = line + 1, error = %e, "skipping malformed row");
                summary.malformed += 1;
            }
        }
        if batch.len() >= batch_size {
            summary.inserted += store.insert_records(&batch)?;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        summary.inserted += store.insert_records(&batch)?;
    }

    // INSERT OR IGNORE drops ids already present
    let duplicates = summary.rows_read - summary.inserted - summary.skipped - summary.malformed;
    summary.skipped += duplicates;
    Ok(summary)
}

#[derive(Debug, Deserialize)]
struct RegionRow {
    county: String,
    region: String,
}

/// Load a `county,region` CSV; counties are matched upper-case
pub fn import_regions<R: Read>(store: &SqliteStore, reader: R) -> Result<usize> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut mappings = Vec::new();
    for row in csv_reader.deserialize::<RegionRow>() {
        let row = row.map_err(|e| HpiError::Data(format!("invalid region CSV: {}", e)))?;
        if row.county.is_empty() || row.region.is_empty() {
            continue;
        }
        mappings.push((row.county.to_uppercase(), row.region));
    }
    store.insert_region_mappings(&mappings)
}
