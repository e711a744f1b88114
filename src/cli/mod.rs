mod import;
mod render;

pub use import::{import_prices, import_regions, ImportArgs, ImportSummary, ImportTarget};

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::services::{band_year_over_year, DashboardService, SeriesDiskCache, TrendRequest};
use crate::store::SqliteStore;
use crate::types::{
    HpiError, NormalizationMode, PriceBandQuery, PriceBands, PriceQuery, Result, SeriesKind,
    VolumeQuery,
};

/// Regions selected when none are given and the store has them
const DEFAULT_REGIONS: [&str; 5] = [
    "London",
    "South East",
    "East Midlands",
    "North West",
    "North East",
];

/// Inflation- and currency-normalized UK house price trends
#[derive(Parser)]
#[command(name = "hpitrack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SQLite transaction store (overrides HPI_DB_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Region set and year range; omitted parts default from the store
#[derive(Args, Debug, Clone, Default)]
struct Selection {
    /// Region to include (repeatable)
    #[arg(short, long = "region", value_name = "REGION")]
    regions: Vec<String>,

    /// First year (default: earliest sale)
    #[arg(long)]
    start: Option<i32>,

    /// Last year (default: latest sale)
    #[arg(long)]
    end: Option<i32>,
}

#[derive(Subcommand)]
enum Commands {
    /// List regions of the county mapping
    Regions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the range of sale years in the store
    Years {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Median price trend per region
    Trends {
        #[command(flatten)]
        selection: Selection,

        #[arg(long, value_enum, default_value_t = NormalizationMode::Nominal)]
        mode: NormalizationMode,

        /// Index each region to 1.0 at its first year
        #[arg(long)]
        rebase: bool,

        /// Year real values are expressed in (overrides HPI_BASE_YEAR)
        #[arg(long)]
        base_year: Option<i32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// 25th, 50th and 75th percentile prices per region and year
    Distribution {
        #[command(flatten)]
        selection: Selection,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transaction counts per region and year
    Volumes {
        /// Region to include (repeatable; default: all)
        #[arg(short, long = "region", value_name = "REGION")]
        regions: Vec<String>,

        #[arg(long)]
        start: Option<i32>,

        #[arg(long)]
        end: Option<i32>,

        /// Split counts by quarter
        #[arg(long)]
        by_quarter: bool,

        /// Only leasehold flats
        #[arg(long)]
        leasehold_flats: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transaction counts per price band for a year and the two before it
    Bands {
        /// Region to include (repeatable; default: all)
        #[arg(short, long = "region", value_name = "REGION")]
        regions: Vec<String>,

        /// Year of interest (default: latest sale year)
        #[arg(long)]
        year: Option<i32>,

        /// Band width in £'000s
        #[arg(long, default_value_t = 100)]
        interval: u32,

        /// Upper limit of the regular bands in £'000s
        #[arg(long, default_value_t = 1000)]
        limit: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one annual economic series
    Series {
        #[arg(value_enum)]
        kind: SeriesKind,

        start: i32,

        end: i32,

        /// Base year for the real exchange rate (real-fx only)
        #[arg(long)]
        base_year: Option<i32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load CSV data into the store
    Import(ImportArgs),

    /// Delete cached economic series
    ClearCache,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let mut config = Config::from_env()?;
        if let Some(db) = self.db {
            config.database_path = db;
        }

        match self.command {
            Commands::Import(args) => {
                let store = SqliteStore::open(&config.database_path)?;
                let summary = args.run(&store)?;
                println!(
                    "read {} rows: {} inserted, {} skipped, {} malformed",
                    summary.rows_read, summary.inserted, summary.skipped, summary.malformed
                );
            }
            Commands::ClearCache => {
                let dir = match config.cache_dir.clone() {
                    Some(dir) => dir,
                    None => SeriesDiskCache::default_dir()?,
                };
                let removed = SeriesDiskCache::new(dir, config.cache_ttl_secs).clear()?;
                println!("removed {} cached series", removed);
            }
            command => {
                let service = DashboardService::from_config(&config)?;
                run_query(&service, command)?;
            }
        }
        Ok(())
    }
}

fn run_query(service: &DashboardService, command: Commands) -> Result<()> {
    let aggregator = service.aggregator();
    match command {
        Commands::Regions { json } => {
            let regions = aggregator.get_available_regions()?;
            if json {
                render::print_json(&regions)?;
            } else {
                for region in regions {
                    println!("{}", region);
                }
            }
        }
        Commands::Years { json } => {
            let (min_year, max_year) = aggregator.get_year_range()?;
            if json {
                render::print_json(&serde_json::json!({
                    "min_year": min_year,
                    "max_year": max_year,
                }))?;
            } else {
                println!("{}-{}", min_year, max_year);
            }
        }
        Commands::Trends {
            selection,
            mode,
            rebase,
            base_year,
            json,
        } => {
            let request = TrendRequest {
                query: resolve_selection(service, selection)?,
                mode,
                rebase,
                base_year,
            };
            let view = service.price_trends(&request)?;
            if json {
                render::print_json(&view)?;
            } else {
                println!("{}", render::trend_view(&view));
            }
        }
        Commands::Distribution { selection, json } => {
            let query = resolve_selection(service, selection)?;
            let rows = service.distribution(&query)?;
            if json {
                render::print_json(&rows)?;
            } else {
                println!("{}", render::quantiles(&rows));
            }
        }
        Commands::Volumes {
            regions,
            start,
            end,
            by_quarter,
            leasehold_flats,
            json,
        } => {
            let (start_year, end_year) = resolve_years(service, start, end)?;
            let query = VolumeQuery {
                regions: (!regions.is_empty()).then_some(regions),
                start_year,
                end_year,
                by_quarter,
                leasehold_flats_only: leasehold_flats,
            };
            let rows = aggregator.get_transaction_volumes(&query)?;
            if json {
                render::print_json(&rows)?;
            } else {
                println!("{}", render::volumes(&rows));
            }
        }
        Commands::Bands {
            regions,
            year,
            interval,
            limit,
            json,
        } => {
            let year = match year {
                Some(year) => year,
                None => aggregator.get_year_range()?.1,
            };
            let bands = PriceBands::new(interval, limit)?;
            let (start_year, end_year) = band_years(year);
            let query = PriceBandQuery {
                bands,
                regions: (!regions.is_empty()).then_some(regions),
                start_year,
                end_year,
            };
            let rows = aggregator.volume_by_price_band(&query)?;
            let labels = bands.labels();
            let changes = band_year_over_year(&rows, &labels, year);
            if json {
                render::print_json(&serde_json::json!({
                    "bands": labels,
                    "counts": rows,
                    "year_over_year": changes,
                }))?;
            } else {
                println!("{}", render::price_bands(&rows, &labels, &changes, year));
            }
        }
        Commands::Series {
            kind,
            start,
            end,
            base_year,
            json,
        } => {
            let series = match (kind, series_base_year(kind, base_year)?) {
                (SeriesKind::RealFx, Some(base_year)) => service
                    .provider()
                    .real_exchange_rate_at(start, end, base_year)?,
                _ => service.series(kind, start, end)?,
            };
            if json {
                render::print_json(&series)?;
            } else {
                println!("{}", render::series(&series));
            }
        }
        Commands::Import(_) | Commands::ClearCache => {}
    }
    Ok(())
}

/// Fill unset years from the store's sale year range
fn resolve_years(
    service: &DashboardService,
    start: Option<i32>,
    end: Option<i32>,
) -> Result<(i32, i32)> {
    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => {
            let (min_year, max_year) = service.aggregator().get_year_range()?;
            Ok((start.unwrap_or(min_year), end.unwrap_or(max_year)))
        }
    }
}

/// The year of interest and the two before it
fn band_years(year: i32) -> (i32, i32) {
    (year.saturating_sub(2), year)
}

/// `--base-year` only anchors the real exchange rate
fn series_base_year(kind: SeriesKind, base_year: Option<i32>) -> Result<Option<i32>> {
    match (kind, base_year) {
        (SeriesKind::RealFx, _) | (_, None) => Ok(base_year),
        (kind, Some(_)) => Err(HpiError::InvalidQuery(format!(
            "--base-year applies only to real-fx, not {}",
            kind
        ))),
    }
}

/// Regions default to the standard set present in the store, or every
/// region if none of it is
fn default_regions(available: Vec<String>) -> Vec<String> {
    let preferred: Vec<String> = DEFAULT_REGIONS
        .iter()
        .filter(|r| available.iter().any(|a| a == *r))
        .map(|r| r.to_string())
        .collect();
    if preferred.is_empty() {
        available
    } else {
        preferred
    }
}

fn resolve_selection(service: &DashboardService, selection: Selection) -> Result<PriceQuery> {
    let (start_year, end_year) = resolve_years(service, selection.start, selection.end)?;
    let regions = if selection.regions.is_empty() {
        default_regions(service.aggregator().get_available_regions()?)
    } else {
        selection.regions
    };
    if regions.is_empty() {
        return Err(HpiError::InvalidQuery(
            "no regions available; import a county,region mapping first".into(),
        ));
    }
    PriceQuery::new(regions, start_year, end_year)
}
