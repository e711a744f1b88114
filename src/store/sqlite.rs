//! SQLite-backed transaction store

use chrono::NaiveDate;
use parking_lot::Mutex;
use rayon::prelude::*;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::BTreeMap;
use std::path::Path;

use super::{quantile_row, TransactionStore};
use crate::types::{
    PriceBandQuery, PriceBandRow, PriceQuery, QuantileRow, Result, VolumeQuery, VolumeRow,
};

const YEAR_EXPR: &str = "CAST(strftime('%Y', p.date) AS INTEGER)";
const QUARTER_EXPR: &str = "((CAST(strftime('%m', p.date) AS INTEGER) + 2) / 3)";

/// One sale as stored in `price_paid`
#[derive(Debug, Clone, PartialEq)]
pub struct PricePaidRecord {
    pub id: String,
    pub price_gbp: i64,
    pub date: NaiveDate,
    pub county: String,
    /// D, S, T, F or O
    pub property_type: String,
    /// F (freehold) or L (leasehold)
    pub tenure: String,
}

/// Transaction store over a SQLite database with `price_paid` and
/// `county_region` tables
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    /// In-memory database (for tests and scratch imports)
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        setup_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert sales, skipping ids already present. Returns rows inserted.
    pub fn insert_records(&self, records: &[PricePaidRecord]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO price_paid (id, price_gbp, date, county, property_type, tenure)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for r in records {
                inserted += stmt.execute(params![
                    r.id,
                    r.price_gbp,
                    r.date.format("%Y-%m-%d").to_string(),
                    r.county,
                    r.property_type,
                    r.tenure,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Insert or replace county → region mappings. Returns rows written.
    pub fn insert_region_mappings(&self, mappings: &[(String, String)]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR REPLACE INTO county_region (county, region) VALUES (?1, ?2)")?;
            for (county, region) in mappings {
                written += stmt.execute(params![county, region])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    pub fn record_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM price_paid", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn setup_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS price_paid (
            id TEXT PRIMARY KEY,
            price_gbp INTEGER NOT NULL,
            date TEXT NOT NULL,
            county TEXT NOT NULL,
            property_type TEXT NOT NULL DEFAULT '',
            tenure TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS idx_price_paid_date ON price_paid(date);
        CREATE INDEX IF NOT EXISTS idx_price_paid_county ON price_paid(county);
        CREATE TABLE IF NOT EXISTS county_region (
            county TEXT PRIMARY KEY,
            region TEXT NOT NULL
        );",
    )?;
    Ok(())
}

/// `?, ?, ?` for an IN list
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// WHERE clause over year range, optional regions and optional leasehold
/// flat filter, with its bound values in order
fn build_filter(
    start_year: i32,
    end_year: i32,
    regions: Option<&[String]>,
    leasehold_flats_only: bool,
) -> (String, Vec<Value>) {
    let mut conditions = vec![format!("{} BETWEEN ? AND ?", YEAR_EXPR)];
    let mut values = vec![
        Value::Integer(i64::from(start_year)),
        Value::Integer(i64::from(end_year)),
    ];

    if let Some(regions) = regions.filter(|r| !r.is_empty()) {
        conditions.push(format!("c.region IN ({})", placeholders(regions.len())));
        values.extend(regions.iter().map(|r| Value::Text(r.clone())));
    }

    if leasehold_flats_only {
        conditions.push("p.property_type = 'F'".to_string());
        conditions.push("p.tenure = 'L'".to_string());
    }

    (conditions.join(" AND "), values)
}

impl TransactionStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn regional_quantiles(&self, query: &PriceQuery) -> Result<Vec<QuantileRow>> {
        if query.regions().is_empty() {
            return Ok(Vec::new());
        }

        let (where_clause, values) =
            build_filter(query.start_year, query.end_year, Some(query.regions()), false);
        let sql = format!(
            "SELECT {year} AS year, c.region, p.price_gbp
             FROM price_paid p
             INNER JOIN county_region c ON p.county = c.county
             WHERE {where_clause}
             ORDER BY year, c.region, p.price_gbp",
            year = YEAR_EXPR,
        );

        // Rows arrive sorted, so each (year, region) group is contiguous and
        // its prices ascending.
        let mut groups: Vec<(i32, String, Vec<f64>)> = Vec::new();
        {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?;
            for row in rows {
                let (year, region, price) = row?;
                match groups.last_mut() {
                    Some((y, r, prices)) if *y == year && *r == region => prices.push(price),
                    _ => groups.push((year, region, vec![price])),
                }
            }
        }

        let result: Vec<QuantileRow> = groups
            .into_par_iter()
            .filter_map(|(year, region, prices)| quantile_row(year, region, &prices))
            .collect();

        tracing::debug!(groups = result.len(), "computed regional quantiles");
        Ok(result)
    }

    fn regions(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT DISTINCT region FROM county_region ORDER BY region")?;
        let regions = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(regions)
    }

    fn year_bounds(&self) -> Result<Option<(i32, i32)>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT MIN({year}), MAX({year}) FROM price_paid p",
            year = YEAR_EXPR
        );
        let (min, max): (Option<i32>, Option<i32>) =
            conn.query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(min.zip(max))
    }

    fn transaction_volumes(&self, query: &VolumeQuery) -> Result<Vec<VolumeRow>> {
        let (where_clause, values) = build_filter(
            query.start_year,
            query.end_year,
            query.regions.as_deref(),
            query.leasehold_flats_only,
        );

        let quarter_col = if query.by_quarter {
            format!("{} AS quarter,", QUARTER_EXPR)
        } else {
            "NULL AS quarter,".to_string()
        };
        let group_by = if query.by_quarter {
            "year, quarter, c.region"
        } else {
            "year, c.region"
        };
        let sql = format!(
            "SELECT {year} AS year, {quarter_col} c.region, COUNT(*)
             FROM price_paid p
             INNER JOIN county_region c ON p.county = c.county
             WHERE {where_clause}
             GROUP BY {group_by}
             ORDER BY {group_by}",
            year = YEAR_EXPR,
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(VolumeRow {
                    year: row.get(0)?,
                    quarter: row.get::<_, Option<u32>>(1)?,
                    region: row.get(2)?,
                    transaction_count: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn price_band_volumes(&self, query: &PriceBandQuery) -> Result<Vec<PriceBandRow>> {
        let (where_clause, values) = build_filter(
            query.start_year,
            query.end_year,
            query.regions.as_deref(),
            false,
        );
        let sql = format!(
            "SELECT {year} AS year, {quarter} AS quarter, c.region, p.price_gbp
             FROM price_paid p
             INNER JOIN county_region c ON p.county = c.county
             WHERE {where_clause}",
            year = YEAR_EXPR,
            quarter = QUARTER_EXPR,
        );

        let mut counts: BTreeMap<(i32, u32, String, usize), u64> = BTreeMap::new();
        {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?;
            for row in rows {
                let (year, quarter, region, price) = row?;
                let band = query.bands.band_index(price);
                *counts.entry((year, quarter, region, band)).or_insert(0) += 1;
            }
        }

        let labels = query.bands.labels();
        Ok(counts
            .into_iter()
            .map(|((year, quarter, region, band), count)| PriceBandRow {
                year,
                quarter,
                region,
                price_band: labels[band].clone(),
                transaction_count: count,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceBands;

    fn record(id: &str, price: i64, date: &str, county: &str) -> PricePaidRecord {
        record_full(id, price, date, county, "T", "F")
    }

    fn record_full(
        id: &str,
        price: i64,
        date: &str,
        county: &str,
        property_type: &str,
        tenure: &str,
    ) -> PricePaidRecord {
        PricePaidRecord {
            id: id.to_string(),
            price_gbp: price,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            county: county.to_string(),
            property_type: property_type.to_string(),
            tenure: tenure.to_string(),
        }
    }

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_region_mappings(&[
                ("GREATER LONDON".to_string(), "London".to_string()),
                ("MERSEYSIDE".to_string(), "North West".to_string()),
                ("CUMBRIA".to_string(), "North West".to_string()),
            ])
            .unwrap();
        store
            .insert_records(&[
                record("a", 100, "2015-02-01", "GREATER LONDON"),
                record("b", 200, "2015-05-01", "GREATER LONDON"),
                record("c", 300, "2015-08-01", "GREATER LONDON"),
                record("d", 400, "2015-11-01", "GREATER LONDON"),
                record("e", 150, "2016-03-01", "MERSEYSIDE"),
                record("f", 90, "2016-07-01", "CUMBRIA"),
                // No region mapping: excluded everywhere
                record("g", 999_999, "2016-07-01", "ATLANTIS"),
                record_full("h", 250_000, "2016-10-01", "GREATER LONDON", "F", "L"),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_regional_quantiles_discrete() {
        let store = seeded_store();
        let q = PriceQuery::new(["London"], 2015, 2015).unwrap();

        let rows = store.regional_quantiles(&q).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].p25, 100.0);
        assert_eq!(rows[0].p50, 200.0);
        assert_eq!(rows[0].p75, 300.0);
    }

    #[test]
    fn test_regional_quantiles_groups_counties_into_region() {
        let store = seeded_store();
        let q = PriceQuery::new(["North West"], 2016, 2016).unwrap();

        let rows = store.regional_quantiles(&q).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].region, "North West");
        assert_eq!(rows[0].p50, 90.0);
    }

    #[test]
    fn test_regional_quantiles_omit_empty_groups() {
        let store = seeded_store();
        let q = PriceQuery::new(["London", "North West"], 2015, 2016).unwrap();

        let rows = store.regional_quantiles(&q).unwrap();
        let keys: Vec<(i32, &str)> = rows.iter().map(|r| (r.year, r.region.as_str())).collect();

        // North West has no 2015 sales
        assert_eq!(
            keys,
            vec![(2015, "London"), (2016, "London"), (2016, "North West")]
        );
    }

    #[test]
    fn test_unmapped_county_excluded() {
        let store = seeded_store();
        let q = PriceQuery::new(["London", "North West"], 2016, 2016).unwrap();

        let rows = store.regional_quantiles(&q).unwrap();

        assert!(rows.iter().all(|r| r.p75 < 999_999.0));
    }

    #[test]
    fn test_regional_quantiles_empty_region_set() {
        let store = seeded_store();
        let q = PriceQuery::new(Vec::<String>::new(), 2015, 2016).unwrap();
        assert!(store.regional_quantiles(&q).unwrap().is_empty());
    }

    #[test]
    fn test_regions_sorted_distinct() {
        let store = seeded_store();
        assert_eq!(store.regions().unwrap(), vec!["London", "North West"]);
    }

    #[test]
    fn test_year_bounds_includes_unmapped_sales() {
        let store = seeded_store();
        assert_eq!(store.year_bounds().unwrap(), Some((2015, 2016)));
    }

    #[test]
    fn test_year_bounds_empty_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.year_bounds().unwrap(), None);
    }

    #[test]
    fn test_insert_records_is_idempotent() {
        let store = seeded_store();
        let again = store
            .insert_records(&[record("a", 100, "2015-02-01", "GREATER LONDON")])
            .unwrap();
        assert_eq!(again, 0);
        assert_eq!(store.record_count().unwrap(), 8);
    }

    #[test]
    fn test_transaction_volumes_by_year() {
        let store = seeded_store();
        let q = VolumeQuery {
            regions: None,
            start_year: 2015,
            end_year: 2016,
            by_quarter: false,
            leasehold_flats_only: false,
        };

        let rows = store.transaction_volumes(&q).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].year, 2015);
        assert_eq!(rows[0].region, "London");
        assert_eq!(rows[0].transaction_count, 4);
        assert!(rows.iter().all(|r| r.quarter.is_none()));
    }

    #[test]
    fn test_transaction_volumes_by_quarter() {
        let store = seeded_store();
        let q = VolumeQuery {
            regions: Some(vec!["London".to_string()]),
            start_year: 2015,
            end_year: 2015,
            by_quarter: true,
            leasehold_flats_only: false,
        };

        let rows = store.transaction_volumes(&q).unwrap();
        let quarters: Vec<Option<u32>> = rows.iter().map(|r| r.quarter).collect();

        assert_eq!(quarters, vec![Some(1), Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn test_transaction_volumes_leasehold_flats() {
        let store = seeded_store();
        let q = VolumeQuery {
            regions: None,
            start_year: 2015,
            end_year: 2016,
            by_quarter: false,
            leasehold_flats_only: true,
        };

        let rows = store.transaction_volumes(&q).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].year, 2016);
        assert_eq!(rows[0].transaction_count, 1);
    }

    #[test]
    fn test_price_band_volumes() {
        let store = seeded_store();
        let q = PriceBandQuery {
            bands: PriceBands::new(100, 200).unwrap(),
            regions: Some(vec!["London".to_string()]),
            start_year: 2016,
            end_year: 2016,
        };

        let rows = store.price_band_volumes(&q).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quarter, 4);
        assert_eq!(rows[0].price_band, "Over 200K");
    }
}
