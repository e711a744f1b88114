//! Plain-text tables and JSON output for CLI commands

use serde::Serialize;

use crate::services::TrendView;
use crate::types::{
    BandChange, EconomicSeries, HpiError, PriceBandRow, QuantileRow, Result, VolumeRow,
};

/// Pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| HpiError::Data(format!("JSON serialization failed: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Left-aligned first column, right-aligned rest
fn text_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(0);
                if i == 0 {
                    format!("{:<width$}", cell)
                } else {
                    format!("{:>width$}", cell)
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers);
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1)));
    for row in rows {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}

/// Thousands-separated whole number
pub fn format_amount(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn format_cell(value: Option<f64>, rebased: bool) -> String {
    match value {
        None => "-".to_string(),
        Some(v) if rebased => format!("{:.3}", v),
        Some(v) => format_amount(v),
    }
}

pub fn trend_view(view: &TrendView) -> String {
    let table = &view.table;
    let mut headers = vec!["Year".to_string()];
    headers.extend(table.regions().iter().cloned());

    let rows: Vec<Vec<String>> = table
        .years()
        .iter()
        .enumerate()
        .map(|(row, year)| {
            let mut cells = vec![year.to_string()];
            for col in 0..table.regions().len() {
                cells.push(format_cell(table.cell(row, col), view.rebased));
            }
            cells
        })
        .collect();

    let mut out = format!("{}\n{}", view.title, view.axis_label);
    if let Some(base_year) = view.base_year {
        out.push_str(&format!(" (base year {})", base_year));
    }
    out.push_str("\n\n");
    out.push_str(&text_table(&headers, &rows));

    if let Some(changes) = &view.total_change {
        out.push_str("\n\nTotal change");
        for change in changes {
            out.push_str(&format!(
                "\n  {}: {:+.1}% ({}-{})",
                change.region, change.change_pct, change.first_year, change.last_year
            ));
        }
    }
    if let Some(fx) = &view.fx_context {
        out.push_str("\n\nGBP/USD");
        for (year, rate) in fx.iter() {
            out.push_str(&format!("\n  {}: {:.4}", year, rate));
        }
    }
    out
}

pub fn quantiles(rows: &[QuantileRow]) -> String {
    let headers: Vec<String> = ["Year", "Region", "P25", "Median", "P75", "IQR"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.year.to_string(),
                r.region.clone(),
                format_amount(r.p25),
                format_amount(r.p50),
                format_amount(r.p75),
                format_amount(r.iqr()),
            ]
        })
        .collect();
    text_table(&headers, &body)
}

pub fn volumes(rows: &[VolumeRow]) -> String {
    let by_quarter = rows.iter().any(|r| r.quarter.is_some());
    let mut headers = vec!["Year".to_string()];
    if by_quarter {
        headers.push("Quarter".to_string());
    }
    headers.push("Region".to_string());
    headers.push("Sales".to_string());

    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut cells = vec![r.year.to_string()];
            if by_quarter {
                cells.push(r.quarter.map(|q| format!("Q{}", q)).unwrap_or_default());
            }
            cells.push(r.region.clone());
            cells.push(format_amount(r.transaction_count as f64));
            cells
        })
        .collect();
    text_table(&headers, &body)
}

/// Band counts summed over quarters, then the year-over-year table
pub fn price_bands(
    rows: &[PriceBandRow],
    labels: &[String],
    changes: &[BandChange],
    year: i32,
) -> String {
    let mut totals: Vec<(i32, &str, &str, u64)> = Vec::new();
    for row in rows {
        match totals.iter_mut().find(|(y, region, band, _)| {
            *y == row.year && *region == row.region && *band == row.price_band
        }) {
            Some(total) => total.3 += row.transaction_count,
            None => totals.push((
                row.year,
                row.region.as_str(),
                row.price_band.as_str(),
                row.transaction_count,
            )),
        }
    }
    let band_order = |band: &str| labels.iter().position(|l| l == band).unwrap_or(usize::MAX);
    totals.sort_by(|a, b| (a.0, a.1, band_order(a.2)).cmp(&(b.0, b.1, band_order(b.2))));

    let headers: Vec<String> = ["Year", "Region", "Band", "Sales"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let body: Vec<Vec<String>> = totals
        .iter()
        .map(|(y, region, band, count)| {
            vec![
                y.to_string(),
                region.to_string(),
                band.to_string(),
                format_amount(*count as f64),
            ]
        })
        .collect();

    let yoy_headers = vec![
        "Band".to_string(),
        year.saturating_sub(1).to_string(),
        year.to_string(),
        "Change".to_string(),
    ];
    let yoy_body: Vec<Vec<String>> = changes
        .iter()
        .map(|c| {
            vec![
                c.price_band.clone(),
                format_amount(c.previous as f64),
                format_amount(c.current as f64),
                c.change_pct
                    .map(|pct| format!("{:+.1}%", pct))
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();

    format!(
        "{}\n\nYear-over-year change, all selected regions\n\n{}",
        text_table(&headers, &body),
        text_table(&yoy_headers, &yoy_body)
    )
}

pub fn series(series: &EconomicSeries) -> String {
    let headers = vec!["Year".to_string(), series.kind.to_string()];
    let body: Vec<Vec<String>> = series
        .iter()
        .map(|(year, value)| vec![year.to_string(), format!("{:.4}", value)])
        .collect();
    text_table(&headers, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SeriesKind;

    #[test]
    fn test_format_amount_groups_thousands() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(999.4), "999");
        assert_eq!(format_amount(1_250_000.0), "1,250,000");
        assert_eq!(format_amount(-45_000.0), "-45,000");
    }

    #[test]
    fn test_format_cell() {
        assert_eq!(format_cell(None, false), "-");
        assert_eq!(format_cell(Some(1.0), true), "1.000");
        assert_eq!(format_cell(Some(450_000.0), false), "450,000");
    }

    #[test]
    fn test_text_table_alignment() {
        let headers = vec!["Year".to_string(), "London".to_string()];
        let rows = vec![vec!["2015".to_string(), "450,000".to_string()]];

        let out = text_table(&headers, &rows);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0], "Year   London");
        assert_eq!(lines[1], "-------------");
        assert_eq!(lines[2], "2015  450,000");
    }

    #[test]
    fn test_series_table() {
        let s = EconomicSeries::new(SeriesKind::Cpi, [(2015, 100.0)].into_iter().collect());
        let out = series(&s);
        assert_eq!(out.lines().next(), Some("Year    UK CPI"));
        assert!(out.ends_with("2015  100.0000"));
    }

    #[test]
    fn test_price_bands_sums_quarters() {
        let row = |quarter: u32, count: u64| PriceBandRow {
            year: 2023,
            quarter,
            region: "London".to_string(),
            price_band: "0K-500K".to_string(),
            transaction_count: count,
        };
        let labels = vec!["0K-500K".to_string(), "Over 500K".to_string()];

        let out = price_bands(&[row(1, 3), row(2, 4)], &labels, &[], 2023);

        assert!(out.contains("2023  London  0K-500K      7"));
    }
}
