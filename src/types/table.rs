//! Year × region matrix of (normalized) prices

use serde::Serialize;

/// Dense year × region matrix. Rows are ascending years, columns keep the
/// caller's region order. A cell is `None` when the group had no transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidePriceTable {
    years: Vec<i32>,
    regions: Vec<String>,
    /// Row-major: `cells[row][column]`
    cells: Vec<Vec<Option<f64>>>,
}

/// Percentage change between a region's first and last observed values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionChange {
    pub region: String,
    pub first_year: i32,
    pub last_year: i32,
    pub change_pct: f64,
}

impl WidePriceTable {
    /// All-absent table with the given axes
    pub fn empty(years: Vec<i32>, regions: Vec<String>) -> Self {
        let cells = vec![vec![None; regions.len()]; years.len()];
        Self {
            years,
            regions,
            cells,
        }
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn row_index(&self, year: i32) -> Option<usize> {
        self.years.binary_search(&year).ok()
    }

    pub fn column_index(&self, region: &str) -> Option<usize> {
        self.regions.iter().position(|r| r == region)
    }

    pub fn get(&self, year: i32, region: &str) -> Option<f64> {
        let row = self.row_index(year)?;
        let col = self.column_index(region)?;
        self.cells[row][col]
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row)?.get(col).copied().flatten()
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        self.cells[row][col] = Some(value);
    }

    /// Number of present cells
    pub fn cell_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// Present cells of one column as (year, value), ascending by year
    pub fn column(&self, col: usize) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.years
            .iter()
            .zip(self.cells.iter())
            .filter_map(move |(year, row)| row.get(col).copied().flatten().map(|v| (*year, v)))
    }

    /// Earliest present cell of a column
    pub fn first_observed(&self, col: usize) -> Option<(i32, f64)> {
        self.column(col).next()
    }

    /// Rewrite every present cell; fails on the first error
    pub fn try_map_cells<F>(mut self, mut f: F) -> crate::types::Result<Self>
    where
        F: FnMut(i32, usize, f64) -> crate::types::Result<f64>,
    {
        for (row, year) in self.years.iter().enumerate() {
            for col in 0..self.regions.len() {
                if let Some(v) = self.cells[row][col] {
                    self.cells[row][col] = Some(f(*year, col, v)?);
                }
            }
        }
        Ok(self)
    }

    /// Per-region percentage change from first to last observed cell.
    /// Regions with fewer than two cells or a zero first value are skipped.
    pub fn total_change(&self) -> Vec<RegionChange> {
        (0..self.regions.len())
            .filter_map(|col| {
                let mut cells = self.column(col);
                let (first_year, first) = cells.next()?;
                let (last_year, last) = cells.last()?;
                if first == 0.0 {
                    return None;
                }
                Some(RegionChange {
                    region: self.regions[col].clone(),
                    first_year,
                    last_year,
                    change_pct: (last / first - 1.0) * 100.0,
                })
            })
            .collect()
    }
}
