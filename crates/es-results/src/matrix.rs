//! Grid document holding one metric for every (scenario, aging) column and year row.
//!
//! Coordinates are 1-based like a spreadsheet:
//! - row 1: `Year`, then scenario headers
//! - row 2: blank, then aging-code headers
//! - row `3 + (year - YEARS_START)`: the year in column 1, values from column 2

use es_core::{AgingCode, HEADER_ROWS, ScenarioKey, YEARS_END, YEARS_START, matrix_years};
use serde::{Deserialize, Serialize};

use crate::{ResultsError, ResultsResult};

const FIRST_DATA_COLUMN: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl Cell {
    fn header_text(&self) -> String {
        match self {
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Empty => String::new(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }
}

static EMPTY: Cell = Cell::Empty;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMatrix {
    pub sheet: String,
    rows: Vec<Vec<Cell>>,
}

impl Default for ResultMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultMatrix {
    /// Fresh matrix with the header rows and the year column filled in.
    pub fn new() -> Self {
        let mut rows = vec![vec![Cell::Text("Year".into())], vec![Cell::Text(String::new())]];
        rows.extend(matrix_years().map(|year| vec![Cell::Number(f64::from(year))]));
        Self {
            sheet: "Results".to_string(),
            rows,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> ResultsResult<Self> {
        let matrix: Self = serde_json::from_slice(bytes)?;
        if matrix.rows.len() < HEADER_ROWS {
            return Err(ResultsError::MalformedMatrix {
                message: format!("expected at least {HEADER_ROWS} header rows"),
            });
        }
        Ok(matrix)
    }

    pub fn to_vec(&self) -> ResultsResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn max_column(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0).max(1)
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        row.checked_sub(1)
            .zip(column.checked_sub(1))
            .and_then(|(r, c)| self.rows.get(r)?.get(c))
            .unwrap_or(&EMPTY)
    }

    /// Set a cell, growing the grid as needed. Zero coordinates are ignored.
    pub fn set_cell(&mut self, row: usize, column: usize, value: Cell) {
        if row == 0 || column == 0 {
            return;
        }
        if self.rows.len() < row {
            self.rows.resize_with(row, Vec::new);
        }
        let cells = &mut self.rows[row - 1];
        if cells.len() < column {
            cells.resize_with(column, Cell::default);
        }
        cells[column - 1] = value;
    }

    pub fn row_for_year(year: i32) -> ResultsResult<usize> {
        if !(YEARS_START..=YEARS_END).contains(&year) {
            return Err(ResultsError::YearOutOfRange {
                year,
                start: YEARS_START,
                end: YEARS_END,
            });
        }
        Ok(HEADER_ROWS + 1 + (year - YEARS_START) as usize)
    }

    /// Existing column whose headers name this pair. Scenario headers are
    /// compared after normalization, so `RCP85` and `RCP8.5` match.
    pub fn find_column(&self, scenario: ScenarioKey, aging: AgingCode) -> Option<usize> {
        (FIRST_DATA_COLUMN..=self.max_column()).find(|&column| {
            let header_scenario = self.cell(1, column).header_text();
            let header_aging = self.cell(2, column).header_text();
            header_scenario.parse::<ScenarioKey>().ok() == Some(scenario)
                && header_aging.parse::<AgingCode>().ok() == Some(aging)
        })
    }

    /// Column for this pair, appending one with header cells if absent.
    pub fn resolve_column(&mut self, scenario: ScenarioKey, aging: AgingCode) -> usize {
        if let Some(column) = self.find_column(scenario, aging) {
            return column;
        }
        let column = (self.max_column() + 1).max(FIRST_DATA_COLUMN);
        self.set_cell(1, column, Cell::Text(scenario.dotted().to_string()));
        self.set_cell(2, column, Cell::Text(aging.to_string()));
        column
    }

    /// Overwrite the value at (pair, year). Fails before touching the grid
    /// if the year is outside the row axis.
    pub fn set_value(
        &mut self,
        scenario: ScenarioKey,
        aging: AgingCode,
        year: i32,
        value: f64,
    ) -> ResultsResult<(usize, usize)> {
        let row = Self::row_for_year(year)?;
        let column = self.resolve_column(scenario, aging);
        self.set_cell(row, column, Cell::Number(value));
        Ok((row, column))
    }

    pub fn value_at(&self, scenario: ScenarioKey, aging: AgingCode, year: i32) -> Option<f64> {
        let row = Self::row_for_year(year).ok()?;
        let column = self.find_column(scenario, aging)?;
        self.cell(row, column).as_number()
    }

    /// Header pairs of the data columns, in column order.
    pub fn columns(&self) -> Vec<(String, String)> {
        (FIRST_DATA_COLUMN..=self.max_column())
            .map(|c| (self.cell(1, c).header_text(), self.cell(2, c).header_text()))
            .filter(|(s, a)| !s.is_empty() || !a.is_empty())
            .collect()
    }
}
