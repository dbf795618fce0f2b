use std::path::Path;

use super::{
    ExtractedMetrics, MetricStrategy, PER_AREA_COLUMN_PHRASE, ROW_PHRASE, SourceFormat,
    TABLE_PHRASE, TOTAL_COLUMN_PHRASE, parse_number,
};

const REPORT_PHRASE: &str = "annual building utility performance summary";
/// Rows searched after the report title for the table title.
const TABLE_WINDOW: usize = 40;
/// Rows searched after the table title for the column header row.
const HEADER_WINDOW: usize = 15;

/// Marker-driven search through the engine's tabular text report.
pub struct DelimitedStrategy {
    file_name: &'static str,
    delimiter: u8,
    source: SourceFormat,
}

impl DelimitedStrategy {
    pub fn tab() -> Self {
        Self {
            file_name: "eplustbl.tab",
            delimiter: b'\t',
            source: SourceFormat::Tab,
        }
    }

    pub fn csv() -> Self {
        Self {
            file_name: "eplustbl.csv",
            delimiter: b',',
            source: SourceFormat::Csv,
        }
    }

    /// Split the report into trimmed cells, one entry per physical line.
    /// Blank lines stay in as empty rows since they terminate tables.
    fn read_rows(&self, text: &str) -> Vec<Vec<String>> {
        text.lines()
            .map(|line| {
                if line.trim().is_empty() {
                    return Vec::new();
                }
                let mut reader = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .delimiter(self.delimiter)
                    .from_reader(line.as_bytes());
                match reader.records().next() {
                    Some(Ok(record)) => record.iter().map(|c| c.trim().to_string()).collect(),
                    _ => line
                        .split(char::from(self.delimiter))
                        .map(|c| c.trim().to_string())
                        .collect(),
                }
            })
            .collect()
    }

    fn find_metrics(rows: &[Vec<String>]) -> Option<(Option<f64>, Option<f64>)> {
        for (i, row) in rows.iter().enumerate() {
            if !contains_phrase(row, REPORT_PHRASE) {
                continue;
            }
            let table_end = (i + TABLE_WINDOW).min(rows.len());
            for j in (i + 1)..table_end {
                if !contains_phrase(&rows[j], TABLE_PHRASE) {
                    continue;
                }
                if let Some(found) = Self::read_table(rows, j) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Look for the header row below the table title at `title`, then the
    /// metric row inside that table.
    fn read_table(rows: &[Vec<String>], title: usize) -> Option<(Option<f64>, Option<f64>)> {
        let header_end = (title + HEADER_WINDOW).min(rows.len());
        let header_idx = ((title + 1)..header_end).find(|&k| {
            contains_phrase(&rows[k], TOTAL_COLUMN_PHRASE)
                && contains_phrase(&rows[k], PER_AREA_COLUMN_PHRASE)
        })?;

        let header = &rows[header_idx];
        let col_total = column_containing(header, TOTAL_COLUMN_PHRASE)?;
        let col_per_area = column_containing(header, PER_AREA_COLUMN_PHRASE)?;

        for row in &rows[header_idx + 1..] {
            if row.iter().all(|c| c.is_empty()) {
                break;
            }
            if row_label(row).eq_ignore_ascii_case(ROW_PHRASE) {
                let total = row.get(col_total).and_then(|c| parse_number(c));
                let per_area = row.get(col_per_area).and_then(|c| parse_number(c));
                return Some((total, per_area));
            }
        }
        None
    }
}

fn contains_phrase(row: &[String], phrase: &str) -> bool {
    row.iter().any(|c| c.to_lowercase().contains(phrase))
}

fn column_containing(header: &[String], phrase: &str) -> Option<usize> {
    header.iter().position(|c| c.to_lowercase().contains(phrase))
}

/// First non-empty cell; engine tables are written with a leading blank column.
fn row_label(row: &[String]) -> &str {
    row.iter()
        .map(String::as_str)
        .find(|c| !c.is_empty())
        .unwrap_or("")
}

impl MetricStrategy for DelimitedStrategy {
    fn name(&self) -> &'static str {
        match self.source {
            SourceFormat::Tab => "tab",
            _ => "csv",
        }
    }

    fn try_extract(&self, output_dir: &Path) -> Option<ExtractedMetrics> {
        let path = output_dir.join(self.file_name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable report");
                return None;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        let rows = self.read_rows(&text);
        let (total, per_area) = Self::find_metrics(&rows)?;
        Some(ExtractedMetrics {
            total,
            per_area,
            source: self.source,
        })
    }
}
