use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::path::Path;

use super::{
    ExtractedMetrics, MetricStrategy, PER_AREA_COLUMN_PHRASE, ROW_PHRASE, SourceFormat,
    TABLE_PHRASE, TOTAL_COLUMN_PHRASE, parse_number,
};

const QUERY: &str = "
    SELECT Value
    FROM TabularDataWithStrings
    WHERE lower(TableName) LIKE ?1
      AND lower(RowName) = ?2
      AND lower(ColumnName) LIKE ?3
    LIMIT 1
";

/// Reads the engine's SQLite output (`TabularDataWithStrings`).
pub struct StructuredStrategy {
    file_name: &'static str,
}

impl Default for StructuredStrategy {
    fn default() -> Self {
        Self {
            file_name: "eplusout.sql",
        }
    }
}

impl StructuredStrategy {
    fn lookup(conn: &Connection, column_phrase: &str) -> rusqlite::Result<Option<f64>> {
        let value: Option<Value> = conn
            .query_row(
                QUERY,
                params![
                    format!("{TABLE_PHRASE}%"),
                    ROW_PHRASE,
                    format!("{column_phrase}%"),
                ],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match value {
            Some(Value::Text(text)) => parse_number(&text),
            Some(Value::Real(v)) => Some(v).filter(|v| v.is_finite()),
            Some(Value::Integer(v)) => Some(v as f64),
            _ => None,
        })
    }

    fn query(&self, path: &Path) -> rusqlite::Result<(Option<f64>, Option<f64>)> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let total = Self::lookup(&conn, TOTAL_COLUMN_PHRASE)?;
        let per_area = Self::lookup(&conn, PER_AREA_COLUMN_PHRASE)?;
        Ok((total, per_area))
    }
}

impl MetricStrategy for StructuredStrategy {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn try_extract(&self, output_dir: &Path) -> Option<ExtractedMetrics> {
        let path = output_dir.join(self.file_name);
        if !path.is_file() {
            return None;
        }
        match self.query(&path) {
            Ok((total, per_area)) => Some(ExtractedMetrics {
                total,
                per_area,
                source: SourceFormat::Structured,
            }),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unreadable SQLite output");
                None
            }
        }
    }
}
