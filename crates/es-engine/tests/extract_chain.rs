use es_engine::{ExtractedMetrics, MetricExtractor, SourceFormat};
use rusqlite::{Connection, params};
use std::path::Path;
use tempfile::TempDir;

fn write_sql(dir: &Path, rows: &[(&str, &str, &str, &str)]) {
    let conn = Connection::open(dir.join("eplusout.sql")).expect("open sqlite");
    conn.execute_batch(
        "CREATE TABLE TabularDataWithStrings (
            TableName TEXT, RowName TEXT, ColumnName TEXT, Value TEXT
        );",
    )
    .expect("create table");
    for (table, row, column, value) in rows {
        conn.execute(
            "INSERT INTO TabularDataWithStrings VALUES (?1, ?2, ?3, ?4)",
            params![table, row, column, value],
        )
        .expect("insert");
    }
}

fn abups_report(delimiter: &str, total: &str, per_area: &str) -> String {
    let row = |cells: &[&str]| cells.join(delimiter);
    [
        row(&["Program Version:EnergyPlus"]),
        row(&["REPORT:", "Annual Building Utility Performance Summary"]),
        row(&["FOR:", "Entire Facility"]),
        String::new(),
        row(&["", "Site and Source Energy"]),
        String::new(),
        row(&[
            "",
            "",
            "Total Energy [kWh]",
            "Energy Per Total Building Area [kWh/m2]",
            "Energy Per Conditioned Building Area [kWh/m2]",
        ]),
        row(&["", "Total Site Energy", total, per_area, "50.1"]),
        row(&["", "Net Site Energy", "1", "2", "3"]),
        String::new(),
    ]
    .join("\n")
}

#[test]
fn structured_values_with_separators() {
    let dir = TempDir::new().unwrap();
    write_sql(
        dir.path(),
        &[
            ("Site and Source Energy", "Total Site Energy", "Total Energy", "125,000.50"),
            (
                "Site and Source Energy",
                "Total Site Energy",
                "Energy Per Total Building Area",
                " 42.3 ",
            ),
            ("Site and Source Energy", "Total Source Energy", "Total Energy", "999"),
        ],
    );

    let metrics = MetricExtractor::standard().extract(dir.path());
    assert_eq!(
        metrics,
        ExtractedMetrics {
            total: Some(125000.5),
            per_area: Some(42.3),
            source: SourceFormat::Structured,
        }
    );
}

#[test]
fn structured_wins_when_all_three_exist() {
    let dir = TempDir::new().unwrap();
    write_sql(
        dir.path(),
        &[("SITE AND SOURCE ENERGY", "total site energy", "Total Energy", "10")],
    );
    std::fs::write(dir.path().join("eplustbl.tab"), abups_report("\t", "20", "2")).unwrap();
    std::fs::write(dir.path().join("eplustbl.csv"), abups_report(",", "30", "3")).unwrap();

    let metrics = MetricExtractor::standard().extract(dir.path());
    assert_eq!(metrics.source, SourceFormat::Structured);
    assert_eq!(metrics.total, Some(10.0));
    assert_eq!(metrics.per_area, None);
}

#[test]
fn csv_only_directory_uses_csv() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("eplustbl.csv"),
        abups_report(",", "\"125,000.5\"", "42.3"),
    )
    .unwrap();

    let metrics = MetricExtractor::standard().extract(dir.path());
    assert_eq!(
        metrics,
        ExtractedMetrics {
            total: Some(125000.5),
            per_area: Some(42.3),
            source: SourceFormat::Csv,
        }
    );
}

#[test]
fn empty_sql_falls_through_to_tab() {
    let dir = TempDir::new().unwrap();
    write_sql(dir.path(), &[]);
    std::fs::write(dir.path().join("eplustbl.tab"), abups_report("\t", "7.5", "0.25")).unwrap();

    let metrics = MetricExtractor::standard().extract(dir.path());
    assert_eq!(metrics.source, SourceFormat::Tab);
    assert_eq!(metrics.total, Some(7.5));
    assert_eq!(metrics.per_area, Some(0.25));
}

#[test]
fn corrupt_sql_falls_through() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("eplusout.sql"), b"not a database").unwrap();
    std::fs::write(dir.path().join("eplustbl.csv"), abups_report(",", "1", "2")).unwrap();

    let metrics = MetricExtractor::standard().extract(dir.path());
    assert_eq!(metrics.source, SourceFormat::Csv);
}

#[test]
fn nothing_extractable() {
    let dir = TempDir::new().unwrap();
    assert_eq!(
        MetricExtractor::standard().extract(dir.path()),
        ExtractedMetrics::none()
    );

    std::fs::write(dir.path().join("eplustbl.csv"), "just,some,cells\n").unwrap();
    std::fs::write(dir.path().join("eplustbl.tab"), abups_report("\t", "x", "y")).unwrap();
    let metrics = MetricExtractor::standard().extract(dir.path());
    assert_eq!(metrics.source, SourceFormat::None);
    assert!(!metrics.has_any());
}

#[test]
fn standard_chain_order() {
    assert_eq!(
        MetricExtractor::standard().strategy_names(),
        ["structured", "tab", "csv"]
    );
}
