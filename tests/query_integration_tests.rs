//! Integration tests for exploratory aggregation queries
//!
//! SQL -> QueryEngine -> TableCatalog (DataSource) -> ordered rows

use arrow::array::{Float64Array, RecordBatch, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use trueno_features::query::{
    AggregateFunction, AggregationSpec, DataSource, GroupKey, GroupValue, QueryEngine,
};
use trueno_features::record::RawRecord;
use trueno_features::storage::{StorageEngine, TableCatalog};
use trueno_features::Error;

const TABLE: &str = "london_bicycles.cycle_hire";

fn micros(day: u32, hour: u32) -> i64 {
    // June 2015: the 7th is a Sunday
    Utc.with_ymd_and_hms(2015, 6, day, hour, 0, 0)
        .unwrap()
        .timestamp_micros()
}

/// Helper function to create test data
fn create_catalog() -> TableCatalog {
    let schema = Arc::new(Schema::new(vec![
        Field::new("duration", DataType::Float64, false),
        Field::new("start_station_name", DataType::Utf8, false),
        Field::new("start_date", DataType::Timestamp(TimeUnit::Microsecond, None), false),
        Field::new("end_station_name", DataType::Utf8, true),
    ]));

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Float64Array::from(vec![1_800.0, 2_400.0, 600.0, 500.0, 700.0])),
            Arc::new(StringArray::from(vec![
                "Hyde Park Corner",
                "Hyde Park Corner",
                "Waterloo",
                "Waterloo",
                "Soho",
            ])),
            Arc::new(TimestampMicrosecondArray::from(vec![
                micros(7, 14), // Sunday
                micros(13, 15), // Saturday
                micros(8, 8),   // Monday
                micros(8, 9),   // Monday
                micros(10, 18), // Wednesday
            ])),
            Arc::new(StringArray::from(vec![Some("Soho"), None, Some("Bank"), None, None])),
        ],
    )
    .unwrap();

    let mut storage = StorageEngine::new(vec![]);
    storage.append_batch(batch).unwrap();

    let mut catalog = TableCatalog::new();
    catalog.register(TABLE, storage);
    catalog
}

fn run(catalog: &TableCatalog, sql: &str) -> Vec<(GroupValue, Option<f64>)> {
    let spec = QueryEngine::new().parse(sql).unwrap();
    catalog.query(&spec).unwrap().map(|row| (row.key, row.value)).collect()
}

#[test]
fn test_avg_duration_by_dayofweek() {
    let catalog = create_catalog();
    let rows = run(
        &catalog,
        &format!(
            "SELECT EXTRACT(DAYOFWEEK FROM start_date) AS dayofweek, AVG(duration) AS avg_duration \
             FROM {TABLE} GROUP BY dayofweek"
        ),
    );

    assert_eq!(
        rows,
        vec![
            (GroupValue::Int(1), Some(1_800.0)),
            (GroupValue::Int(2), Some(550.0)),
            (GroupValue::Int(4), Some(700.0)),
            (GroupValue::Int(7), Some(2_400.0)),
        ]
    );
}

#[test]
fn test_count_by_station_ordered_by_key() {
    let catalog = create_catalog();
    let rows = run(
        &catalog,
        &format!("SELECT start_station_name, COUNT(*) FROM {TABLE} GROUP BY start_station_name"),
    );

    let keys: Vec<String> = rows.iter().map(|(k, _)| k.to_string()).collect();
    assert_eq!(keys, vec!["Hyde Park Corner", "Soho", "Waterloo"]);
    assert_eq!(rows.iter().filter_map(|(_, v)| *v).sum::<f64>(), 5.0);
}

#[test]
fn test_hour_of_day_cast_to_string() {
    let catalog = create_catalog();
    let rows = run(
        &catalog,
        &format!(
            "SELECT CAST(EXTRACT(HOUR FROM start_date) AS STRING) AS hourofday, MAX(duration) \
             FROM {TABLE} GROUP BY hourofday"
        ),
    );
    assert_eq!(rows.len(), 5);
    assert_eq!(rows.first(), Some(&(GroupValue::Int(8), Some(600.0))));
}

#[test]
fn test_rows_stream_with_exact_size() {
    let catalog = create_catalog();
    let spec = AggregationSpec::new(
        TABLE,
        GroupKey::Column("start_station_name".to_string()),
        AggregateFunction::Sum,
        "duration",
    );
    let rows = catalog.query(&spec).unwrap();
    assert_eq!(rows.len(), 3);
}

#[test]
fn test_unknown_table() {
    let catalog = create_catalog();
    let spec = QueryEngine::new()
        .parse("SELECT start_station_name, AVG(duration) FROM nowhere GROUP BY start_station_name")
        .unwrap();
    assert!(matches!(catalog.query(&spec), Err(Error::SourceUnavailable(_))));
}

#[test]
fn test_unknown_column() {
    let catalog = create_catalog();
    let spec = AggregationSpec::new(
        TABLE,
        GroupKey::Column("bike_id".to_string()),
        AggregateFunction::Avg,
        "duration",
    );
    assert!(matches!(catalog.query(&spec), Err(Error::InvalidField(_))));
}

#[test]
fn test_unsupported_sql() {
    let engine = QueryEngine::new();
    assert!(matches!(engine.parse("DELETE FROM cycle_hire"), Err(Error::ParseError(_))));
    assert!(engine.parse("SELECT FROM WHERE").is_err());
}

#[test]
fn test_records_decode_optional_end_station() {
    let catalog = create_catalog();
    let records: Vec<RawRecord> = catalog.table(TABLE).unwrap().records().unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[0].end_station_name(), Some("Soho"));
    assert_eq!(records[1].end_station_name(), None);
}
