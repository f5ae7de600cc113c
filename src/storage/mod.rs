//! Storage backend (Arrow/Parquet)
//!
//! Source tables are held as append-only Arrow batches. The catalog maps
//! table identifiers (e.g. `london_bicycles.cycle_hire`) to engines and is
//! what the dataset accessor queries against.

use crate::record::RawRecord;
use crate::{Error, Result};
use arrow::record_batch::RecordBatch;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Storage engine for Arrow/Parquet data
#[derive(Debug, Clone, Default)]
pub struct StorageEngine {
    batches: Vec<RecordBatch>,
}

impl StorageEngine {
    /// Create a new storage engine from existing batches
    #[must_use]
    pub fn new(batches: Vec<RecordBatch>) -> Self {
        Self { batches }
    }

    /// Load table from Parquet file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
        use std::fs::File;

        let file = File::open(path.as_ref())
            .map_err(|e| Error::StorageError(format!("Failed to open Parquet file: {e}")))?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;

        let reader = builder
            .build()
            .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch
                .map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))?;
            batches.push(batch);
        }

        debug!(path = %path.as_ref().display(), batches = batches.len(), "loaded parquet table");
        Ok(Self { batches })
    }

    /// Get all record batches
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows across batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Append a batch (the only supported write)
    ///
    /// # Errors
    ///
    /// Returns error if batch schema doesn't match existing batches
    pub fn append_batch(&mut self, batch: RecordBatch) -> Result<()> {
        if let Some(first) = self.batches.first() {
            let existing_schema = first.schema();
            if batch.schema() != existing_schema {
                return Err(Error::StorageError(format!(
                    "Schema mismatch: expected {:?}, got {:?}",
                    existing_schema,
                    batch.schema()
                )));
            }
        }

        self.batches.push(batch);
        Ok(())
    }

    /// Decode every row into a [`RawRecord`].
    ///
    /// # Errors
    ///
    /// Returns error if the table lacks the trip columns or holds nulls in them
    pub fn records(&self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            records.extend(RawRecord::from_batch(batch)?);
        }
        Ok(records)
    }
}

/// Registry of source tables by identifier
#[derive(Debug, Default)]
pub struct TableCatalog {
    tables: HashMap<String, StorageEngine>,
}

impl TableCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a table
    pub fn register(&mut self, table: impl Into<String>, storage: StorageEngine) {
        let table = table.into();
        debug!(table = %table, rows = storage.num_rows(), "registered table");
        self.tables.insert(table, storage);
    }

    /// Look up a table
    ///
    /// # Errors
    ///
    /// Returns `SourceUnavailable` if the table is unknown or holds no batches
    pub fn table(&self, table: &str) -> Result<&StorageEngine> {
        match self.tables.get(table) {
            Some(storage) if !storage.batches().is_empty() => Ok(storage),
            Some(_) => Err(Error::SourceUnavailable(format!("Table {table} has no data"))),
            None => Err(Error::SourceUnavailable(format!("Table not found: {table}"))),
        }
    }

    /// Number of registered tables
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no tables are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray};
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use parquet::arrow::ArrowWriter;
    use std::fs::File;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("trueno-features-{}-{name}", std::process::id()))
    }

    fn batch(values: Vec<i32>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(values))]).unwrap()
    }

    #[test]
    fn test_append_batch_schema_mismatch() {
        let mut storage = StorageEngine::new(vec![batch(vec![1, 2])]);
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Float64, false)]));
        let other =
            RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(vec![1.0]))]).unwrap();

        assert!(matches!(storage.append_batch(other), Err(Error::StorageError(_))));
        storage.append_batch(batch(vec![3])).unwrap();
        assert_eq!(storage.num_rows(), 3);
    }

    #[test]
    fn test_catalog_unknown_and_empty_tables() {
        let mut catalog = TableCatalog::new();
        catalog.register("empty", StorageEngine::default());
        catalog.register("ids", StorageEngine::new(vec![batch(vec![1])]));

        assert!(matches!(catalog.table("missing"), Err(Error::SourceUnavailable(_))));
        assert!(matches!(catalog.table("empty"), Err(Error::SourceUnavailable(_))));
        assert_eq!(catalog.table("ids").unwrap().num_rows(), 1);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_load_parquet_round_trip() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("duration", DataType::Int64, false),
            Field::new("start_station_name", DataType::Utf8, false),
            Field::new("start_date", DataType::Timestamp(TimeUnit::Microsecond, None), false),
        ]));
        // 2015-06-07 08:30:00 UTC
        let start = 1_433_665_800_000_000_i64;
        let trips = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(Int64Array::from(vec![600, 1200, 300])),
                Arc::new(StringArray::from(vec!["Hyde Park Corner", "Waterloo", "Soho"])),
                Arc::new(TimestampMicrosecondArray::from(vec![
                    start,
                    start + 3_600_000_000,
                    start + 7_200_000_000,
                ])),
            ],
        )
        .unwrap();

        let path = temp_path("cycle_hire.parquet");
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&trips).unwrap();
        writer.close().unwrap();

        let loaded = StorageEngine::load_parquet(&path);
        std::fs::remove_file(&path).unwrap();
        let storage = loaded.unwrap();

        assert_eq!(storage.num_rows(), 3);
        let records = storage.records().unwrap();
        assert_eq!(records[1].start_station_name(), "Waterloo");
        assert!((records[2].duration() - 300.0).abs() < f64::EPSILON);
        assert_eq!(records[0].start_date().timestamp(), 1_433_665_800);
    }

    #[test]
    fn test_load_parquet_missing_or_corrupt() {
        let missing = temp_path("missing.parquet");
        assert!(matches!(StorageEngine::load_parquet(&missing), Err(Error::StorageError(_))));

        let garbage = temp_path("garbage.parquet");
        std::fs::write(&garbage, b"not a parquet file").unwrap();
        let loaded = StorageEngine::load_parquet(&garbage);
        std::fs::remove_file(&garbage).unwrap();
        assert!(matches!(loaded, Err(Error::StorageError(_))));
    }
}
