//! Aggregation execution against Arrow storage

use super::{AggregateFunction, AggregateRow, AggregationSpec, DataSource, DatePart, GroupKey, GroupValue};
use crate::record::{float_column, string_column, timestamp_column};
use crate::storage::{StorageEngine, TableCatalog};
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch};
use arrow::compute;
use arrow::datatypes::DataType;
use chrono::{DateTime, Datelike, Timelike};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Rows produced by an aggregation, ordered by key.
///
/// Consumed by value and not `Clone`: iterate once, re-query to read again.
#[derive(Debug)]
pub struct AggregateRows {
    rows: std::vec::IntoIter<AggregateRow>,
}

impl AggregateRows {
    fn new(rows: Vec<AggregateRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl Iterator for AggregateRows {
    type Item = AggregateRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for AggregateRows {}

enum ValueColumn {
    /// `COUNT(*)`
    Rows,
    /// `COUNT(col)`
    NonNull(ArrayRef),
    /// SUM / AVG / MIN / MAX input
    Numeric(Float64Array),
}

#[derive(Debug, Default)]
struct Accumulator {
    rows: u64,
    count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Accumulator {
    fn push(&mut self, value: Option<f64>) {
        self.rows += 1;
        if let Some(v) = value {
            self.count += 1;
            self.sum += v;
            self.min = Some(self.min.map_or(v, |m| m.min(v)));
            self.max = Some(self.max.map_or(v, |m| m.max(v)));
        }
    }

    /// SQL semantics: COUNT is never null, the rest are null without values
    #[allow(clippy::cast_precision_loss)]
    fn finish(&self, func: AggregateFunction, count_rows: bool) -> Option<f64> {
        match func {
            AggregateFunction::Count if count_rows => Some(self.rows as f64),
            AggregateFunction::Count => Some(self.count as f64),
            _ if self.count == 0 => None,
            AggregateFunction::Sum => Some(self.sum),
            AggregateFunction::Avg => Some(self.sum / self.count as f64),
            AggregateFunction::Min => self.min,
            AggregateFunction::Max => self.max,
        }
    }
}

/// Group-by aggregation executor
#[derive(Debug, Default)]
pub struct QueryExecutor {
    _private: (),
}

impl QueryExecutor {
    /// Create a new executor
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Aggregate a table
    ///
    /// # Errors
    /// Returns `InvalidField` if a referenced column is missing or cannot be
    /// used as a key / aggregated value
    pub fn execute(&self, spec: &AggregationSpec, storage: &StorageEngine) -> Result<Vec<AggregateRow>> {
        let count_rows = spec.function == AggregateFunction::Count && spec.column == "*";
        if !count_rows && spec.column == "*" {
            return Err(Error::InvalidField(format!(
                "{:?}(*) is not supported",
                spec.function
            )));
        }

        let mut groups: BTreeMap<GroupValue, Accumulator> = BTreeMap::new();
        for batch in storage.batches() {
            let keys = Self::group_keys(batch, &spec.group_by)?;
            let values = Self::value_column(batch, spec, count_rows)?;

            for (row, key) in keys.into_iter().enumerate() {
                let Some(key) = key else { continue };
                let value = match &values {
                    ValueColumn::Rows => None,
                    ValueColumn::NonNull(col) => (!col.is_null(row)).then_some(1.0),
                    ValueColumn::Numeric(col) => (!col.is_null(row)).then(|| col.value(row)),
                };
                groups.entry(key).or_default().push(value);
            }
        }

        debug!(table = %spec.table, groups = groups.len(), "aggregation complete");
        Ok(groups
            .into_iter()
            .map(|(key, acc)| AggregateRow {
                key,
                value: acc.finish(spec.function, count_rows),
            })
            .collect())
    }

    /// Column feeding the accumulators. `COUNT(col)` accepts any type and
    /// only looks at nulls; the other functions need a numeric column.
    fn value_column(batch: &RecordBatch, spec: &AggregationSpec, count_rows: bool) -> Result<ValueColumn> {
        if count_rows {
            return Ok(ValueColumn::Rows);
        }
        let column = batch
            .column_by_name(&spec.column)
            .ok_or_else(|| Error::InvalidField(format!("Column not found: {}", spec.column)))?;
        if spec.function == AggregateFunction::Count {
            return Ok(ValueColumn::NonNull(Arc::clone(column)));
        }
        if !column.data_type().is_numeric() {
            return Err(Error::InvalidField(format!(
                "Cannot apply {:?} to column {} of type {}",
                spec.function,
                spec.column,
                column.data_type()
            )));
        }
        Ok(ValueColumn::Numeric(float_column(batch, &spec.column)?))
    }

    /// Compute the group key of every row; null keys are skipped
    fn group_keys(batch: &RecordBatch, key: &GroupKey) -> Result<Vec<Option<GroupValue>>> {
        match key {
            GroupKey::Column(name) => {
                let column = batch
                    .column_by_name(name)
                    .ok_or_else(|| Error::InvalidField(format!("Column not found: {name}")))?;
                match column.data_type() {
                    DataType::Utf8 | DataType::LargeUtf8 => {
                        let strings = string_column(batch, name)?;
                        Ok((0..strings.len())
                            .map(|i| {
                                (!strings.is_null(i))
                                    .then(|| GroupValue::Text(strings.value(i).to_string()))
                            })
                            .collect())
                    }
                    dt if dt.is_integer() => {
                        let cast = compute::cast(column, &DataType::Int64)?;
                        let ints = cast
                            .as_any()
                            .downcast_ref::<Int64Array>()
                            .ok_or_else(|| {
                                Error::Other("Failed to downcast to Int64Array".to_string())
                            })?;
                        Ok((0..ints.len())
                            .map(|i| (!ints.is_null(i)).then(|| GroupValue::Int(ints.value(i))))
                            .collect())
                    }
                    dt => Err(Error::InvalidField(format!(
                        "Cannot group by column {name} of type {dt}"
                    ))),
                }
            }
            GroupKey::Extract { part, column } => {
                let timestamps = timestamp_column(batch, column)?;
                Ok((0..timestamps.len())
                    .map(|i| {
                        if timestamps.is_null(i) {
                            return None;
                        }
                        DateTime::from_timestamp_micros(timestamps.value(i)).map(|ts| match part {
                            DatePart::DayOfWeek => {
                                GroupValue::Int(i64::from(ts.weekday().number_from_sunday()))
                            }
                            DatePart::Hour => GroupValue::Int(i64::from(ts.hour())),
                        })
                    })
                    .collect())
            }
        }
    }
}

impl DataSource for TableCatalog {
    fn query(&self, spec: &AggregationSpec) -> Result<AggregateRows> {
        let storage = self.table(&spec.table)?;
        let rows = QueryExecutor::new().execute(spec, storage)?;
        Ok(AggregateRows::new(rows))
    }
}
