//! Raw trip records and their field names

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::compute;
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A single rental as read from the source table.
///
/// Immutable once decoded. `end_station_name` is only known after the
/// trip ends, so features derived from it are training-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    duration: f64,
    start_station_name: String,
    start_date: DateTime<Utc>,
    end_station_name: Option<String>,
}

impl RawRecord {
    /// Create a record without trip-end fields.
    #[must_use]
    pub fn new(duration: f64, start_station_name: impl Into<String>, start_date: DateTime<Utc>) -> Self {
        Self {
            duration,
            start_station_name: start_station_name.into(),
            start_date,
            end_station_name: None,
        }
    }

    /// Attach the end station (known only once the trip is over).
    #[must_use]
    pub fn with_end_station(mut self, end_station_name: impl Into<String>) -> Self {
        self.end_station_name = Some(end_station_name.into());
        self
    }

    /// Rental duration (the regression label).
    #[must_use]
    pub const fn duration(&self) -> f64 {
        self.duration
    }

    /// Station where the rental started.
    #[must_use]
    pub fn start_station_name(&self) -> &str {
        &self.start_station_name
    }

    /// Rental start timestamp.
    #[must_use]
    pub const fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    /// Station where the rental ended, if known.
    #[must_use]
    pub fn end_station_name(&self) -> Option<&str> {
        self.end_station_name.as_deref()
    }

    /// Decode all rows of a batch.
    ///
    /// Required columns: `duration` (any numeric type), `start_station_name`
    /// (string) and `start_date` (timestamp). `end_station_name` is optional.
    ///
    /// # Errors
    ///
    /// Returns `InvalidField` if a required column is missing or cannot be
    /// cast, `StorageError` if a required value is null.
    pub fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let duration = float_column(batch, RecordField::Duration.name())?;
        let start_station = string_column(batch, RecordField::StartStationName.name())?;
        let start_date = timestamp_column(batch, RecordField::StartDate.name())?;
        let end_station = if batch.column_by_name(RecordField::EndStationName.name()).is_some() {
            Some(string_column(batch, RecordField::EndStationName.name())?)
        } else {
            None
        };

        (0..batch.num_rows())
            .map(|row| {
                if duration.is_null(row) || start_station.is_null(row) || start_date.is_null(row) {
                    return Err(Error::StorageError(format!(
                        "Null value in required column at row {row}"
                    )));
                }
                let start = DateTime::from_timestamp_micros(start_date.value(row)).ok_or_else(
                    || Error::StorageError(format!("Timestamp out of range at row {row}")),
                )?;
                let end = end_station
                    .as_ref()
                    .filter(|col| !col.is_null(row))
                    .map(|col| col.value(row).to_string());

                Ok(Self {
                    duration: duration.value(row),
                    start_station_name: start_station.value(row).to_string(),
                    start_date: start,
                    end_station_name: end,
                })
            })
            .collect()
    }
}

/// Named fields of a [`RawRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    /// Rental duration in seconds
    Duration,
    /// Start station name
    StartStationName,
    /// Start timestamp
    StartDate,
    /// End station name (post-event)
    EndStationName,
}

impl RecordField {
    /// Column name in the source table.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Duration => "duration",
            Self::StartStationName => "start_station_name",
            Self::StartDate => "start_date",
            Self::EndStationName => "end_station_name",
        }
    }

    /// Whether the field holds a numeric value (usable as a regression label).
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Duration)
    }

    /// Whether the field is known before the rental happens.
    #[must_use]
    pub const fn known_at_prediction(self) -> bool {
        matches!(self, Self::StartStationName | Self::StartDate)
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RecordField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "duration" => Ok(Self::Duration),
            "start_station_name" => Ok(Self::StartStationName),
            "start_date" => Ok(Self::StartDate),
            "end_station_name" => Ok(Self::EndStationName),
            other => Err(Error::InvalidField(format!("Unknown record field: {other}"))),
        }
    }
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::InvalidField(format!("Column not found: {name}")))
}

fn cast_column(batch: &RecordBatch, name: &str, to: &DataType) -> Result<ArrayRef> {
    compute::cast(column(batch, name)?, to)
        .map_err(|e| Error::InvalidField(format!("Column {name} cannot be read as {to}: {e}")))
}

pub(crate) fn float_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let source = column(batch, name)?;
    if !source.data_type().is_numeric() {
        return Err(Error::InvalidField(format!(
            "Column {name} is not numeric: {}",
            source.data_type()
        )));
    }
    let array = cast_column(batch, name, &DataType::Float64)?;
    array
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| Error::Other("Failed to downcast to Float64Array".to_string()))
}

pub(crate) fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    let array = cast_column(batch, name, &DataType::Utf8)?;
    array
        .as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| Error::Other("Failed to downcast to StringArray".to_string()))
}

pub(crate) fn timestamp_column(batch: &RecordBatch, name: &str) -> Result<TimestampMicrosecondArray> {
    let source = column(batch, name)?;
    if !matches!(source.data_type(), DataType::Timestamp(_, _)) {
        return Err(Error::InvalidField(format!(
            "Column {name} is not a timestamp: {}",
            source.data_type()
        )));
    }
    let array = cast_column(batch, name, &DataType::Timestamp(TimeUnit::Microsecond, None))?;
    array
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .cloned()
        .ok_or_else(|| Error::Other("Failed to downcast to TimestampMicrosecondArray".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, TimestampSecondArray};
    use arrow::datatypes::{Field, Schema};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn trips_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("duration", DataType::Int64, false),
            Field::new("start_station_name", DataType::Utf8, false),
            Field::new("start_date", DataType::Timestamp(TimeUnit::Second, None), false),
            Field::new("end_station_name", DataType::Utf8, true),
        ]));
        let start = Utc.with_ymd_and_hms(2015, 6, 7, 8, 30, 0).unwrap().timestamp();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![600, 1200])),
                Arc::new(StringArray::from(vec!["Hyde Park Corner", "Waterloo"])),
                Arc::new(TimestampSecondArray::from(vec![start, start + 3600])),
                Arc::new(StringArray::from(vec![Some("Soho"), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_batch_decodes_rows() {
        let records = RawRecord::from_batch(&trips_batch()).unwrap();
        assert_eq!(records.len(), 2);
        assert!((records[0].duration() - 600.0).abs() < f64::EPSILON);
        assert_eq!(records[0].start_station_name(), "Hyde Park Corner");
        assert_eq!(records[0].end_station_name(), Some("Soho"));
        assert_eq!(records[1].end_station_name(), None);
        assert_eq!(
            records[1].start_date(),
            Utc.with_ymd_and_hms(2015, 6, 7, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_from_batch_missing_column() {
        let schema = Arc::new(Schema::new(vec![Field::new("duration", DataType::Int64, false)]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1]))]).unwrap();
        let err = RawRecord::from_batch(&batch).unwrap_err();
        assert!(matches!(err, Error::InvalidField(_)));
    }

    #[test]
    fn test_record_field_parse() {
        assert_eq!("duration".parse::<RecordField>().unwrap(), RecordField::Duration);
        assert!(matches!(
            "bike_id".parse::<RecordField>(),
            Err(Error::InvalidField(_))
        ));
        assert!(RecordField::Duration.is_numeric());
        assert!(!RecordField::StartStationName.is_numeric());
        assert!(!RecordField::EndStationName.known_at_prediction());
    }
}
