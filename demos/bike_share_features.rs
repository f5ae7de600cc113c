//! Bike-share feature experiments
//!
//! Explores a small `cycle_hire` table, then compares two transform sets
//! for predicting rental duration: weekday/weekend fusion with the raw
//! hour, and the same fusion with hour buckets.
//!
//! Run with: `RUST_LOG=info cargo run --example bike_share_features`

use arrow::array::{Float64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use trueno_features::features::{FeatureSpec, Transform, TransformSet};
use trueno_features::query::{DataSource, QueryEngine};
use trueno_features::record::{RawRecord, RecordField};
use trueno_features::storage::{StorageEngine, TableCatalog};
use trueno_features::training::{MemoryTrainer, ScriptedOutcome};
use trueno_features::{ExperimentRunner, PollPolicy, RunnerConfig};
use tracing_subscriber::EnvFilter;

const TABLE: &str = "london_bicycles.cycle_hire";

fn cycle_hire() -> anyhow::Result<RecordBatch> {
    // June 2015: the 7th is a Sunday
    let trips = [
        (1_800.0, "Hyde Park Corner", 6, 14),
        (2_400.0, "Hyde Park Corner", 7, 15),
        (600.0, "Waterloo Station 3", 8, 8),
        (540.0, "Waterloo Station 3", 9, 8),
        (720.0, "Soho Square", 10, 18),
        (660.0, "Soho Square", 11, 17),
        (900.0, "Belgrove Street", 12, 12),
        (2_100.0, "Hyde Park Corner", 13, 11),
        (480.0, "Waterloo Station 3", 15, 7),
        (1_950.0, "Hyde Park Corner", 14, 16),
    ];

    let micros = trips
        .iter()
        .map(|&(_, _, day, hour)| {
            Utc.with_ymd_and_hms(2015, 6, day, hour, 0, 0)
                .single()
                .map(|t| t.timestamp_micros())
                .ok_or_else(|| anyhow::anyhow!("invalid demo timestamp"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("duration", DataType::Float64, false),
        Field::new("start_station_name", DataType::Utf8, false),
        Field::new("start_date", DataType::Timestamp(TimeUnit::Microsecond, None), false),
    ]));
    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Float64Array::from_iter_values(trips.iter().map(|t| t.0))),
            Arc::new(StringArray::from_iter_values(trips.iter().map(|t| t.1))),
            Arc::new(TimestampMicrosecondArray::from(micros)),
        ],
    )?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== Bike-share feature experiments ===\n");

    let mut catalog = TableCatalog::new();
    catalog.register(TABLE, StorageEngine::new(vec![cycle_hire()?]));

    // Exploration: does duration depend on the day of week or the hour?
    let engine = QueryEngine::new();
    for sql in [
        format!(
            "SELECT EXTRACT(DAYOFWEEK FROM start_date) AS dayofweek, AVG(duration) AS avg_duration \
             FROM {TABLE} GROUP BY dayofweek"
        ),
        format!(
            "SELECT EXTRACT(HOUR FROM start_date) AS hourofday, AVG(duration) AS avg_duration \
             FROM {TABLE} GROUP BY hourofday"
        ),
    ] {
        let spec = engine.parse(&sql)?;
        println!("{:?} {:?}({}):", spec.group_by, spec.function, spec.column);
        for row in catalog.query(&spec)? {
            match row.value {
                Some(value) => println!("  {:>3}  {value:>8.1}", row.key),
                None => println!("  {:>3}  {:>8}", row.key, "NULL"),
            }
        }
        println!();
    }

    // Both scenarios fuse the weekday. Only B buckets the hour.
    let scenario_a = TransformSet::new("daytype", RecordField::Duration)
        .with_feature(FeatureSpec::new(
            "start_station_name",
            Transform::Passthrough(RecordField::StartStationName),
        ))?
        .with_feature(FeatureSpec::new("daytype", Transform::WeekdayFusion))?
        .with_feature(FeatureSpec::new("hourofday", Transform::HourOfDay))?;

    let scenario_b = TransformSet::new("daytype_hourbucket", RecordField::Duration)
        .with_feature(FeatureSpec::new(
            "start_station_name",
            Transform::Passthrough(RecordField::StartStationName),
        ))?
        .with_feature(FeatureSpec::new("daytype", Transform::WeekdayFusion))?
        .with_feature(FeatureSpec::hour_buckets("hourofday", vec![5.0, 10.0, 17.0])?)?
        .for_prediction()?;

    let trainer = Arc::new(MemoryTrainer::new());
    trainer.script("bike_model_daytype", ScriptedOutcome::ready_with_mae(967.0).pending_polls(1));
    trainer.script(
        "bike_model_daytype_hourbucket",
        ScriptedOutcome::ready_with_mae(901.0)
            .pending_polls(2)
            .intercept(700.0)
            .weight("daytype=weekend", 900.0)
            .weight("start_station_name=Hyde Park Corner", 400.0),
    );

    let config = RunnerConfig::builder()
        .model_name_prefix("bike_model_")
        .poll(PollPolicy::new(10, Duration::from_millis(20)))
        .build()?;
    let runner = Arc::new(ExperimentRunner::new(trainer, config)?);

    for result in runner.run_all(vec![scenario_a, scenario_b]).await {
        match result {
            Ok(eval) => println!(
                "{:<32} {} = {:.1}",
                eval.model_handle().to_string(),
                eval.metric_name(),
                eval.metric_value()
            ),
            Err(e) => println!("experiment failed: {e}"),
        }
    }

    let (best, eval) = runner.best()?;
    println!("\nBest transform set: {} ({:.1})", best.name(), eval.metric_value());
    println!("Features: {:?}", best.feature_names());

    let sunday_ride = RawRecord::new(
        0.0,
        "Hyde Park Corner",
        Utc.with_ymd_and_hms(2015, 6, 21, 14, 0, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid demo timestamp"))?,
    );
    let prediction = runner
        .submitter()
        .predict(eval.model_handle(), &sunday_ride)
        .await?;
    println!("Predicted duration for a Sunday 14:00 ride: {:.0}s", prediction.predicted_label);

    println!("\nRanking:\n{}", runner.tracker().export_json()?);
    Ok(())
}
