//! Tests for error types

use trueno_features::Error;

#[test]
fn test_source_unavailable_error() {
    let error = Error::SourceUnavailable("london_bicycles.cycle_hire".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Data source unavailable"));
    assert!(error_str.contains("cycle_hire"));
}

#[test]
fn test_out_of_range_error() {
    let error = Error::OutOfRange {
        value: 8,
        min: 1,
        max: 7,
    };
    assert_eq!(format!("{error}"), "Value 8 out of range [1, 7]");
}

#[test]
fn test_causality_violation_error() {
    let error = Error::CausalityViolation {
        feature: "end_station_name".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Causality violation"));
    assert!(error_str.contains("end_station_name"));
    assert!(error_str.contains("training-only"));
}

#[test]
fn test_model_superseded_error() {
    let error = Error::ModelSuperseded {
        model_name: "bike_model".to_string(),
        generation: 1,
        latest: 3,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("bike_model"));
    assert!(error_str.contains("generation 1"));
    assert!(error_str.contains("generation 3"));
}

#[test]
fn test_no_experiments_error() {
    assert_eq!(format!("{}", Error::NoExperiments), "No experiments recorded");
}

#[test]
fn test_duplicate_experiment_error() {
    let error = Error::DuplicateExperiment("00000000deadbeef".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("already ran"));
    assert!(error_str.contains("Define a new transform set"));
}

#[test]
fn test_invalid_transition_error() {
    let error = Error::InvalidTransition {
        from: "Failed".to_string(),
        to: "Ready".to_string(),
    };
    assert_eq!(format!("{error}"), "Invalid experiment transition: Failed -> Ready");
}

#[test]
fn test_parse_error() {
    let error = Error::ParseError("invalid SQL".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("SQL parse error"));
    assert!(error_str.contains("invalid SQL"));
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "config.json");
    let error: Error = io_error.into();
    assert!(matches!(error, Error::Io(_)));
    assert!(format!("{error}").contains("IO error"));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_error.into();
    assert!(matches!(error, Error::Json(_)));
}

#[test]
fn test_error_debug() {
    let error = Error::MissingMetric("r2_score".to_string());
    assert!(format!("{error:?}").contains("MissingMetric"));
}
