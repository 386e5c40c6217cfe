//! Tests for configuration validation.
//!
//! Builder methods reject invalid values with a panic; configuration
//! documents are rejected with a `ConfigError` before any run starts.

use claimgate::{AdequacyThresholds, ConfigError, EngineConfig, VerdictEngine};
use claimgate_core::ThresholdError;

// =============================================================================
// ITERATIONS
// =============================================================================

#[test]
#[should_panic(expected = "iterations must be > 0")]
fn iterations_zero_panics() {
    let _ = VerdictEngine::new().iterations(0);
}

#[test]
fn iterations_one_valid() {
    let engine = VerdictEngine::new().iterations(1);
    assert_eq!(engine.effective_iterations(), 1);
}

// =============================================================================
// INFERENCE THRESHOLDS
// =============================================================================

#[test]
#[should_panic(expected = "significance_level must be in (0, 1)")]
fn significance_level_zero_panics() {
    let _ = EngineConfig::new().significance_level(0.0);
}

#[test]
#[should_panic(expected = "significance_level must be in (0, 1)")]
fn significance_level_one_panics() {
    let _ = EngineConfig::new().significance_level(1.0);
}

#[test]
fn significance_level_valid() {
    let config = EngineConfig::new().significance_level(0.01);
    assert_eq!(config.inference.significance_level, 0.01);
}

#[test]
#[should_panic(expected = "confidence_level must be in (0, 1)")]
fn confidence_level_one_panics() {
    let _ = EngineConfig::new().confidence_level(1.0);
}

#[test]
#[should_panic(expected = "confidence_level must be in (0, 1)")]
fn confidence_level_nan_panics() {
    let _ = EngineConfig::new().confidence_level(f64::NAN);
}

#[test]
#[should_panic(expected = "null_effect_bar must be positive and finite")]
fn null_effect_bar_zero_panics() {
    let _ = EngineConfig::new().null_effect_bar(0.0);
}

#[test]
#[should_panic(expected = "null_effect_bar must be positive and finite")]
fn null_effect_bar_infinite_panics() {
    let _ = EngineConfig::new().null_effect_bar(f64::INFINITY);
}

#[test]
#[should_panic(expected = "min_jackknife_stability must be in [0, 1]")]
fn min_jackknife_stability_above_one_panics() {
    let _ = EngineConfig::new().min_jackknife_stability(1.5);
}

#[test]
fn min_jackknife_stability_bounds_valid() {
    assert_eq!(
        EngineConfig::new()
            .min_jackknife_stability(0.0)
            .inference
            .min_jackknife_stability,
        0.0
    );
    assert_eq!(
        EngineConfig::new()
            .min_jackknife_stability(1.0)
            .inference
            .min_jackknife_stability,
        1.0
    );
}

// =============================================================================
// RESAMPLING AND STABILITY
// =============================================================================

#[test]
#[should_panic(expected = "jackknife_fold_cap must be positive")]
fn jackknife_fold_cap_zero_panics() {
    let _ = EngineConfig::new().jackknife_fold_cap(0);
}

#[test]
#[should_panic(expected = "fragile_agreement_floor must be in [0, 1]")]
fn fragile_agreement_floor_negative_panics() {
    let _ = EngineConfig::new().fragile_agreement_floor(-0.1);
}

#[test]
#[should_panic(expected = "policy_version must not be empty")]
fn policy_version_blank_panics() {
    let _ = EngineConfig::new().policy_version("  ");
}

// =============================================================================
// ADEQUACY THRESHOLDS
// =============================================================================

#[test]
#[should_panic(expected = "invalid adequacy thresholds")]
fn adequacy_balance_above_one_panics() {
    let _ = EngineConfig::new().adequacy(AdequacyThresholds {
        min_balance_ratio: 1.2,
        ..AdequacyThresholds::default()
    });
}

#[test]
#[should_panic(expected = "invalid adequacy thresholds")]
fn adequacy_units_above_items_panics() {
    let _ = EngineConfig::new().adequacy(AdequacyThresholds {
        min_items_per_group: 5,
        min_source_units_per_group: 6,
        ..AdequacyThresholds::default()
    });
}

// =============================================================================
// CONFIGURATION DOCUMENTS
// =============================================================================

fn default_document() -> serde_json::Value {
    serde_json::to_value(EngineConfig::default()).unwrap()
}

#[test]
fn default_document_parses_back() {
    let raw = default_document().to_string();
    let config = EngineConfig::from_json_str(&raw).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn missing_threshold_is_rejected() {
    let mut doc = default_document();
    doc["inference"]
        .as_object_mut()
        .unwrap()
        .remove("significance_level");
    let err = EngineConfig::from_json_str(&doc.to_string()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{:?}", err);
}

#[test]
fn unknown_field_is_rejected() {
    let mut doc = default_document();
    doc["adequacy"]["min_items"] = serde_json::json!(10);
    let err = EngineConfig::from_json_str(&doc.to_string()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{:?}", err);
}

#[test]
fn out_of_range_document_value_is_rejected() {
    let mut doc = default_document();
    doc["inference"]["confidence_level"] = serde_json::json!(1.5);
    let err = EngineConfig::from_json_str(&doc.to_string()).unwrap_err();
    match err {
        ConfigError::Invalid(msg) => assert!(msg.contains("confidence_level"), "{}", msg),
        other => panic!("expected Invalid, got {:?}", other),
    }
}

#[test]
fn contradictory_adequacy_document_is_rejected() {
    let mut doc = default_document();
    doc["adequacy"]["min_items_per_group"] = serde_json::json!(5);
    doc["adequacy"]["min_source_units_per_group"] = serde_json::json!(8);
    let err = EngineConfig::from_json_str(&doc.to_string()).unwrap_err();
    assert!(
        matches!(
            err,
            ConfigError::Thresholds(ThresholdError::UnitsExceedItems { units: 8, items: 5 })
        ),
        "{:?}",
        err
    );
}
