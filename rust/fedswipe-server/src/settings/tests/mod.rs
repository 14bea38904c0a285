use std::env;

use serial_test::serial;
use validator::Validate;

use super::{AggregationSettings, ModelSettings, Settings};
use fedswipe_core::model::{DenseInitializer, ModelInitializer};

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            layers: vec![34, 20, 10, 2],
            seed: 0,
        }
    }
}

#[test]
#[serial]
fn test_settings_new() {
    let settings = Settings::new("../../configs/config.toml").unwrap();
    assert_eq!(settings.aggregation.threshold, 1);
    assert_eq!(settings.model.layers, vec![34, 20, 10, 2]);
    assert_eq!(settings.api.bind_address.port(), 1337);

    assert!(Settings::new("").is_err());
}

#[test]
#[serial]
fn test_settings_env_override() {
    env::set_var("FEDSWIPE_AGGREGATION__THRESHOLD", "4");
    let settings = Settings::new("../../configs/config.toml");
    env::remove_var("FEDSWIPE_AGGREGATION__THRESHOLD");
    assert_eq!(settings.unwrap().aggregation.threshold, 4);

    env::set_var("FEDSWIPE_AGGREGATION__THRESHOLD", "0");
    let settings = Settings::new("../../configs/config.toml");
    env::remove_var("FEDSWIPE_AGGREGATION__THRESHOLD");
    assert!(settings.is_err());
}

#[test]
fn test_validate_aggregation() {
    assert!(AggregationSettings { threshold: 1 }.validate().is_ok());
    assert!(AggregationSettings { threshold: 10 }.validate().is_ok());
    assert!(AggregationSettings { threshold: 0 }.validate().is_err());
}

#[test]
fn test_validate_model() {
    assert!(ModelSettings::default().validate().is_ok());
    assert!(ModelSettings {
        layers: vec![1, 1],
        ..ModelSettings::default()
    }
    .validate()
    .is_ok());

    // a single width doesn't describe any layer
    assert!(ModelSettings {
        layers: vec![34],
        ..ModelSettings::default()
    }
    .validate()
    .is_err());
    assert!(ModelSettings {
        layers: vec![34, 0, 2],
        ..ModelSettings::default()
    }
    .validate()
    .is_err());
}

#[test]
fn test_model_settings_into_initializer() {
    let initializer: DenseInitializer = ModelSettings::default().into();
    assert_eq!(initializer.manifest().len(), 6);
    assert_eq!(initializer.init(), initializer.init());
}
