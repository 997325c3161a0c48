#![deny(warnings)]
#![deny(rust_2018_idioms)]

use ais_relay::settings::{Environment, Settings};
use config::{Config, File};

pub mod feed;
pub mod helper;

fn load(environment: &str) -> Settings {
    Config::builder()
        .add_source(File::with_name(&format!("config/{environment}.yml")).required(true))
        .set_override("environment", environment)
        .unwrap()
        .build()
        .unwrap()
        .try_deserialize::<Settings>()
        .unwrap()
}

#[test]
fn test_local_settings_are_valid() {
    let settings = load("local");
    assert_eq!(settings.environment, Environment::Local);
    assert!(settings.tracker.feed);
}

#[test]
fn test_development_settings_are_valid() {
    let settings = load("development");
    assert_eq!(settings.environment, Environment::Development);
}

#[test]
fn test_production_settings_are_valid() {
    let settings = load("production");
    assert_eq!(settings.environment, Environment::Production);
    assert!(!settings.tracker.simulation);
}

#[test]
fn test_test_settings_are_valid() {
    let settings = load("test");
    assert_eq!(settings.environment, Environment::Test);

    let thresholds = settings.tracker.risk_thresholds.unwrap();
    assert_eq!(thresholds.danger_distance, 400.);
    assert_eq!(thresholds.warning_distance, 1500.);
}

#[test]
fn test_insecure_upstream_url_is_rejected() {
    let result = Config::builder()
        .add_source(File::with_name("config/local.yml").required(true))
        .set_override("environment", "local")
        .unwrap()
        .set_override("relay.upstream_url", "ws://stream.aisstream.io/v0/stream")
        .unwrap()
        .build()
        .unwrap()
        .try_deserialize::<Settings>();

    assert!(result.is_err());
}
