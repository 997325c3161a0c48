use std::{fmt::Display, time::Duration};

use config::{Config, ConfigError, File};
use serde::Deserialize;
use snafu::ensure;
use strum::{AsRefStr, EnumString};
use tracker_core::{RegionId, RiskThresholds};

use crate::error::{Error, error::InsecureUpstreamSnafu};

static SECURE_SCHEME: &str = "wss://";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Environment {
    #[default]
    Local,
    Development,
    Production,
    Test,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,
    pub environment: Environment,
    pub relay: RelaySettings,
    pub tracker: TrackerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelaySettings {
    pub ip: String,
    pub port: u16,
    pub upstream_url: UpstreamUrl,
    pub api_key: Option<String>,
    #[serde(with = "humantime_serde", default = "default_grace_period")]
    pub grace_period: Duration,
    #[serde(with = "humantime_serde", default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerSettings {
    #[serde(default)]
    pub region: RegionId,
    #[serde(default)]
    pub feed: bool,
    #[serde(with = "humantime_serde", default = "default_tick_interval")]
    pub risk_interval: Duration,
    #[serde(default)]
    pub simulation: bool,
    #[serde(with = "humantime_serde", default = "default_tick_interval")]
    pub simulation_interval: Duration,
    pub simulation_seed: Option<u64>,
    pub risk_thresholds: Option<RiskThresholds>,
}

/// The upstream feed endpoint. Credentials travel in the subscription payload, so only
/// `wss://` urls are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct UpstreamUrl(String);

fn default_grace_period() -> Duration {
    Duration::from_millis(400)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(2)
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let environment: Environment = std::env::var("APP_ENVIRONMENT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        let environment = environment.as_ref();

        Config::builder()
            .add_source(File::with_name(&format!("config/{environment}")).required(true))
            .add_source(config::Environment::with_prefix("AIS_RELAY").separator("__"))
            .set_override("environment", environment)?
            .build()?
            .try_deserialize()
    }
}

impl RelaySettings {
    pub fn listener_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Startup log form of the api key, never the full secret.
    pub fn api_key_summary(&self) -> String {
        match &self.api_key {
            Some(key) => format!(
                "present (starts with {}...)",
                key.chars().take(5).collect::<String>()
            ),
            None => "missing".into(),
        }
    }
}

impl LogLevel {
    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl UpstreamUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let url = url.into();
        ensure!(url.starts_with(SECURE_SCHEME), InsecureUpstreamSnafu { url });
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UpstreamUrl {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Display for UpstreamUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(any(test, feature = "test"))]
mod test {
    use super::*;

    impl UpstreamUrl {
        /// Skips the scheme check so tests can point the relay at a plain local server.
        pub fn test_new(url: impl Into<String>) -> Self {
            Self(url.into())
        }
    }

    impl Settings {
        pub fn test_new(upstream_url: UpstreamUrl, api_key: Option<String>) -> Self {
            Self {
                log_level: LogLevel::Debug,
                environment: Environment::Test,
                relay: RelaySettings {
                    ip: "127.0.0.1".into(),
                    port: 0,
                    upstream_url,
                    api_key,
                    grace_period: Duration::from_millis(150),
                    shutdown_timeout: Duration::from_secs(2),
                },
                tracker: TrackerSettings {
                    region: RegionId::Busan,
                    feed: false,
                    risk_interval: Duration::from_millis(50),
                    simulation: false,
                    simulation_interval: Duration::from_millis(50),
                    simulation_seed: Some(1),
                    risk_thresholds: None,
                },
            }
        }
    }
}
