//! Loading and validation of settings.
//!
//! Values defined in the configuration file can be overridden by environment variables. An
//! example configuration file can be found in the `configs/` directory located in the
//! repository root.

#[cfg(test)]
mod tests;

use std::{fmt, path::Path};

use config::{Config, ConfigError, Environment, File};
use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize,
};
use thiserror::Error;
use tracing_subscriber::filter::EnvFilter;
use validator::{Validate, ValidationError, ValidationErrors};

use fedswipe_core::model::DenseInitializer;

#[derive(Error, Debug)]
/// An error related to loading and validation of settings.
pub enum SettingsError {
    #[error("configuration loading failed: {0}")]
    Loading(#[from] ConfigError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Validate, Deserialize)]
/// The combined settings.
///
/// Each section in the configuration file corresponds to the identically named settings field.
pub struct Settings {
    pub api: ApiSettings,
    #[validate]
    pub aggregation: AggregationSettings,
    #[validate]
    pub model: ModelSettings,
    pub log: LoggingSettings,
}

impl Settings {
    /// Loads and validates the settings via a configuration file.
    ///
    /// # Errors
    /// Fails when the loading of the configuration file or its validation failed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let settings: Settings = Self::load(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("fedswipe")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Deserialize, Clone)]
/// REST API settings.
pub struct ApiSettings {
    /// The address to which the HTTP and websocket API should be bound.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [api]
    /// bind_address = "0.0.0.0:1337"
    /// # or
    /// bind_address = "127.0.0.1:1337"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// FEDSWIPE_API__BIND_ADDRESS=127.0.0.1:1337
    /// ```
    pub bind_address: std::net::SocketAddr,
}

#[derive(Debug, Validate, Deserialize, Clone, Copy)]
/// Aggregation settings.
pub struct AggregationSettings {
    /// The number of distinct client contributions that triggers an aggregation round.
    ///
    /// The value must be greater or equal to `1`. A round is flushed exactly once when the
    /// number of buffered contributions reaches the threshold; there is no timeout.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [aggregation]
    /// threshold = 3
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// FEDSWIPE_AGGREGATION__THRESHOLD=3
    /// ```
    #[validate(range(min = 1))]
    pub threshold: u64,
}

#[derive(Debug, Validate, Deserialize, Clone)]
#[validate(schema(function = "validate_model"))]
/// Settings of the initial global model.
pub struct ModelSettings {
    /// The widths of the dense layers, input layer first.
    ///
    /// At least two widths are required and every width must be greater or equal to `1`.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [model]
    /// layers = [34, 20, 10, 2]
    /// ```
    pub layers: Vec<usize>,

    /// The seed of the random generator that initializes the kernels. Every reset of the
    /// global model starts from the same parameters.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [model]
    /// seed = 0
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// FEDSWIPE_MODEL__SEED=0
    /// ```
    #[serde(default)]
    pub seed: u64,
}

impl ModelSettings {
    /// Checks the layer widths.
    fn validate_model(&self) -> Result<(), ValidationError> {
        if self.layers.len() >= 2 && self.layers.iter().all(|width| *width >= 1) {
            Ok(())
        } else {
            Err(ValidationError::new("invalid layer widths"))
        }
    }
}

/// A wrapper for validate derive.
fn validate_model(s: &ModelSettings) -> Result<(), ValidationError> {
    s.validate_model()
}

impl From<ModelSettings> for DenseInitializer {
    fn from(ModelSettings { layers, seed }: ModelSettings) -> Self {
        DenseInitializer::new(layers, seed)
    }
}

#[derive(Debug, Deserialize)]
/// Logging settings.
pub struct LoggingSettings {
    /// A comma-separated list of logging directives. More information about logging directives
    /// can be found [here].
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [log]
    /// filter = "info"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// FEDSWIPE_LOG__FILTER=info
    /// ```
    ///
    /// [here]: https://docs.rs/tracing-subscriber/0.3/tracing_subscriber/filter/struct.EnvFilter.html#directives
    #[serde(deserialize_with = "deserialize_env_filter")]
    pub filter: EnvFilter,
}

fn deserialize_env_filter<'de, D>(deserializer: D) -> Result<EnvFilter, D::Error>
where
    D: Deserializer<'de>,
{
    struct EnvFilterVisitor;

    impl<'de> Visitor<'de> for EnvFilterVisitor {
        type Value = EnvFilter;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a valid tracing filter directive: https://docs.rs/tracing-subscriber/0.3/tracing_subscriber/filter/struct.EnvFilter.html#directives")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            EnvFilter::try_new(value)
                .map_err(|_| de::Error::invalid_value(serde::de::Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_str(EnvFilterVisitor)
}
