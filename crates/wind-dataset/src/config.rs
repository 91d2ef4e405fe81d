//! Configuration for dataset discovery and caching.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DatasetError, Result};
use crate::header::DEFAULT_CHUNK_SIZE;
use crate::naming::{DEFAULT_DIRECTORY, SUFFIX_READY};
use crate::schema::{GridSchema, ModelGrid};

/// Configuration for opening datasets and the latest-dataset cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Directory searched when no directory is given explicitly.
    pub directory: PathBuf,

    /// Seconds a persistently cached latest dataset survives without use.
    pub latest_ttl_secs: u64,

    /// Filename suffix of ready-to-use datasets.
    pub ready_suffix: String,

    /// Read size used while searching for the header terminator.
    pub header_chunk_size: usize,

    /// Reject files whose payload is not exactly the schema payload size.
    pub enforce_payload_size: bool,

    /// Grid layout of the datasets.
    pub model: ModelGrid,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            latest_ttl_secs: 60,
            ready_suffix: SUFFIX_READY.to_string(),
            header_chunk_size: DEFAULT_CHUNK_SIZE,
            enforce_payload_size: true,
            model: ModelGrid::default(),
        }
    }
}

impl DatasetConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("WIND_DATASET_DIR") {
            if !val.is_empty() {
                config.directory = PathBuf::from(val);
            }
        }

        if let Ok(val) = std::env::var("LATEST_DATASET_TTL_SECS") {
            if let Ok(secs) = val.parse() {
                config.latest_ttl_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("WIND_DATASET_SUFFIX") {
            config.ready_suffix = val;
        }

        if let Ok(val) = std::env::var("WIND_DATASET_HEADER_CHUNK") {
            if let Ok(size) = val.parse() {
                config.header_chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("WIND_DATASET_ENFORCE_SIZE") {
            config.enforce_payload_size = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("WIND_DATASET_MODEL") {
            if let Some(model) = ModelGrid::from_str(&val) {
                config.model = model;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.latest_ttl_secs == 0 {
            return Err(DatasetError::config("latest_ttl_secs must be > 0"));
        }

        if self.header_chunk_size == 0 {
            return Err(DatasetError::config("header_chunk_size must be > 0"));
        }

        if self.ready_suffix.is_empty() {
            return Err(DatasetError::config("ready_suffix must not be empty"));
        }

        // A leading digit would run into the timestamp prefix.
        if self.ready_suffix.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(DatasetError::config(format!(
                "ready_suffix {:?} must not start with a digit",
                self.ready_suffix
            )));
        }

        Ok(())
    }

    /// Replace every field that fails validation with its default.
    pub fn sanitized(mut self) -> Self {
        let Err(e) = self.validate() else {
            return self;
        };
        warn!(error = %e, "Invalid dataset config, falling back to defaults");

        let defaults = Self::default();
        if self.latest_ttl_secs == 0 {
            self.latest_ttl_secs = defaults.latest_ttl_secs;
        }
        if self.header_chunk_size == 0 {
            self.header_chunk_size = defaults.header_chunk_size;
        }
        if self.ready_suffix.is_empty()
            || self.ready_suffix.starts_with(|c: char| c.is_ascii_digit())
        {
            self.ready_suffix = defaults.ready_suffix;
        }
        self
    }

    /// Lifetime of an unused cached latest dataset.
    pub fn latest_ttl(&self) -> Duration {
        Duration::from_secs(self.latest_ttl_secs)
    }

    /// Schema of the configured model.
    pub fn schema(&self) -> &'static GridSchema {
        self.model.schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DatasetConfig::default();
        assert_eq!(config.directory, PathBuf::from("/srv/tawhiri-datasets"));
        assert_eq!(config.latest_ttl_secs, 60);
        assert_eq!(config.latest_ttl(), Duration::from_secs(60));
        assert_eq!(config.ready_suffix, ".tawhiri");
        assert_eq!(config.header_chunk_size, 4096);
        assert!(config.enforce_payload_size);
        assert_eq!(config.model, ModelGrid::Meps);
        assert_eq!(config.schema().shape(), [4, 65, 4, 28, 88]);
    }

    #[test]
    fn test_config_validation() {
        let mut config = DatasetConfig::default();
        assert!(config.validate().is_ok());

        config.latest_ttl_secs = 0;
        assert!(config.validate().is_err());

        config = DatasetConfig::default();
        config.header_chunk_size = 0;
        assert!(config.validate().is_err());

        config = DatasetConfig::default();
        config.ready_suffix = String::new();
        assert!(config.validate().is_err());

        config.ready_suffix = "7.tawhiri".to_string();
        assert!(matches!(config.validate(), Err(DatasetError::Config(_))));
    }

    #[test]
    fn test_sanitized_replaces_invalid_fields() {
        let config = DatasetConfig {
            latest_ttl_secs: 0,
            ready_suffix: String::new(),
            header_chunk_size: 0,
            directory: PathBuf::from("/data/wind"),
            ..DatasetConfig::default()
        }
        .sanitized();
        assert!(config.validate().is_ok());
        assert_eq!(config.latest_ttl_secs, 60);
        assert_eq!(config.ready_suffix, ".tawhiri");
        assert_eq!(config.header_chunk_size, 4096);
        assert_eq!(config.directory, PathBuf::from("/data/wind"));

        let valid = DatasetConfig {
            latest_ttl_secs: 5,
            ..DatasetConfig::default()
        };
        assert_eq!(valid.sanitized().latest_ttl_secs, 5);
    }

    // Only test in this crate that touches these variables.
    #[test]
    fn test_from_env() {
        std::env::set_var("LATEST_DATASET_TTL_SECS", "15");
        std::env::set_var("WIND_DATASET_SUFFIX", ".wind");
        std::env::set_var("WIND_DATASET_ENFORCE_SIZE", "FALSE");
        std::env::set_var("WIND_DATASET_MODEL", "ecmwf");
        std::env::set_var("WIND_DATASET_HEADER_CHUNK", "not-a-number");

        let config = DatasetConfig::from_env();
        assert_eq!(config.latest_ttl(), Duration::from_secs(15));
        assert_eq!(config.ready_suffix, ".wind");
        assert!(!config.enforce_payload_size);
        assert_eq!(config.model, ModelGrid::Ecmwf);
        assert_eq!(config.header_chunk_size, 4096);

        std::env::set_var("LATEST_DATASET_TTL_SECS", "0");
        std::env::set_var("WIND_DATASET_SUFFIX", "");
        std::env::set_var("WIND_DATASET_ENFORCE_SIZE", "1");
        let config = DatasetConfig::from_env();
        assert!(config.enforce_payload_size);
        assert!(config.validate().is_err());
        let config = config.sanitized();
        assert_eq!(config.latest_ttl_secs, 60);
        assert_eq!(config.ready_suffix, ".tawhiri");

        for var in [
            "LATEST_DATASET_TTL_SECS",
            "WIND_DATASET_SUFFIX",
            "WIND_DATASET_ENFORCE_SIZE",
            "WIND_DATASET_MODEL",
            "WIND_DATASET_HEADER_CHUNK",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_config_deserializes_model_name() {
        let config: DatasetConfig = serde_json::from_str(
            r#"{
                "directory": "/data/wind",
                "latest_ttl_secs": 30,
                "ready_suffix": ".tawhiri",
                "header_chunk_size": 512,
                "enforce_payload_size": false,
                "model": "gfs"
            }"#,
        )
        .unwrap();
        assert_eq!(config.model, ModelGrid::Gfs);
        assert_eq!(config.directory, PathBuf::from("/data/wind"));
        assert!(!config.enforce_payload_size);
    }
}
