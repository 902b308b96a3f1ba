//! Server configuration.
//!
//! Loaded from a TOML file (path from `BRIDGE_AID_CONFIG`, falling back
//! to [`DEFAULT_CONFIG_PATH`] when present, else built-in defaults).
//! `BIND_ADDR` and `PORT` override the file.
//!
//! ```toml
//! port = 9000
//! identity_header = "X-Reporter-Id"
//!
//! [incidents]
//! confirmation_threshold = 3
//!
//! [geocoder]
//! region_bias = "ca"
//! ```

use std::path::{Path, PathBuf};

use bridge_aid_geocoder::GeocoderConfig;
use bridge_aid_incidents::IncidentConfig;
use bridge_aid_incidents::config::InvalidIncidentConfig;
use serde::Deserialize;
use thiserror::Error;

/// Config file used when `BRIDGE_AID_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/bridge_aid.toml";

/// Failure loading the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid config TOML.
    #[error("failed to parse {}: {source}", path.display())]
    Toml {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("invalid [incidents] config: {0}")]
    Invalid(#[from] InvalidIncidentConfig),
}

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: String,
    /// Port to bind.
    pub port: u16,
    /// Request header carrying the trusted reporter identity.
    pub identity_header: String,
    /// Ingestion and confirmation tunables.
    pub incidents: IncidentConfig,
    /// Geocoding provider and cache settings.
    pub geocoder: GeocoderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            identity_header: "X-Reporter-Id".to_string(),
            incidents: IncidentConfig::default(),
            geocoder: GeocoderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the file named by `BRIDGE_AID_CONFIG` (or
    /// [`DEFAULT_CONFIG_PATH`] if it exists), then applies `BIND_ADDR` and
    /// `PORT` overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a config file is named or present but
    /// cannot be read or parsed, or if its values fail validation.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os("BRIDGE_AID_CONFIG").map_or_else(
            || {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.exists().then_some(default)
            },
            |p| Some(PathBuf::from(p)),
        );

        let mut config = match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(
            std::env::var("BIND_ADDR").ok(),
            std::env::var("PORT").ok(),
        );
        config.validate()?;

        Ok(config)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Toml`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks values that parse but make no sense.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a degenerate `[incidents]`
    /// table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(self.incidents.validate()?)
    }

    /// Applies environment overrides. An unparseable port is ignored.
    pub fn apply_overrides(&mut self, bind_addr: Option<String>, port: Option<String>) {
        if let Some(bind_addr) = bind_addr.filter(|b| !b.trim().is_empty()) {
            self.bind_addr = bind_addr;
        }
        if let Some(port) = port {
            match port.trim().parse() {
                Ok(port) => self.port = port,
                Err(e) => log::warn!("Ignoring invalid PORT={port}: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            port = 9000

            [incidents]
            confirmation_threshold = 5

            [geocoder]
            region_bias = "us"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.identity_header, "X-Reporter-Id");
        assert_eq!(config.incidents.confirmation_threshold, 5);
        assert_eq!(config.incidents.cooldown_minutes, 10);
        assert_eq!(config.geocoder.region_bias.as_deref(), Some("us"));
        assert_eq!(config.geocoder.cache_ttl_secs, 600);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(toml::from_str::<ServerConfig>("prot = 1").is_err());
    }

    #[test]
    fn rejects_degenerate_incident_settings() {
        let config: ServerConfig = toml::from_str(
            r#"
            [incidents]
            confirmation_threshold = 1
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(
                InvalidIncidentConfig::ConfirmationThreshold(1)
            ))
        ));

        let config: ServerConfig = toml::from_str(
            r#"
            [incidents]
            proximity_threshold_m = -200.0
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(InvalidIncidentConfig::ProximityThreshold(_)))
        ));

        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn env_overrides_win() {
        let mut config = ServerConfig::default();
        config.apply_overrides(Some("0.0.0.0".to_string()), Some("3000".to_string()));
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 3000);

        config.apply_overrides(None, Some("not-a-port".to_string()));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ServerConfig::from_file(Path::new("/nonexistent/bridge_aid.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
