//! Application configuration
//!
//! Layered from an optional TOML file and `MONITOR__SECTION__KEY`
//! environment variables. Every section falls back to its defaults.

use alerting::AlarmConfig;
use camera_capture::CameraConfig;
use capture_scheduler::SchedulerConfig;
use ::config::{Config, ConfigError, Environment, File};
use detector_gateway::DetectorConfig;
use face_matcher::MatcherConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "monitor";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub camera: CameraConfig,
    pub scheduler: SchedulerConfig,
    pub detector: DetectorConfig,
    pub store: StoreConfig,
    pub matcher: MatcherConfig,
    pub alarm: AlarmConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Prometheus scrape endpoint; disabled when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            metrics_addr: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Gallery persistence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON document per key
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist; otherwise `monitor.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("MONITOR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
