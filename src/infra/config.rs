//! Configuration loading from TOML files
//!
//! Config file is selected via the `--config <path>` command line argument
//! (default: config/dev.toml). A missing or invalid file falls back to the
//! built-in defaults with a warning.

use crate::domain::zone::validate_all;
use crate::domain::{Bounds, Zone};
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteConfig {
    /// Deployment identifier, used as the Prometheus `site` label
    #[serde(default = "default_site_id")]
    pub id: String,
}

fn default_site_id() -> String {
    "geofence".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind_address")]
    pub bind_address: String,
    /// HTTP API port (0 to disable)
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Largest accepted request body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_http_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_http_bind_address(),
            port: default_http_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct JournalConfig {
    /// JSONL journal path; unset keeps all data in memory
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    10
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

/// One `[[zones]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneConfig {
    pub id: String,
    pub name: String,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl From<ZoneConfig> for Zone {
    fn from(z: ZoneConfig) -> Self {
        Zone::new(z.id, z.name, Bounds::new(z.min_lat, z.max_lat, z.min_lng, z.max_lng))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub zones: Option<Vec<ZoneConfig>>,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    http_bind_address: String,
    http_port: u16,
    http_max_body_bytes: usize,
    journal_file: Option<String>,
    metrics_interval_secs: u64,
    zones: Vec<Zone>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            http_bind_address: default_http_bind_address(),
            http_port: default_http_port(),
            http_max_body_bytes: default_max_body_bytes(),
            journal_file: None,
            metrics_interval_secs: default_metrics_interval(),
            zones: Self::default_zones(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Built-in zone set used when the config file declares none
    fn default_zones() -> Vec<Zone> {
        vec![
            Zone::new("CPK", "Central Park", Bounds::new(40.764, 40.800, -73.981, -73.949)),
            Zone::new("TMS", "Times Square", Bounds::new(40.755, 40.760, -73.986, -73.982)),
            Zone::new("LGA", "LaGuardia Airport", Bounds::new(40.770, 40.780, -73.880, -73.860)),
            Zone::new("JFK", "JFK Airport", Bounds::new(40.640, 40.650, -73.790, -73.760)),
        ]
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let zones = match toml_config.zones {
            Some(zones) => zones.into_iter().map(Zone::from).collect(),
            None => Self::default_zones(),
        };
        validate_all(&zones)
            .with_context(|| format!("Invalid zones in config file {}", path.display()))?;

        Ok(Self {
            site_id: toml_config.site.id,
            http_bind_address: toml_config.http.bind_address,
            http_port: toml_config.http.port,
            http_max_body_bytes: toml_config.http.max_body_bytes,
            journal_file: toml_config.journal.file.filter(|f| !f.trim().is_empty()),
            metrics_interval_secs: toml_config.metrics.interval_secs.max(1),
            zones,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn http_bind_address(&self) -> &str {
        &self.http_bind_address
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn http_max_body_bytes(&self) -> usize {
        self.http_max_body_bytes
    }

    pub fn journal_file(&self) -> Option<&str> {
        self.journal_file.as_deref()
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to set the zone set
    #[cfg(test)]
    pub fn with_zones(mut self, zones: Vec<Zone>) -> Self {
        self.zones = zones;
        self
    }
}
