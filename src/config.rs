use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::StructureFormat;
use crate::error::SelectorError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-ss.json";
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_ABSENT_MARKER: &str = "NA";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub format: Option<StructureFormat>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub timeouts: TimeoutsEntry,
    #[serde(default)]
    pub endpoints: EndpointsEntry,
    #[serde(default)]
    pub absent_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TimeoutsEntry {
    #[serde(default)]
    pub resolve_secs: Option<u64>,
    #[serde(default)]
    pub metadata_secs: Option<u64>,
    #[serde(default)]
    pub download_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointsEntry {
    #[serde(default)]
    pub pdbe: Option<String>,
    #[serde(default)]
    pub rcsb_data: Option<String>,
    #[serde(default)]
    pub rcsb_files: Option<String>,
}

/// Per-call budgets. Downloads carry whole structure files, so they get the
/// largest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub resolve: Duration,
    pub metadata: Duration,
    pub download: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            resolve: Duration::from_secs(10),
            metadata: Duration::from_secs(20),
            download: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub pdbe: String,
    pub rcsb_data: String,
    pub rcsb_files: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            pdbe: "https://www.ebi.ac.uk/pdbe/api".to_string(),
            rcsb_data: "https://data.rcsb.org".to_string(),
            rcsb_files: "https://files.rcsb.org".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub destination: Utf8PathBuf,
    pub format: StructureFormat,
    pub workers: usize,
    pub max_retries: usize,
    pub timeouts: Timeouts,
    pub endpoints: Endpoints,
    pub absent_marker: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            destination: Utf8PathBuf::from("pdb_files"),
            format: StructureFormat::default(),
            workers: DEFAULT_WORKERS,
            max_retries: 0,
            timeouts: Timeouts::default(),
            endpoints: Endpoints::default(),
            absent_marker: DEFAULT_ABSENT_MARKER.to_string(),
        }
    }
}

/// Command line values that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub destination: Option<Utf8PathBuf>,
    pub format: Option<StructureFormat>,
    pub workers: Option<usize>,
    pub max_retries: Option<usize>,
    pub absent_marker: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `kira-ss.json` from the working directory when it
    /// exists. An explicit path that cannot be read is an error; a missing
    /// default file just means defaults.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SelectorError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| SelectorError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| SelectorError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SelectorError> {
        let defaults = ResolvedConfig::default();

        let workers = overrides
            .workers
            .or(config.workers)
            .unwrap_or(defaults.workers);
        if workers == 0 {
            return Err(SelectorError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }

        let timeouts = Timeouts {
            resolve: seconds(config.timeouts.resolve_secs, defaults.timeouts.resolve, "resolve")?,
            metadata: seconds(
                config.timeouts.metadata_secs,
                defaults.timeouts.metadata,
                "metadata",
            )?,
            download: seconds(
                config.timeouts.download_secs,
                defaults.timeouts.download,
                "download",
            )?,
        };

        let endpoints = Endpoints {
            pdbe: endpoint(config.endpoints.pdbe, defaults.endpoints.pdbe),
            rcsb_data: endpoint(config.endpoints.rcsb_data, defaults.endpoints.rcsb_data),
            rcsb_files: endpoint(config.endpoints.rcsb_files, defaults.endpoints.rcsb_files),
        };

        let destination = overrides
            .destination
            .or_else(|| config.destination.map(Utf8PathBuf::from))
            .unwrap_or(defaults.destination);
        if destination.as_str().trim().is_empty() {
            return Err(SelectorError::InvalidConfig(
                "destination must not be empty".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(defaults.schema_version),
            destination,
            format: overrides
                .format
                .or(config.format)
                .unwrap_or(defaults.format),
            workers,
            max_retries: overrides
                .max_retries
                .or(config.max_retries)
                .unwrap_or(defaults.max_retries),
            timeouts,
            endpoints,
            absent_marker: overrides
                .absent_marker
                .or(config.absent_marker)
                .unwrap_or(defaults.absent_marker),
        })
    }
}

fn seconds(value: Option<u64>, fallback: Duration, name: &str) -> Result<Duration, SelectorError> {
    match value {
        Some(0) => Err(SelectorError::InvalidConfig(format!(
            "{name} timeout must be greater than zero"
        ))),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(fallback),
    }
}

fn endpoint(value: Option<String>, fallback: String) -> String {
    value
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or(fallback)
}
