use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MolgenError;
use crate::filters::{FilterConfig, FilterProperty, Interval};
use crate::service::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};

const CONFIG_FILE: &str = "molgen.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub num_molecules: Option<u32>,
    #[serde(default)]
    pub structures: Vec<StructureEntry>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StructureEntry {
    Shorthand(String),
    Detailed(StructureEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StructureEntryObject {
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FilterEntry {
    Shorthand([f64; 2]),
    Detailed(FilterEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FilterEntryObject {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub endpoint: String,
    pub timeout: Duration,
    pub structures: Vec<Utf8PathBuf>,
    pub filters: FilterConfig,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            structures: Vec::new(),
            filters: FilterConfig::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist. Otherwise `./molgen.json` is tried, then
    /// the user config directory, then built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, MolgenError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => match Self::discover() {
                Some(found) => found,
                None => return Ok(ResolvedConfig::default()),
            },
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| MolgenError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| MolgenError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".config").join("molgen").join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, MolgenError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let mut filters = FilterConfig::default();
        if let Some(num_molecules) = config.num_molecules {
            filters.set_num_molecules(num_molecules)?;
        }
        for (name, entry) in config.filters {
            let property: FilterProperty = name.parse()?;
            let current = filters.interval(property);
            let interval = match entry {
                FilterEntry::Shorthand([a, b]) => Interval::new(a, b)?,
                FilterEntry::Detailed(obj) => Interval::new(
                    obj.min.unwrap_or(current.min()),
                    obj.max.unwrap_or(current.max()),
                )?,
            };
            filters.set_interval(property, interval);
        }

        let structures = config
            .structures
            .into_iter()
            .map(|entry| match entry {
                StructureEntry::Shorthand(path) => Utf8PathBuf::from(path),
                StructureEntry::Detailed(obj) => Utf8PathBuf::from(obj.path),
            })
            .collect();

        Ok(ResolvedConfig {
            schema_version,
            endpoint: config
                .endpoint
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            structures,
            filters,
        })
    }
}

static FILTER_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_]+)\s*=\s*(-?[0-9]*\.?[0-9]+)?\s*:\s*(-?[0-9]*\.?[0-9]+)?\s*$")
        .expect("filter pattern is valid")
});

/// Parses `name=min:max`; either bound may be left empty to keep the
/// current value (`logp=:5`).
pub fn parse_filter_arg(
    value: &str,
    current: &FilterConfig,
) -> Result<(FilterProperty, Interval), MolgenError> {
    let captures = FILTER_ARG.captures(value).ok_or_else(|| {
        MolgenError::InvalidFilter(format!("expected name=min:max, got `{value}`"))
    })?;
    let property: FilterProperty = captures[1].parse()?;
    let existing = current.interval(property);
    let bound = |index: usize, fallback: f64| -> Result<f64, MolgenError> {
        match captures.get(index) {
            Some(m) => m
                .as_str()
                .parse::<f64>()
                .map_err(|err| MolgenError::InvalidFilter(format!("{value}: {err}"))),
            None => Ok(fallback),
        }
    };
    let interval = Interval::new(bound(2, existing.min())?, bound(3, existing.max())?)?;
    Ok((property, interval))
}
