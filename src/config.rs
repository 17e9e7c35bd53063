//! Environment-driven configuration
//!
//! Environment variables:
//! - ALLOCSTATS_TRACE_PROCESS: trace the whole process and print a report at exit
//! - ALLOCSTATS_LIBRARY_DIR: standard library source root, aliased to `<LIBDIR>`
//! - ALLOCSTATS_PACKAGE_DIR: package root, aliased to `<PKGDIR>` / `<PKG:name>`
//! - ALLOCSTATS_ALIAS_PATHS: alias source files in reports (default: true)
//! - ALLOCSTATS_TOP_SITES_LIMIT: leaderboard size (default: 10)
//! - ALLOCSTATS_FORMAT: `text` or `json` (default: text)
//! - ALLOCSTATS_REPORT_PATH: also write the report to this file

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_TOP_SITES_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(ConfigError::InvalidValue {
                key: "ALLOCSTATS_FORMAT",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Whole-process trace mode
    pub trace_process: bool,
    pub library_dir: Option<PathBuf>,
    pub package_dir: Option<PathBuf>,
    /// Whether reports show aliased source files
    pub alias_paths: bool,
    pub top_sites_limit: usize,
    pub format: ReportFormat,
    pub report_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trace_process: false,
            library_dir: None,
            package_dir: None,
            alias_paths: true,
            top_sites_limit: DEFAULT_TOP_SITES_LIMIT,
            format: ReportFormat::Text,
            report_path: None,
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let trace_process = non_empty("ALLOCSTATS_TRACE_PROCESS")
            .map(|v| parse_bool("ALLOCSTATS_TRACE_PROCESS", &v))
            .transpose()?
            .unwrap_or(defaults.trace_process);

        let alias_paths = non_empty("ALLOCSTATS_ALIAS_PATHS")
            .map(|v| parse_bool("ALLOCSTATS_ALIAS_PATHS", &v))
            .transpose()?
            .unwrap_or(defaults.alias_paths);

        let top_sites_limit = match non_empty("ALLOCSTATS_TOP_SITES_LIMIT") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "ALLOCSTATS_TOP_SITES_LIMIT",
                    value: v,
                })?,
            None => defaults.top_sites_limit,
        };

        let format = non_empty("ALLOCSTATS_FORMAT")
            .map(|v| v.parse::<ReportFormat>())
            .transpose()?
            .unwrap_or(defaults.format);

        Ok(Self {
            trace_process,
            library_dir: non_empty("ALLOCSTATS_LIBRARY_DIR").map(PathBuf::from),
            package_dir: non_empty("ALLOCSTATS_PACKAGE_DIR").map(PathBuf::from),
            alias_paths,
            top_sites_limit,
            format,
            report_path: non_empty("ALLOCSTATS_REPORT_PATH").map(PathBuf::from),
        })
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}
