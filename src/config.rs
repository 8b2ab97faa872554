//! Runtime Configuration
//!
//! Settings are resolved once per process, lowest priority first:
//! 1. Built-in defaults
//! 2. YAML config file (`--config`, `CDNFLOW_CONFIG`, or `cdnflow.yaml`)
//! 3. Environment variables
//!
//! # Environment Variables
//!
//! | Variable               | Setting               |
//! |------------------------|-----------------------|
//! | `FASTLY_API_URL`       | `api_url`             |
//! | `FASTLY_TOKEN`         | `api_token`           |
//! | `FASTLY_CUSTOMER_ID`   | `customer_id`         |
//! | `FASTLY_SERVICE_ID`    | `fallback_service_id` |
//! | `CDNFLOW_TIMEOUT_SECS` | `timeout_secs`        |

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::api::DEFAULT_API_URL;
use crate::workflow::context::Context;

/// File name looked up when no config path is given.
pub const CONFIG_FILE_NAME: &str = "cdnflow.yaml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CDNFLOW_CONFIG";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Lazily-resolved default config file location.
///
/// A `cdnflow.yaml` next to the executable wins over one in the working
/// directory. The returned path may not exist.
pub static DEFAULT_CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let installed = exe_dir.join(CONFIG_FILE_NAME);
            if installed.exists() {
                debug!("Using installed config: {}", installed.display());
                return installed;
            }
        }
    }

    PathBuf::from(CONFIG_FILE_NAME)
});

/// Errors raised while resolving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("no API token configured; set FASTLY_TOKEN or api_token in the config file")]
    MissingToken,
}

/// Resolved runtime settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,

    #[serde(skip_serializing)]
    pub api_token: Option<String>,

    /// Account the workflows act on; omitted from requests when unset
    pub customer_id: Option<String>,

    /// Existing service whose versions are listed when service creation fails
    pub fallback_service_id: Option<String>,

    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            customer_id: None,
            fallback_service_id: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Resolves settings from the config file and the process environment.
    ///
    /// An explicit path (argument or `CDNFLOW_CONFIG`) must exist; the
    /// default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);

        let mut settings = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None if DEFAULT_CONFIG_PATH.exists() => Self::from_file(&DEFAULT_CONFIG_PATH)?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        settings.apply_env(|var| std::env::var(var).ok())?;
        Ok(settings)
    }

    /// Reads settings from a YAML file, defaults filling missing fields.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading config from: {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Overrides fields from environment variables. Empty values are ignored.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("FASTLY_API_URL") {
            self.api_url = url;
        }
        if let Some(token) = get("FASTLY_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(customer) = get("FASTLY_CUSTOMER_ID") {
            self.customer_id = Some(customer);
        }
        if let Some(service) = get("FASTLY_SERVICE_ID") {
            self.fallback_service_id = Some(service);
        }
        if let Some(raw) = get("CDNFLOW_TIMEOUT_SECS") {
            self.timeout_secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidEnv {
                    var: "CDNFLOW_TIMEOUT_SECS",
                    value: raw,
                })?;
        }

        Ok(())
    }

    /// Returns the API token, which every live run needs.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.api_token.as_deref().ok_or(ConfigError::MissingToken)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the initial run context.
    ///
    /// `customer_id` is always present (null when unset, so requests omit
    /// it). `stats_from` and `stats_to` are Unix timestamps covering
    /// 2022-06-01 until `now`.
    pub fn initial_context(&self, now: DateTime<Utc>) -> Context {
        let mut ctx = Context::new();

        ctx.insert(
            "customer_id",
            self.customer_id.clone().map_or(Value::Null, Value::String),
        );
        if let Some(service_id) = &self.fallback_service_id {
            ctx.insert("fallback_service_id", service_id.as_str());
        }
        if let Some(from) = Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).single() {
            ctx.insert("stats_from", from.timestamp());
        }
        ctx.insert("stats_to", now.timestamp());

        ctx
    }
}

/// Parses a `KEY=VALUE` override.
///
/// Values that parse as JSON scalars (numbers, booleans, null) keep their
/// type; anything else is a string.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("Expected KEY=VALUE, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Empty key in '{}'", raw));
    }

    let value = match serde_json::from_str::<Value>(value) {
        Ok(parsed) if !parsed.is_object() && !parsed.is_array() => parsed,
        _ => Value::String(value.to_string()),
    };

    Ok((key.to_string(), value))
}
