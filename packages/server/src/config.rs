//! Configuration loading and merging.
//!
//! The config document is a single JSON file: a shared
//! `defaultsServiceConfig` record, a `services` list merged over it, and the
//! global `expireCheckInterval`. Keys are camelCase on disk, matching store
//! files from earlier deployments. All paths resolve against an explicit root
//! directory supplied by the caller — there is no ambient process-global
//! root.

use std::path::{Path, PathBuf};

use hostbox_core::{MimePatternError, MimePolicy};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Configuration failures, all fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("service #{index}: missing required key '{key}'")]
    MissingKey { index: usize, key: &'static str },
    #[error("duplicate service name '{name}'")]
    DuplicateName { name: String },
    #[error("service '{service}': idLength must be at least 1")]
    BadIdLength { service: String },
    #[error("service '{service}': idChars must not be empty")]
    EmptyIdChars { service: String },
    #[error("service '{service}': {source}")]
    MimePattern {
        service: String,
        #[source]
        source: MimePatternError,
    },
}

/// One service record as written in the config file. Every key is optional;
/// required keys are enforced only after merging over the defaults record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialServiceConfig {
    pub name: Option<String>,
    pub id_length: Option<usize>,
    pub id_chars: Option<String>,
    pub port: Option<u16>,
    pub store_location: Option<PathBuf>,
    /// Bundled handler plugin name ("clips", "short-link").
    pub handler: Option<String>,
    /// TTL in millis. Absent = content never expires.
    pub expire_after: Option<i64>,
    /// Maximum payload size in bytes. Absent = unbounded.
    pub size_limit: Option<u64>,
    pub allowed_mimes: Option<Vec<String>>,
    pub disallowed_mimes: Option<Vec<String>>,
    /// Handler-specific keys (e.g. `clipsLocation`), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    defaults_service_config: PartialServiceConfig,
    services: Vec<PartialServiceConfig>,
    expire_check_interval: Option<u64>,
}

/// Fully merged, validated configuration for one service instance.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub id_length: usize,
    pub id_chars: String,
    pub port: u16,
    /// Store file path, already resolved against the data root.
    pub store_location: PathBuf,
    pub handler: String,
    pub expire_after: Option<i64>,
    pub size_limit: Option<u64>,
    pub allowed_mimes: Option<Vec<String>>,
    pub disallowed_mimes: Option<Vec<String>>,
    /// Root directory against which relative paths resolve.
    pub data_root: PathBuf,
    /// Handler-specific keys, defaults merged under the service's own.
    pub extra: Map<String, Value>,
}

impl ServiceConfig {
    /// Compiles the allow/deny MIME lists for this service.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn mime_policy(&self) -> Result<MimePolicy, MimePatternError> {
        MimePolicy::new(self.allowed_mimes.as_deref(), self.disallowed_mimes.as_deref())
    }

    /// Resolves a handler-configured relative path against the data root.
    #[must_use]
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.data_root.join(relative)
    }

    /// A handler-specific string key from the merged `extra` map.
    #[must_use]
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// The whole process configuration: merged service records plus the global
/// sweep interval.
#[derive(Debug)]
pub struct AppConfig {
    pub services: Vec<ServiceConfig>,
    /// Sweep interval in millis. Absent = sweep runs once at startup only.
    pub expire_check_interval: Option<u64>,
}

impl AppConfig {
    /// Reads and merges the config file, resolving paths against `root`.
    ///
    /// # Errors
    ///
    /// Fails on unreadable or unparsable files, on any service missing a
    /// required key after merging, on duplicate service names, and on
    /// degenerate id alphabets.
    pub fn load(path: &Path, root: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes, root)
    }

    /// Parses a config document from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Same validation as [`AppConfig::load`], minus the file read.
    pub fn from_slice(bytes: &[u8], root: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_slice(bytes)?;

        let mut services = Vec::with_capacity(file.services.len());
        for (index, partial) in file.services.into_iter().enumerate() {
            let merged = merge(index, &file.defaults_service_config, partial, root)?;
            if services
                .iter()
                .any(|existing: &ServiceConfig| existing.name == merged.name)
            {
                return Err(ConfigError::DuplicateName { name: merged.name });
            }
            validate(&merged)?;
            services.push(merged);
        }

        Ok(Self {
            services,
            expire_check_interval: file.expire_check_interval,
        })
    }
}

/// Overlays one service record on the defaults record. Scalar keys take the
/// service's value when present; `extra` keys from the service shadow the
/// defaults' entries of the same name.
fn merge(
    index: usize,
    defaults: &PartialServiceConfig,
    service: PartialServiceConfig,
    root: &Path,
) -> Result<ServiceConfig, ConfigError> {
    let pick_str = |field: Option<String>, fallback: &Option<String>, key| {
        field
            .or_else(|| fallback.clone())
            .ok_or(ConfigError::MissingKey { index, key })
    };

    let name = pick_str(service.name, &defaults.name, "name")?;
    let handler = pick_str(service.handler, &defaults.handler, "handler")?;
    let id_chars = pick_str(service.id_chars, &defaults.id_chars, "idChars")?;
    let id_length = service
        .id_length
        .or(defaults.id_length)
        .ok_or(ConfigError::MissingKey {
            index,
            key: "idLength",
        })?;
    let port = service
        .port
        .or(defaults.port)
        .ok_or(ConfigError::MissingKey { index, key: "port" })?;
    let store_location = service
        .store_location
        .or_else(|| defaults.store_location.clone())
        .ok_or(ConfigError::MissingKey {
            index,
            key: "storeLocation",
        })?;

    let mut extra = defaults.extra.clone();
    extra.extend(service.extra);

    Ok(ServiceConfig {
        name,
        id_length,
        id_chars,
        port,
        store_location: root.join(store_location),
        handler,
        expire_after: service.expire_after.or(defaults.expire_after),
        size_limit: service.size_limit.or(defaults.size_limit),
        allowed_mimes: service
            .allowed_mimes
            .or_else(|| defaults.allowed_mimes.clone()),
        disallowed_mimes: service
            .disallowed_mimes
            .or_else(|| defaults.disallowed_mimes.clone()),
        data_root: root.to_path_buf(),
        extra,
    })
}

fn validate(config: &ServiceConfig) -> Result<(), ConfigError> {
    if config.id_length == 0 {
        return Err(ConfigError::BadIdLength {
            service: config.name.clone(),
        });
    }
    if config.id_chars.is_empty() {
        return Err(ConfigError::EmptyIdChars {
            service: config.name.clone(),
        });
    }
    config
        .mime_policy()
        .map_err(|source| ConfigError::MimePattern {
            service: config.name.clone(),
            source,
        })?;
    Ok(())
}
