use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use genre_classifier::DEFAULT_MODEL_PATH;
use genre_services::{HttpOptions, DEFAULT_MAX_UPLOAD_BYTES};

pub const CONFIG_ENV: &str = "GENRE_CONFIG";
pub const MODEL_PATH_ENV: &str = "GENRE_MODEL_PATH";
pub const BIND_ADDR_ENV: &str = "GENRE_BIND_ADDR";
pub const WORKERS_ENV: &str = "GENRE_WORKERS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server settings. Every field may be omitted from the YAML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub model_path: PathBuf,
    pub staging_dir: Option<PathBuf>,
    pub workers: usize,
    pub queue_depth: usize,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let http = HttpOptions::default();
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            staging_dir: None,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            queue_depth: 32,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_origins: http.cors_origins,
        }
    }
}

impl ServerConfig {
    /// Reads `path` if given, applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml(&text)?
            }
            None => Self::default(),
        };
        let config = config.with_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(MODEL_PATH_ENV) {
            self.model_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup(BIND_ADDR_ENV) {
            self.bind_addr = addr.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: BIND_ADDR_ENV,
                value: addr.clone(),
            })?;
        }
        if let Some(workers) = lookup(WORKERS_ENV) {
            self.workers = workers
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: WORKERS_ENV,
                    value: workers.clone(),
                })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            max_upload_bytes: self.max_upload_bytes,
            cors_origins: self.cors_origins.clone(),
        }
    }
}
