// src/config.rs
//
// Run configuration: credentials file, tuning knobs and endpoint handling.
// Everything the driver needs is carried in `UploaderConfig`; nothing is global.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::constants::{
    COGNITIVE_SERVICES_DOMAIN, DEFAULT_BATCH_SIZE, DEFAULT_FETCH_TIMEOUT, ENV_PROJECT_ID,
    ENV_STORAGE_KEY, ENV_TRAINING_KEY, MAX_IMAGES_PER_UPLOAD, WORKERS_PER_CPU,
};
use crate::error::ConfigError;

/// Contents of the credentials file (`keys.json`).
///
/// Fields are optional at parse time so a missing entry can be reported by
/// name, and so environment variables can fill the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Keys {
    #[serde(default)]
    pub storage_key: Option<String>,
    #[serde(default, rename = "customvision_projectid")]
    pub project_id: Option<String>,
    #[serde(default, rename = "customvision_training_key")]
    pub training_key: Option<String>,
}

impl Keys {
    /// Read and parse a credentials file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::KeysFileUnreadable {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|source| ConfigError::KeysFileInvalid {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overlay values from `CVBLOB_*` environment variables (after `.env` is loaded).
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |current: Option<String>, var: &str| match lookup(var) {
            Some(v) if !v.trim().is_empty() => {
                debug!("credential override from ${}", var);
                Some(v)
            }
            _ => current,
        };
        self.storage_key = pick(self.storage_key.take(), ENV_STORAGE_KEY);
        self.project_id = pick(self.project_id.take(), ENV_PROJECT_ID);
        self.training_key = pick(self.training_key.take(), ENV_TRAINING_KEY);
        self
    }

    pub fn require_storage_key(&self) -> Result<&str, ConfigError> {
        required(self.storage_key.as_deref(), "storage_key", ENV_STORAGE_KEY)
    }

    pub fn require_project_id(&self) -> Result<&str, ConfigError> {
        required(self.project_id.as_deref(), "customvision_projectid", ENV_PROJECT_ID)
    }

    pub fn require_training_key(&self) -> Result<&str, ConfigError> {
        required(self.training_key.as_deref(), "customvision_training_key", ENV_TRAINING_KEY)
    }
}

fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
    env: &'static str,
) -> Result<&'a str, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingCredential { field, env }),
    }
}

/// Where blobs are read from.
#[derive(Debug, Clone)]
pub enum StorageSource {
    /// Cloud blob container, authenticated with the account's shared key.
    Azure {
        account: String,
        container: String,
        access_key: String,
        /// Custom blob endpoint, e.g. an emulator. `None` uses the public cloud.
        endpoint: Option<String>,
    },
    /// A local directory standing in for the container.
    Local { root: PathBuf },
}

/// Runtime parameters for one upload run.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    pub source: StorageSource,
    pub prefix: String,
    pub tags: Vec<String>,
    pub endpoint: String,
    pub project_id: String,
    pub training_key: String,
    pub batch_size: usize,
    pub workers: usize,
    pub fetch_timeout: Duration,
}

impl UploaderConfig {
    pub fn new(
        source: StorageSource,
        prefix: impl Into<String>,
        tags: Vec<String>,
        endpoint: &str,
        project_id: impl Into<String>,
        training_key: impl Into<String>,
    ) -> Self {
        Self {
            source,
            prefix: prefix.into(),
            tags,
            endpoint: normalize_endpoint(endpoint),
            project_id: project_id.into(),
            training_key: training_key.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_workers(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Reject settings that would fail later, before any network work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.batch_size > MAX_IMAGES_PER_UPLOAD {
            return Err(ConfigError::BatchSizeAboveLimit {
                requested: self.batch_size,
                limit: MAX_IMAGES_PER_UPLOAD,
            });
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.workers > Semaphore::MAX_PERMITS {
            return Err(ConfigError::TooManyWorkers {
                requested: self.workers,
                limit: Semaphore::MAX_PERMITS,
            });
        }
        if self.tags.is_empty() {
            return Err(ConfigError::NoTags);
        }
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                field: "customvision_projectid",
                env: ENV_PROJECT_ID,
            });
        }
        if self.training_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                field: "customvision_training_key",
                env: ENV_TRAINING_KEY,
            });
        }
        Ok(())
    }
}

/// Default fetch pool size: scales with the host's logical CPUs.
pub fn default_workers() -> usize {
    num_cpus::get().max(1) * WORKERS_PER_CPU
}

/// Split a comma-separated tag list; trims, drops empties and repeats, keeps order.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// A bare region name becomes the public service URL; full URLs pass through.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.contains("://") {
        endpoint.trim_end_matches('/').to_string()
    } else {
        format!("https://{}.{}", endpoint, COGNITIVE_SERVICES_DOMAIN)
    }
}
