//! By-key byte store over the entries bucket. Reads are the extraction hot
//! path; writes only matter to the downstream exporter.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Key of the corpus manifest inside the entries bucket.
pub const MANIFEST_KEY: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Network error fetching {key}: {reason}")]
    Network { key: String, reason: String },

    #[error("I/O error for {key}: {reason}")]
    Io { key: String, reason: String },
}

pub trait ObjectStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError>;
}

/// Local-directory store: keys are relative paths under a root. Used for
/// local runs and tests.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let path = self.root.join(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(ObjectStoreError::Io {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ObjectStoreError::Io {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        }
        std::fs::write(&path, bytes).map_err(|e| ObjectStoreError::Io {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// HTTP-fronted bucket (R2 public endpoint or equivalent). Short timeout,
/// bounded retry on transient failure.
pub struct HttpObjectStore {
    base_url: String,
    client: reqwest::blocking::Client,
    retries: u32,
}

impl HttpObjectStore {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create object store HTTP client");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retries: 2,
        }
    }

    fn get_once(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let url = format!("{}/{}", self.base_url, key);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ObjectStoreError::Network {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        let status = response.status();
        if status.as_u16() == 404 {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(ObjectStoreError::Network {
                key: key.to_string(),
                reason: format!("HTTP {status}"),
            });
        }
        let bytes = response.bytes().map_err(|e| ObjectStoreError::Network {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

impl ObjectStore for HttpObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let mut last = None;
        for attempt in 0..=self.retries {
            match self.get_once(key) {
                Ok(bytes) => return Ok(bytes),
                Err(e @ ObjectStoreError::NotFound(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!(key, attempt, error = %e, "Object fetch failed, retrying");
                    last = Some(e);
                    std::thread::sleep(Duration::from_millis(250 * (attempt as u64 + 1)));
                }
            }
        }
        Err(last.expect("retry loop ran at least once"))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        let url = format!("{}/{}", self.base_url, key);
        let response = self
            .client
            .put(&url)
            .body(bytes.to_vec())
            .send()
            .map_err(|e| ObjectStoreError::Network {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(ObjectStoreError::Network {
                key: key.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }
        Ok(())
    }
}
