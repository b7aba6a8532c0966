//! Runtime configuration resolved from environment variables with
//! conservative defaults. Secrets stay in the environment; nothing here is
//! persisted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::llm::{GatewayConfig, RateLimits};
use crate::object_store::{FsObjectStore, HttpObjectStore, ObjectStore};

pub const APP_NAME: &str = "retrospect";

/// Application data directory: ~/Retrospect/ (user-visible).
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Retrospect")
}

/// Where the entry bytes and manifest live.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// Local directory, keys as relative paths.
    Fs(PathBuf),
    /// HTTP-fronted bucket base URL.
    Http(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub store: StoreBackend,
    pub gateway: GatewayConfig,
    /// Worker threads per phase.
    pub parallelism: usize,
    pub cache_ttl: Duration,
}

impl AppConfig {
    /// Resolve configuration from the environment.
    ///
    /// - `RETROSPECT_DB_PATH` — SQLite file (default `~/Retrospect/retrospect.db`)
    /// - `RETROSPECT_STORE_URL` — bucket base URL; when unset,
    ///   `RETROSPECT_STORE_DIR` (default `~/Retrospect/bucket`) is used
    /// - `RETROSPECT_API_KEY` (fallback `OPENAI_API_KEY`), `RETROSPECT_MODEL`,
    ///   `RETROSPECT_BASE_URL`
    /// - `RETROSPECT_RPM`, `RETROSPECT_RPD` — rate ceilings
    /// - `RETROSPECT_PARALLELISM` — worker threads (default 5)
    pub fn from_env() -> Self {
        let data_dir = app_data_dir();

        let db_path = std::env::var("RETROSPECT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("retrospect.db"));

        let store = match std::env::var("RETROSPECT_STORE_URL") {
            Ok(url) => StoreBackend::Http(url),
            Err(_) => StoreBackend::Fs(
                std::env::var("RETROSPECT_STORE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data_dir.join("bucket")),
            ),
        };

        let mut gateway = GatewayConfig {
            api_key: std::env::var("RETROSPECT_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .unwrap_or_default(),
            ..GatewayConfig::default()
        };
        if let Ok(model) = std::env::var("RETROSPECT_MODEL") {
            gateway.model = model;
        }
        if let Ok(base_url) = std::env::var("RETROSPECT_BASE_URL") {
            gateway.base_url = base_url;
        }
        gateway.limits = RateLimits {
            per_minute: env_number("RETROSPECT_RPM", RateLimits::default().per_minute),
            per_day: env_number("RETROSPECT_RPD", RateLimits::default().per_day),
        };

        Self {
            db_path,
            store,
            gateway,
            parallelism: env_number("RETROSPECT_PARALLELISM", 5u32) as usize,
            cache_ttl: DEFAULT_TTL,
        }
    }

    pub fn build_store(&self) -> Arc<dyn ObjectStore> {
        match &self.store {
            StoreBackend::Fs(root) => Arc::new(FsObjectStore::new(root.clone())),
            StoreBackend::Http(base_url) => Arc::new(HttpObjectStore::new(base_url)),
        }
    }
}

fn env_number<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_is_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Retrospect"));
    }

    #[test]
    fn env_number_falls_back_on_garbage() {
        std::env::set_var("RETROSPECT_TEST_NUM", "not-a-number");
        assert_eq!(env_number("RETROSPECT_TEST_NUM", 7u32), 7);
        std::env::set_var("RETROSPECT_TEST_NUM", "12");
        assert_eq!(env_number("RETROSPECT_TEST_NUM", 7u32), 12);
        std::env::remove_var("RETROSPECT_TEST_NUM");
    }
}
