//! Application configuration.
//!
//! Defaults are overridden by an optional RON file and then by environment
//! variables.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dashboard_engine::{normalize_base_url, EngineConfig, RetryPolicy};
use dashboard_logging::dashboard_info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "dashboard.ron";

const ENV_SERVICE_URL: &str = "ANALYSIS_SERVICE_URL";
const ENV_BIND: &str = "DASHBOARD_BIND";
const ENV_DATASET_ROOT: &str = "DATASET_ROOT";
const ENV_ANALYSIS_ENDPOINT: &str = "ANALYSIS_ENDPOINT";

const PROXY_TIMEOUT_MARGIN_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid bind address {0:?}")]
    Bind(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind: String,
    pub dataset_root: PathBuf,
    /// Base URL of the remote analysis and analytics service.
    pub service_base_url: String,
    /// Where the session fetches analysis results. Defaults to this server's
    /// own upload proxy.
    pub analysis_endpoint: Option<String>,
    pub upload_timeout_secs: u64,
    /// Per-attempt analysis timeout. When analysis goes through the upload
    /// proxy it is raised above `upload_timeout_secs`.
    pub request_timeout_secs: u64,
    pub backoff_ms: Vec<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            bind: "127.0.0.1:3000".to_string(),
            dataset_root: PathBuf::from("dataset"),
            service_base_url: normalize_base_url(None),
            analysis_endpoint: None,
            upload_timeout_secs: 300,
            request_timeout_secs: retry.request_timeout.as_secs(),
            backoff_ms: retry
                .backoff_delays
                .iter()
                .map(|delay| delay.as_millis() as u64)
                .collect(),
        }
    }
}

impl AppConfig {
    /// Loads `path` if it exists, then applies the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        dashboard_info!("Loaded configuration from {:?}", path);
        Ok(config.normalized())
    }

    /// Applies overrides from `lookup`; blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = get(ENV_SERVICE_URL) {
            self.service_base_url = normalize_base_url(Some(&url));
        }
        if let Some(bind) = get(ENV_BIND) {
            self.bind = bind.trim().to_string();
        }
        if let Some(root) = get(ENV_DATASET_ROOT) {
            self.dataset_root = PathBuf::from(root.trim());
        }
        if let Some(endpoint) = get(ENV_ANALYSIS_ENDPOINT) {
            self.analysis_endpoint = Some(endpoint.trim().to_string());
        }
    }

    fn normalized(mut self) -> Self {
        self.service_base_url = normalize_base_url(Some(&self.service_base_url));
        self
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::Bind(self.bind.clone()))
    }

    /// Explicit endpoint, else `http://{bind}/api/analysis` with an
    /// unspecified host replaced by loopback.
    pub fn analysis_endpoint(&self) -> String {
        if let Some(endpoint) = &self.analysis_endpoint {
            return endpoint.trim_end_matches('/').to_string();
        }
        let host = match self.bind.parse::<SocketAddr>() {
            Ok(addr) if addr.ip().is_unspecified() => format!("127.0.0.1:{}", addr.port()),
            _ => self.bind.clone(),
        };
        format!("http://{host}/api/analysis")
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// An attempt through the upload proxy must outlast the upload, so the
    /// proxy's own `504` decides instead of an aborted re-upload.
    fn request_timeout(&self) -> Duration {
        let secs = if self.analysis_endpoint.is_none() {
            self.request_timeout_secs
                .max(self.upload_timeout_secs + PROXY_TIMEOUT_MARGIN_SECS)
        } else {
            self.request_timeout_secs
        };
        Duration::from_secs(secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let retry = RetryPolicy {
            backoff_delays: self
                .backoff_ms
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
            request_timeout: self.request_timeout(),
            ..RetryPolicy::default()
        };
        EngineConfig {
            analysis_endpoint: self.analysis_endpoint(),
            retry,
            ..EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.service_base_url, "http://localhost:8000");
        assert_eq!(config.backoff_ms, vec![1_500, 3_000, 6_000, 10_000, 15_000]);
    }

    #[test]
    fn file_values_are_partial_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"(service_base_url: " http://analysis:9000/ ", backoff_ms: [10, 20])"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.service_base_url, "http://analysis:9000");
        assert_eq!(config.bind, "127.0.0.1:3000");

        let engine = config.engine_config();
        assert_eq!(engine.retry.max_attempts(), 3);
        assert_eq!(engine.analysis_endpoint, "http://127.0.0.1:3000/api/analysis");
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "(bind: ").unwrap();
        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ANALYSIS_SERVICE_URL", "http://svc:8000/"),
            ("DASHBOARD_BIND", "0.0.0.0:8080"),
            ("DATASET_ROOT", "  "),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.service_base_url, "http://svc:8000");
        assert_eq!(config.dataset_root, PathBuf::from("dataset"));
        assert_eq!(config.analysis_endpoint(), "http://127.0.0.1:8080/api/analysis");

        config.apply_env(|key| (key == "ANALYSIS_ENDPOINT").then(|| "http://x/analysis/".into()));
        assert_eq!(config.analysis_endpoint(), "http://x/analysis");
    }

    #[test]
    fn proxied_analysis_outlasts_the_upload() {
        let mut config = AppConfig {
            upload_timeout_secs: 300,
            request_timeout_secs: 120,
            ..AppConfig::default()
        };
        assert_eq!(
            config.engine_config().retry.request_timeout,
            Duration::from_secs(305)
        );

        config.analysis_endpoint = Some("http://svc:8000/analysis".into());
        assert_eq!(
            config.engine_config().retry.request_timeout,
            Duration::from_secs(120)
        );
    }
}
