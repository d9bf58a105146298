use std::time::Duration;

use crate::RetryPolicy;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

/// Trimmed base URL without a trailing slash; blank or missing input yields the default.
pub fn normalize_base_url(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return DEFAULT_SERVICE_URL.to_string();
    }
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Analysis results live at `{analysis_endpoint}/{identifier}`.
    pub analysis_endpoint: String,
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_endpoint: format!("{DEFAULT_SERVICE_URL}/analysis"),
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed_and_defaulted() {
        assert_eq!(normalize_base_url(None), DEFAULT_SERVICE_URL);
        assert_eq!(normalize_base_url(Some("   ")), DEFAULT_SERVICE_URL);
        assert_eq!(
            normalize_base_url(Some(" http://analysis:9000/ ")),
            "http://analysis:9000"
        );
        assert_eq!(normalize_base_url(Some("http://a/b")), "http://a/b");
    }
}
