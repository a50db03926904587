use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CloudError, Result};

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Backend root, e.g. "https://noc.example.net".
    pub base_url: String,

    pub username: String,

    pub password: String,

    /// Login endpoint, relative to `base_url`.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Extra attempts after the first one.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_login_path() -> String {
    "/api/auth/login".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_timeout_secs() -> u64 {
    30
}

impl CloudConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            login_path: default_login_path(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `base_url` joined with `path`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(CloudError::Config("cloud base_url cannot be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CloudError::Config(format!(
                "cloud base_url '{}' must start with http:// or https://",
                url
            )));
        }
        if self.username.is_empty() {
            return Err(CloudError::Config("cloud username cannot be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(CloudError::Config(
                "cloud timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: CloudConfig = json5::from_str(
            r#"{ base_url: "https://noc.example.net/", username: "gw", password: "pw" }"#,
        )
        .unwrap();

        assert_eq!(config.login_path, "/api/auth/login");
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_url_join() {
        let config = CloudConfig::new("http://127.0.0.1:8080/", "gw", "pw");
        assert_eq!(
            config.url("/api/v1/metrics/batch"),
            "http://127.0.0.1:8080/api/v1/metrics/batch"
        );
        assert_eq!(config.url("actuator/health"), "http://127.0.0.1:8080/actuator/health");
    }

    #[test]
    fn test_validate() {
        assert!(CloudConfig::new("", "gw", "pw").validate().is_err());
        assert!(CloudConfig::new("ftp://x", "gw", "pw").validate().is_err());
        assert!(CloudConfig::new("http://x", "", "pw").validate().is_err());
    }
}
