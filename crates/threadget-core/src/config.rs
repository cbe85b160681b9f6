use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::downloader::HttpOptions;
use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per file (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.5,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/threadget/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadgetConfig {
    /// Maximum number of media files fetched at once.
    pub concurrency: usize,
    /// Seconds allowed for establishing a connection.
    pub connect_timeout_secs: u64,
    /// Wall-clock limit for one whole request, in seconds.
    pub request_timeout_secs: u64,
    /// Abort a transfer when fewer than `low_speed_limit_bytes` per second
    /// arrive for this many seconds.
    pub idle_timeout_secs: u64,
    pub low_speed_limit_bytes: u32,
    /// How long a cancelled run waits for in-flight transfers before abandoning them.
    pub cancel_grace_secs: u64,
    pub user_agent: String,
    /// Base of the thread JSON API (`<base>/<board>/thread/<id>.json`).
    pub api_base_url: String,
    /// Base of media file URLs (`<base>/<board>/<tim><ext>`).
    pub media_base_url: String,
    /// Hash files that already exist and re-fetch those whose MD5 differs
    /// from the thread metadata. Off: size (or bare presence) decides.
    #[serde(default)]
    pub verify_md5: bool,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ThreadgetConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            connect_timeout_secs: 15,
            request_timeout_secs: 600,
            idle_timeout_secs: 30,
            low_speed_limit_bytes: 1,
            cancel_grace_secs: 5,
            user_agent: concat!("threadget/", env!("CARGO_PKG_VERSION")).to_string(),
            api_base_url: "https://a.4cdn.org".to_string(),
            media_base_url: "https://i.4cdn.org".to_string(),
            verify_md5: false,
            retry: None,
        }
    }
}

impl ThreadgetConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            low_speed_limit: self.low_speed_limit_bytes,
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("threadget")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ThreadgetConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ThreadgetConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: ThreadgetConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ThreadgetConfig::default();
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.idle_timeout_secs, 30);
        assert_eq!(cfg.cancel_grace_secs, 5);
        assert_eq!(cfg.api_base_url, "https://a.4cdn.org");
        assert!(cfg.user_agent.starts_with("threadget/"));
        assert!(!cfg.verify_md5);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ThreadgetConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ThreadgetConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.concurrency, cfg.concurrency);
        assert_eq!(parsed.request_timeout_secs, cfg.request_timeout_secs);
        assert_eq!(parsed.media_base_url, cfg.media_base_url);
    }

    #[test]
    fn missing_retry_section_uses_three_attempts() {
        let cfg = ThreadgetConfig::default();
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn config_toml_retry_section() {
        let toml = r#"
            concurrency = 4
            connect_timeout_secs = 5
            request_timeout_secs = 60
            idle_timeout_secs = 10
            low_speed_limit_bytes = 512
            cancel_grace_secs = 2
            user_agent = "test-agent"
            api_base_url = "http://127.0.0.1:8080"
            media_base_url = "http://127.0.0.1:8081"

            [retry]
            max_attempts = 5
            base_delay_secs = 0.25
            max_delay_secs = 15
        "#;
        let cfg: ThreadgetConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.concurrency, 4);
        assert!(!cfg.verify_md5, "older config files lack the key");
        let http = cfg.http_options();
        assert_eq!(http.idle_timeout, Duration::from_secs(10));
        assert_eq!(http.low_speed_limit, 512);
        assert_eq!(http.user_agent, "test-agent");
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(15));
    }

    #[test]
    fn verify_md5_round_trips_with_retry_section() {
        let cfg = ThreadgetConfig {
            verify_md5: true,
            retry: Some(RetryConfig::default()),
            ..ThreadgetConfig::default()
        };
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ThreadgetConfig = toml::from_str(&toml).unwrap();
        assert!(parsed.verify_md5);
        assert!(parsed.retry.is_some());
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        let retry = RetryConfig {
            max_attempts: 0,
            base_delay_secs: 0.1,
            max_delay_secs: 1,
        };
        assert_eq!(retry.to_policy().max_attempts, 1);
    }
}
