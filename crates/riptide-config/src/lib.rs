//! Loads the human-editable crawler settings file and environment overrides.
//!
//! A bad or missing settings file is never fatal: [`CrawlerSettings::load`]
//! logs a warning and falls back to [`CrawlerSettings::default`], matching
//! this codebase's usual "defaults used, crawl proceeds" posture for
//! configuration errors.

use std::collections::HashMap;
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Recognized settings for a crawl job. Unknown keys in the JSON file are
/// ignored rather than rejected, so operators can stage new keys ahead of
/// a version that understands them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerSettings {
    /// Floor for per-host request spacing, in seconds.
    pub min_crawl_delay: f64,
    /// Host -> integer bias subtracted from link priority.
    pub domain_importance: HashMap<String, i32>,
    /// Default crawl depth when a job does not specify one.
    pub max_depth: u32,
    /// Safety cap on URLs processed in a single run before forced termination.
    pub max_urls_per_run: u64,
    /// Whether to honor robots.txt.
    pub respect_robots: bool,
    /// Ignore the persistent visit log and recrawl everything.
    pub force_recrawl: bool,
    /// Path to the embedded SQLite database file.
    pub db_path: String,
    /// User-Agent sent with every fetch and robots.txt lookup.
    pub user_agent: String,
    /// Total request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            min_crawl_delay: 1.0,
            domain_importance: HashMap::new(),
            max_depth: 3,
            max_urls_per_run: 10_000,
            respect_robots: true,
            force_recrawl: false,
            db_path: "crawlspace.db".to_string(),
            user_agent: "CrawlspaceBot/1.0 (+https://example.invalid/bot)".to_string(),
            request_timeout_secs: 15,
            verify_tls: true,
        }
    }
}

impl CrawlerSettings {
    /// Load from disk, apply `CRAWLER_*` environment overrides, and
    /// validate. On any failure the default settings are returned instead
    /// of propagating the error to the caller — only a warning is logged.
    pub fn load(path: impl AsRef<Path>) -> Self {
        match Self::try_load(path.as_ref()) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(error = %err, "failed to load crawler settings, using defaults");
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            Self::default()
        };

        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Overlay `CRAWLER_<UPPER_SNAKE_CASE_FIELD>` environment variables,
    /// e.g. `CRAWLER_MIN_CRAWL_DELAY=2.5`.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("CRAWLER_MIN_CRAWL_DELAY") {
            if let Ok(v) = v.parse() {
                self.min_crawl_delay = v;
            }
        }
        if let Ok(v) = env::var("CRAWLER_MAX_DEPTH") {
            if let Ok(v) = v.parse() {
                self.max_depth = v;
            }
        }
        if let Ok(v) = env::var("CRAWLER_MAX_URLS_PER_RUN") {
            if let Ok(v) = v.parse() {
                self.max_urls_per_run = v;
            }
        }
        if let Ok(v) = env::var("CRAWLER_RESPECT_ROBOTS") {
            if let Ok(v) = v.parse() {
                self.respect_robots = v;
            }
        }
        if let Ok(v) = env::var("CRAWLER_FORCE_RECRAWL") {
            if let Ok(v) = v.parse() {
                self.force_recrawl = v;
            }
        }
        if let Ok(v) = env::var("CRAWLER_DB_PATH") {
            self.db_path = v;
        }
        if let Ok(v) = env::var("CRAWLER_USER_AGENT") {
            self.user_agent = v;
        }
        if let Ok(v) = env::var("CRAWLER_REQUEST_TIMEOUT_SECS") {
            if let Ok(v) = v.parse() {
                self.request_timeout_secs = v;
            }
        }
        if let Ok(v) = env::var("CRAWLER_VERIFY_TLS") {
            if let Ok(v) = v.parse() {
                self.verify_tls = v;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_crawl_delay < 0.0 {
            return Err(ConfigError::Invalid {
                field: "min_crawl_delay".to_string(),
                reason: "must be >= 0".to_string(),
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_depth".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = CrawlerSettings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = CrawlerSettings::load("/nonexistent/path/settings.json");
        assert_eq!(settings.min_crawl_delay, 1.0);
    }

    #[test]
    fn loads_and_overrides_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"min_crawl_delay": 2.5, "domain_importance": {"example.com": 5}}"#,
        )
        .expect("write settings");

        let settings = CrawlerSettings::load(&path);
        assert_eq!(settings.min_crawl_delay, 2.5);
        assert_eq!(settings.domain_importance.get("example.com"), Some(&5));
        // Unknown/omitted keys fall back to defaults.
        assert_eq!(settings.max_depth, 3);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"min_crawl_delay": 1.0, "totally_unknown": true}"#)
            .expect("write settings");

        let settings = CrawlerSettings::load(&path);
        assert_eq!(settings.min_crawl_delay, 1.0);
    }

    #[test]
    fn invalid_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"max_depth": 0}"#).expect("write settings");

        let settings = CrawlerSettings::load(&path);
        assert_eq!(settings.max_depth, 3, "invalid file should yield defaults");
    }
}
