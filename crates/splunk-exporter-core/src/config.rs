//! Exporter configuration and its hot-reloadable cell.
//!
//! ```yaml
//! url: https://splunk.example.com:8089
//! token: "eyJraWQiOi..."
//! insecure: false
//! metrics:
//!   - index: _metrics
//!     name: spl.intr.disk_objects.Indexes.data.total_event_count
//! ```

use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize, Serializer};

use crate::descriptor::MetricIdentity;
use crate::error::ConfigError;

fn default_timeout_secs() -> u64 {
    30
}

fn redact<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(_) => s.serialize_str("<secret>"),
        None => s.serialize_none(),
    }
}

/// One metric to export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricSpec {
    pub index: String,
    pub name: String,
}

impl MetricSpec {
    pub fn new(index: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            name: name.into(),
        }
    }

    pub fn identity(&self) -> MetricIdentity {
        MetricIdentity::new(self.index.clone(), self.name.clone())
    }
}

/// How to authenticate against Splunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
}

/// Connection parameters and metric list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Splunk management URL, e.g. `https://localhost:8089`.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "redact")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "redact")]
    pub password: Option<String>,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

impl Config {
    /// Parse and validate a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(text)?;
        config.url = normalize_url(&config.url)?;
        config.credentials()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// The configured credentials; exactly one form must be present.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        match (&self.token, &self.username, &self.password) {
            (Some(token), None, None) => Ok(Credentials::Token(token.clone())),
            (None, Some(username), Some(password)) => Ok(Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            (Some(_), _, _) => Err(ConfigError::Invalid(
                "token cannot be combined with username/password".into(),
            )),
            _ => Err(ConfigError::Invalid(
                "either token or username and password are required".into(),
            )),
        }
    }

    /// Render for display, secrets redacted.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Default to `https://` and insist on an http(s) URL with a host.
fn normalize_url(raw: &str) -> Result<String, ConfigError> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let invalid = || ConfigError::Invalid(format!("invalid splunk URL: {with_scheme}"));
    let parsed = url::Url::parse(&with_scheme).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid());
    }
    Ok(with_scheme.trim_end_matches('/').to_string())
}

/// Outcome of the latest reload attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadStatus {
    pub successful: bool,
    /// Unix time of the last successful load.
    pub last_success_unix: Option<u64>,
}

/// Holds the live configuration. Readers take a snapshot `Arc`; a reload
/// swaps the whole value, so nobody ever sees a half-updated config.
pub struct ConfigCell {
    current: RwLock<Arc<Config>>,
    status: RwLock<ReloadStatus>,
}

impl ConfigCell {
    pub fn new(config: Config) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
            status: RwLock::new(ReloadStatus {
                successful: true,
                last_success_unix: Some(unix_now()),
            }),
        }
    }

    /// Initial load from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(Config::from_file(path)?))
    }

    pub fn snapshot(&self) -> Arc<Config> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Swap in a new configuration.
    pub fn replace(&self, config: Config) -> Arc<Config> {
        let config = Arc::new(config);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = config.clone();
        config
    }

    /// Re-read `path`. On failure the current configuration stays in place.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<Arc<Config>, ConfigError> {
        match Config::from_file(path) {
            Ok(config) => Ok(self.commit(config)),
            Err(e) => {
                self.mark_failed();
                Err(e)
            }
        }
    }

    /// Swap in `config` as the outcome of a successful reload.
    pub fn commit(&self, config: Config) -> Arc<Config> {
        let config = self.replace(config);
        self.record(true);
        config
    }

    /// Record a reload attempt that left the current configuration in place.
    pub fn mark_failed(&self) {
        self.record(false);
    }

    fn record(&self, successful: bool) {
        let mut status = self.status.write().unwrap_or_else(|e| e.into_inner());
        status.successful = successful;
        if successful {
            status.last_success_unix = Some(unix_now());
        }
    }

    pub fn reload_status(&self) -> ReloadStatus {
        *self.status.read().unwrap_or_else(|e| e.into_inner())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_CONFIG: &str = r#"
url: splunk.example.com:8089
token: abc
metrics:
  - index: _metrics
    name: spl.intr.queue.current_size
"#;

    #[test]
    fn token_config() {
        let c = Config::from_yaml(TOKEN_CONFIG).unwrap();
        assert_eq!(c.url, "https://splunk.example.com:8089");
        assert_eq!(c.credentials().unwrap(), Credentials::Token("abc".into()));
        assert_eq!(c.timeout_secs, 30);
        assert!(!c.insecure);
        assert_eq!(c.metrics, vec![MetricSpec::new("_metrics", "spl.intr.queue.current_size")]);
    }

    #[test]
    fn user_config() {
        let c = Config::from_yaml("url: http://localhost:8089/\nusername: admin\npassword: changeme\ninsecure: true\n")
            .unwrap();
        assert_eq!(c.url, "http://localhost:8089");
        assert!(c.insecure);
        assert!(matches!(c.credentials().unwrap(), Credentials::Basic { .. }));
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = Config::from_yaml("url: localhost\ntoken: a\ninstances: {}\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn credentials_required() {
        let err = Config::from_yaml("url: localhost\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = Config::from_yaml("url: localhost\ntoken: a\nusername: b\npassword: c\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_urls_rejected() {
        assert!(normalize_url("ftp://splunk").is_err());
        assert!(normalize_url("https://").is_err());
        assert_eq!(normalize_url("splunk:8089").unwrap(), "https://splunk:8089");
    }

    #[test]
    fn secrets_are_redacted() {
        let c = Config::from_yaml(TOKEN_CONFIG).unwrap();
        let yaml = c.to_yaml().unwrap();
        assert!(yaml.contains("<secret>"));
        assert!(!yaml.contains("abc"));
        assert!(!yaml.contains("password"));
    }

    #[test]
    fn snapshots_are_stable_across_replace() {
        let cell = ConfigCell::new(Config::from_yaml(TOKEN_CONFIG).unwrap());
        let before = cell.snapshot();
        let mut next = (*before).clone();
        next.metrics.clear();
        cell.replace(next);
        assert_eq!(before.metrics.len(), 1);
        assert!(cell.snapshot().metrics.is_empty());
    }

    #[test]
    fn failed_reload_keeps_current_value() {
        let cell = ConfigCell::new(Config::from_yaml(TOKEN_CONFIG).unwrap());
        let err = cell.reload("/nonexistent/splunk_exporter.yml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
        assert_eq!(cell.snapshot().metrics.len(), 1);
        let status = cell.reload_status();
        assert!(!status.successful);
        assert!(status.last_success_unix.is_some());
    }

    #[test]
    fn failed_attempt_then_commit() {
        let cell = ConfigCell::new(Config::from_yaml(TOKEN_CONFIG).unwrap());
        cell.mark_failed();
        assert!(!cell.reload_status().successful);
        assert_eq!(cell.snapshot().metrics.len(), 1);

        let next = Config::from_yaml("url: https://next.test:8089\ntoken: t\n").unwrap();
        let committed = cell.commit(next);
        assert!(Arc::ptr_eq(&committed, &cell.snapshot()));
        assert!(cell.reload_status().successful);
    }
}
