//! Splunk REST client backed by `reqwest`.
//!
//! Searches run as oneshot jobs (`services/search/v2/jobs`, form-encoded)
//! so a single round-trip returns the full result set. REST reads go to
//! `services/<endpoint>?output_mode=json`. Transient failures are retried
//! with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use splunk_exporter_core::config::{Config, Credentials};
use splunk_exporter_core::error::{ConfigError, TransportError};
use splunk_exporter_core::transport::SplunkTransport;

use crate::policy::{RetryConfig, RetryPolicy};

const SEARCH_ENDPOINT: &str = "search/v2/jobs";

/// Configuration for `HttpSplunkClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Splunk management URL, e.g. `https://localhost:8089`.
    pub url: String,
    pub credentials: Credentials,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl HttpClientConfig {
    pub fn new(url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            url: url.into(),
            credentials,
            insecure: false,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    /// Connection parameters of an exporter configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            insecure: config.insecure,
            request_timeout: Duration::from_secs(config.timeout_secs),
            ..Self::new(config.url.clone(), config.credentials()?)
        })
    }
}

/// Splunk transport over HTTPS.
pub struct HttpSplunkClient {
    url: String,
    services: Url,
    http: reqwest::Client,
    credentials: Credentials,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl HttpSplunkClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, TransportError> {
        let services = services_url(&config.url)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(url = %config.url, insecure = config.insecure, "created splunk client");
        Ok(Self {
            url: config.url,
            services,
            http,
            credentials: config.credentials,
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
        })
    }

    /// Build a client straight from an exporter configuration.
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let config = HttpClientConfig::from_config(config).map_err(|e| TransportError::Other(e.to_string()))?;
        Self::new(config)
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, TransportError> {
        self.services
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidUrl(format!("{endpoint}: {e}")))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Credentials::Token(token) => builder.bearer_auth(token),
            Credentials::Basic { username, password } => builder.basic_auth(username, Some(password)),
        }
    }

    fn map_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    async fn send_once(&self, request: reqwest::RequestBuilder) -> Result<String, TransportError> {
        let resp = self.authorize(request).send().await.map_err(|e| self.map_error(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        resp.text().await.map_err(|e| self.map_error(e))
    }

    /// Send the request produced by `build`, retrying transient failures.
    async fn execute<F>(&self, build: F) -> Result<String, TransportError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut delays = self.retry.delays();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(build()).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() => match delays.next() {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            url = %self.url,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(attempt, error = %e, url = %self.url, "max retries exceeded");
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}

/// Oneshot search form: results come back inline as JSON.
pub fn search_form(query: &str) -> [(&'static str, &str); 3] {
    [("exec_mode", "oneshot"), ("output_mode", "json"), ("search", query)]
}

/// `<base>/services/`, keeping any path prefix of `base`.
fn services_url(base: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(base).map_err(|e| TransportError::InvalidUrl(format!("{base}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(TransportError::InvalidUrl(base.to_string()));
    }
    let path = format!("{}/services/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

#[async_trait]
impl SplunkTransport for HttpSplunkClient {
    async fn search(&self, query: &str) -> Result<String, TransportError> {
        let url = self.endpoint_url(SEARCH_ENDPOINT)?;
        tracing::debug!(url = %url, query, "running oneshot search");
        let form = search_form(query);
        self.execute(|| self.http.post(url.clone()).form(&form)).await
    }

    async fn get(&self, endpoint: &str) -> Result<String, TransportError> {
        let url = self.endpoint_url(endpoint)?;
        tracing::debug!(url = %url, "reading REST endpoint");
        self.execute(|| self.http.get(url.clone()).query(&[("output_mode", "json")])).await
    }

    fn url(&self) -> &str {
        &self.url
    }
}
