//! In-memory `SplunkTransport` for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::transport::SplunkTransport;

/// Answers searches whose text contains every fragment of a registered
/// route, and REST reads of registered endpoints. Everything else is a transport error.
#[derive(Default)]
pub(crate) struct FakeTransport {
    searches: Vec<(Vec<String>, String)>,
    endpoints: Vec<(String, String)>,
    delay: Option<Duration>,
    pub(crate) search_calls: AtomicUsize,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_search(self, fragments: &[&str], body: Value) -> Self {
        self.with_raw_search(fragments, &body.to_string())
    }

    pub(crate) fn with_raw_search(mut self, fragments: &[&str], body: &str) -> Self {
        let fragments = fragments.iter().map(|f| f.to_string()).collect();
        self.searches.push((fragments, body.to_string()));
        self
    }

    pub(crate) fn with_endpoint(mut self, endpoint: &str, body: Value) -> Self {
        self.endpoints.push((endpoint.to_string(), body.to_string()));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SplunkTransport for FakeTransport {
    async fn search(&self, query: &str) -> Result<String, TransportError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.searches
            .iter()
            .find(|(fragments, _)| fragments.iter().all(|f| query.contains(f.as_str())))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| TransportError::Http("connection refused".into()))
    }

    async fn get(&self, endpoint: &str) -> Result<String, TransportError> {
        self.endpoints
            .iter()
            .find(|(e, _)| e == endpoint)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| TransportError::Status {
                status: 404,
                body: format!("no such endpoint {endpoint}"),
            })
    }

    fn url(&self) -> &str {
        "https://splunk.test:8089"
    }
}
