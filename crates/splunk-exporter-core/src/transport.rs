//! The `SplunkTransport` trait: the boundary between the translation
//! pipeline and whatever actually talks HTTP to Splunk.

use async_trait::async_trait;

use crate::error::TransportError;

/// REST endpoint holding the splunkd feature health tree.
pub const SPLUNKD_HEALTH_ENDPOINT: &str = "server/health/splunkd/details";

/// REST endpoint holding the deployment health tree.
pub const DEPLOYMENT_HEALTH_ENDPOINT: &str = "server/health/deployment/details";

/// Async access to a Splunk instance.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one transport is shared by every
/// concurrent fetch of a poll.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn SplunkTransport>`.
#[async_trait]
pub trait SplunkTransport: Send + Sync + 'static {
    /// Run a oneshot search and return the raw JSON result envelope.
    async fn search(&self, query: &str) -> Result<String, TransportError>;

    /// Read a REST endpoint (relative to `services/`) and return the raw
    /// JSON body.
    async fn get(&self, endpoint: &str) -> Result<String, TransportError>;

    /// Return the Splunk base URL this transport talks to.
    fn url(&self) -> &str;
}
