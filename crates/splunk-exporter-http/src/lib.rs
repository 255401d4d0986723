//! splunk-exporter-http: the production [`SplunkTransport`] implementation.
//!
//! [`HttpSplunkClient`] talks to the Splunk management port with token or
//! basic authentication and retries transient failures per [`policy`].
//!
//! [`SplunkTransport`]: splunk_exporter_core::SplunkTransport

pub mod client;
pub mod policy;

pub use client::{search_form, HttpClientConfig, HttpSplunkClient};
pub use policy::{RetryConfig, RetryPolicy};
