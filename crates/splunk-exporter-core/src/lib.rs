//! splunk-exporter-core: everything between a Splunk answer and a
//! Prometheus sample.
//!
//! # Overview
//!
//! The core crate is transport-agnostic. It defines:
//!
//! - [`SplunkTransport`]: the async trait the HTTP client implements
//! - [`query`]: SPL text for metric values and dimension discovery
//! - [`search`]: tolerant decoding of search result envelopes
//! - [`health`]: flattening of the splunkd and deployment health trees
//! - [`DescriptorRegistry`]: process-wide, init-once metric descriptors
//! - [`Collector`]: one poll across configured metrics and health trees
//! - [`ConfigCell`]: the hot-reloadable exporter configuration

pub mod config;
pub mod descriptor;
pub mod error;
pub mod health;
pub mod labels;
pub mod manager;
pub mod normalize;
pub mod observation;
pub mod query;
pub mod search;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigCell, Credentials, MetricSpec, ReloadStatus};
pub use descriptor::{DescriptorRegistry, MetricEntry, MetricIdentity};
pub use error::{ConfigError, DecodeError, ExporterError, HealthError, TransportError};
pub use labels::LabelSchema;
pub use manager::{Collector, HealthManager, MetricsManager, Scrape, NAMESPACE};
pub use observation::{MetricDescriptor, Observation, PollOutcome, WalkReport};
pub use transport::{SplunkTransport, DEPLOYMENT_HEALTH_ENDPOINT, SPLUNKD_HEALTH_ENDPOINT};
