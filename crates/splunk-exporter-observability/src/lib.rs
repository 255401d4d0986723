//! # splunk-exporter-observability
//!
//! Turns a [`Scrape`] into Prometheus text exposition and sets up
//! structured logging for the exporter binary.
//!
//! ## Exported metrics
//! - one gauge family per configured Splunk metric, labelled by dimension
//! - `splunk_exporter_health_splunkd{name}`
//! - `splunk_exporter_health_deployment{name, instance_id}`
//! - `splunk_exporter_up`
//! - `splunk_exporter_config_last_reload_successful`
//! - `splunk_exporter_config_last_reload_success_timestamp_seconds`
//!
//! [`Scrape`]: splunk_exporter_core::Scrape

pub mod exposition;
pub mod tracing_setup;

pub use exposition::{render, ExpositionError, CONTENT_TYPE};
pub use tracing_setup::{init_tracing, LogConfig, LogFormat};
