//! Health-tree-backed metrics.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::ExporterError;
use crate::health::{
    decode_entry_content, walk_deployment_health, walk_feature_health, DeploymentNode, FeatureHealth,
};
use crate::normalize::fq_name;
use crate::observation::{MetricDescriptor, PollOutcome};
use crate::transport::{SplunkTransport, DEPLOYMENT_HEALTH_ENDPOINT, SPLUNKD_HEALTH_ENDPOINT};

#[derive(Debug, Deserialize)]
struct DeploymentDetails {
    features: DeploymentNode,
}

/// Flattens both Splunk health trees into two shared descriptors, with the
/// node path carried as a label.
pub struct HealthManager {
    splunkd: Arc<MetricDescriptor>,
    deployment: Arc<MetricDescriptor>,
}

impl HealthManager {
    pub fn new(namespace: &str) -> Self {
        tracing::debug!("initiating health manager");
        Self {
            splunkd: Arc::new(MetricDescriptor::new(
                fq_name(namespace, "health", "splunkd"),
                "Splunk exported metric from splunkd health API",
                vec!["name".into()],
            )),
            deployment: Arc::new(MetricDescriptor::new(
                fq_name(namespace, "health", "deployment"),
                "Splunk exported metric from deployment health API",
                vec!["name".into(), "instance_id".into()],
            )),
        }
    }

    pub fn splunkd_descriptor(&self) -> &Arc<MetricDescriptor> {
        &self.splunkd
    }

    pub fn deployment_descriptor(&self) -> &Arc<MetricDescriptor> {
        &self.deployment
    }

    /// Fetch and flatten both trees concurrently.
    pub async fn collect(&self, transport: &dyn SplunkTransport) -> PollOutcome {
        let (mut splunkd, deployment) =
            futures::join!(self.collect_splunkd(transport), self.collect_deployment(transport));
        splunkd.extend(deployment);
        splunkd
    }

    pub async fn collect_splunkd(&self, transport: &dyn SplunkTransport) -> PollOutcome {
        tracing::info!("collecting splunkd health measures");
        let outcome = match read_content::<FeatureHealth>(transport, SPLUNKD_HEALTH_ENDPOINT).await {
            Ok(tree) => walk_feature_health(&tree, &self.splunkd),
            Err(e) => {
                tracing::error!(endpoint = SPLUNKD_HEALTH_ENDPOINT, error = %e, "failed to read health data");
                PollOutcome::failed()
            }
        };
        tracing::info!(emitted = outcome.report.emitted, "done collecting splunkd health measures");
        outcome
    }

    pub async fn collect_deployment(&self, transport: &dyn SplunkTransport) -> PollOutcome {
        tracing::info!("collecting deployment health measures");
        let outcome = match read_content::<DeploymentDetails>(transport, DEPLOYMENT_HEALTH_ENDPOINT).await {
            Ok(details) => walk_deployment_health(&details.features, &self.deployment),
            Err(e) => {
                tracing::error!(endpoint = DEPLOYMENT_HEALTH_ENDPOINT, error = %e, "failed to read health data");
                PollOutcome::failed()
            }
        };
        tracing::info!(emitted = outcome.report.emitted, "done collecting deployment health measures");
        outcome
    }
}

async fn read_content<T: serde::de::DeserializeOwned>(
    transport: &dyn SplunkTransport,
    endpoint: &str,
) -> Result<T, ExporterError> {
    let raw = transport.get(endpoint).await?;
    Ok(decode_entry_content(&raw)?)
}
