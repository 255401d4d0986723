//! Search-backed metrics: one Prometheus gauge per configured
//! `(index, metric)` pair, labelled by the metric's Splunk dimensions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;

use crate::config::MetricSpec;
use crate::descriptor::{DescriptorRegistry, MetricEntry, MetricIdentity};
use crate::error::{DecodeError, ExporterError};
use crate::labels::resolve_labels;
use crate::normalize::{fq_name, normalize};
use crate::observation::{MetricDescriptor, Observation, PollOutcome};
use crate::query::metric_value_query;
use crate::search::{decode_results, Record};
use crate::transport::SplunkTransport;

const METRIC_NAME_FIELD: &str = "metric_name";
const VALUE_FIELD: &str = "value";

/// Polls configured metrics and keeps their descriptors stable across polls.
///
/// Each exposed name belongs to the first identity that registered it; a
/// later identity mapping to the same name is refused.
pub struct MetricsManager {
    namespace: String,
    registry: DescriptorRegistry,
    owners: Mutex<HashMap<String, MetricIdentity>>,
}

impl MetricsManager {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            registry: DescriptorRegistry::new(),
            owners: Mutex::new(HashMap::new()),
        }
    }

    fn claim(&self, name: &str, identity: &MetricIdentity) -> Result<(), ExporterError> {
        let mut owners = self.owners.lock().unwrap_or_else(|e| e.into_inner());
        match owners.get(name) {
            Some(owner) if owner != identity => Err(ExporterError::NameCollision {
                name: name.to_string(),
                owner: owner.to_string(),
                requested: identity.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                owners.insert(name.to_string(), identity.clone());
                Ok(())
            }
        }
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    /// Descriptor of `spec`, discovering its labels on first use.
    pub async fn describe(
        &self,
        transport: &dyn SplunkTransport,
        spec: &MetricSpec,
    ) -> Result<Arc<MetricEntry>, ExporterError> {
        let identity = spec.identity();
        self.registry
            .get_or_create(&identity, || async {
                let schema = resolve_labels(transport, &spec.index, &spec.name).await?;
                let name = fq_name(&self.namespace, "", &normalize(&spec.name));
                self.claim(&name, &identity)?;
                let descriptor = MetricDescriptor::new(
                    name,
                    format!(
                        "Splunk exported metric \"{}\" from index {}",
                        spec.name, spec.index
                    ),
                    schema.labels.clone(),
                );
                Ok::<_, ExporterError>(MetricEntry {
                    descriptor: Arc::new(descriptor),
                    schema,
                })
            })
            .await
    }

    /// Poll every spec concurrently. One failing metric never stops the
    /// others; it only marks the outcome as failed.
    pub async fn collect(&self, transport: &dyn SplunkTransport, specs: &[MetricSpec]) -> PollOutcome {
        tracing::info!(metrics = specs.len(), "getting custom measures");

        let polls = join_all(specs.iter().map(|spec| self.collect_one(transport, spec))).await;
        let mut outcome = PollOutcome::default();
        for poll in polls {
            outcome.extend(poll);
        }

        tracing::info!(
            emitted = outcome.report.emitted,
            errors = outcome.report.errors,
            success = outcome.success(),
            "done getting custom measures"
        );
        outcome
    }

    /// Poll a single configured metric.
    pub async fn collect_one(&self, transport: &dyn SplunkTransport, spec: &MetricSpec) -> PollOutcome {
        let entry = match self.describe(transport, spec).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(identity = %spec.identity(), error = %e, "cannot describe metric");
                return PollOutcome::failed();
            }
        };

        tracing::debug!(index = %spec.index, metric = %spec.name, "getting metric values");
        let raw = match transport.search(&metric_value_query(&spec.index, &spec.name)).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(index = %spec.index, metric = %spec.name, error = %e, "failed getting metric values");
                return PollOutcome::failed();
            }
        };
        let batch = match decode_results(&raw, &[METRIC_NAME_FIELD, VALUE_FIELD]) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(index = %spec.index, metric = %spec.name, error = %e, "could not decode payload");
                return PollOutcome::failed();
            }
        };

        let mut outcome = PollOutcome::default();
        if !batch.complete {
            outcome.report.errors += batch.skipped.max(1);
        }
        for (index, record) in batch.records.iter().enumerate() {
            match measure(&entry, index, record) {
                Ok(obs) => outcome.push(obs),
                Err(e) => {
                    tracing::warn!(metric = %spec.name, error = %e, "dropping measure");
                    outcome.report.record_error();
                }
            }
        }
        outcome
    }
}

/// Turn one result row into an observation, reading label values in the
/// descriptor's order. A row lacking any dimension is dropped rather than
/// emitted with a shorter label list.
fn measure(entry: &MetricEntry, index: usize, record: &Record) -> Result<Observation, ExporterError> {
    let missing = |field: &str| DecodeError::MissingField {
        index,
        field: field.to_string(),
    };

    let text = record.get(VALUE_FIELD).ok_or_else(|| missing(VALUE_FIELD))?;
    let value: f64 = text.trim().parse().map_err(|_| DecodeError::InvalidValue {
        field: VALUE_FIELD.to_string(),
        value: text.clone(),
    })?;

    let label_values = entry
        .schema
        .dimensions
        .iter()
        .map(|dim| record.get(dim).cloned().ok_or_else(|| missing(dim.as_str())))
        .collect::<Result<Vec<_>, _>>()?;

    Observation::new(entry.descriptor.clone(), value, label_values)
}
