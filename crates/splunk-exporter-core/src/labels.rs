//! Dimension discovery and label ordering.
//!
//! Label order is fixed by sorting the raw Splunk dimension names. Nothing
//! else makes positional label values line up across polls and restarts.

use crate::error::ExporterError;
use crate::normalize::normalize;
use crate::query::dimension_discovery_query;
use crate::search::decode_results;
use crate::transport::SplunkTransport;

/// Field carrying the dimension name in dimension discovery results.
const DIMS_FIELD: &str = "dims";

/// Ordered label schema of one metric.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSchema {
    /// Splunk dimension names, sorted ascending.
    pub dimensions: Vec<String>,
    /// Prometheus label names, `labels[i] == normalize(dimensions[i])`.
    pub labels: Vec<String>,
}

impl LabelSchema {
    /// Sort, de-duplicate and normalize a raw dimension set.
    pub fn from_dimensions(mut dimensions: Vec<String>) -> Result<Self, ExporterError> {
        dimensions.sort();
        dimensions.dedup();

        let labels: Vec<String> = dimensions.iter().map(|d| normalize(d)).collect();

        let mut seen: Vec<(&str, &str)> = labels
            .iter()
            .map(String::as_str)
            .zip(dimensions.iter().map(String::as_str))
            .collect();
        seen.sort();
        if let Some(pair) = seen.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(ExporterError::LabelCollision {
                first: pair[0].1.to_string(),
                second: pair[1].1.to_string(),
                label: pair[0].0.to_string(),
            });
        }

        Ok(Self { dimensions, labels })
    }

    /// Iterate `(raw dimension, label name)` pairs in label order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dimensions
            .iter()
            .map(String::as_str)
            .zip(self.labels.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Discover the dimensions of `metric` in `index` and order them.
///
/// Anything short of a fully decoded answer is an error: a schema cached
/// from a partial answer would be wrong for the rest of the process.
pub async fn resolve_labels(
    transport: &dyn SplunkTransport,
    index: &str,
    metric: &str,
) -> Result<LabelSchema, ExporterError> {
    let discovery_failed = |reason: String| ExporterError::LabelDiscovery {
        index: index.to_string(),
        metric: metric.to_string(),
        reason,
    };

    let raw = transport
        .search(&dimension_discovery_query(index, metric))
        .await
        .map_err(|e| discovery_failed(e.to_string()))?;
    let batch = decode_results(&raw, &[DIMS_FIELD]).map_err(|e| discovery_failed(e.to_string()))?;
    if !batch.complete {
        return Err(discovery_failed(format!(
            "{} dimension rows could not be decoded",
            batch.skipped
        )));
    }

    let dimensions = batch
        .records
        .into_iter()
        .filter_map(|mut r| r.remove(DIMS_FIELD))
        .collect();
    let schema = LabelSchema::from_dimensions(dimensions)?;

    tracing::debug!(
        index,
        metric,
        labels = %schema.labels.join(", "),
        "resolved labels for metric"
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use serde_json::json;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sorted_then_normalized() {
        let schema = LabelSchema::from_dimensions(dims(&["log_level", "data.name", "component"])).unwrap();
        assert_eq!(schema.dimensions, dims(&["component", "data.name", "log_level"]));
        assert_eq!(schema.labels, dims(&["component", "data_name", "log_level"]));
    }

    #[test]
    fn order_independent_of_discovery_order() {
        let a = LabelSchema::from_dimensions(dims(&["b", "a.x", "c"])).unwrap();
        let b = LabelSchema::from_dimensions(dims(&["c", "b", "a.x"])).unwrap();
        assert_eq!(a.labels, b.labels);
    }

    #[test]
    fn duplicates_collapse() {
        let schema = LabelSchema::from_dimensions(dims(&["host", "host"])).unwrap();
        assert_eq!(schema.labels, dims(&["host"]));
    }

    #[test]
    fn colliding_normalized_names_rejected() {
        let err = LabelSchema::from_dimensions(dims(&["data.name", "data_name"])).unwrap_err();
        assert!(matches!(err, ExporterError::LabelCollision { ref label, .. } if label == "data_name"));
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let transport = FakeTransport::new().with_search(
            &["mvexpand dims"],
            json!({"results": [{"dims": "host"}, {"dims": "data.name"}]}),
        );
        let first = resolve_labels(&transport, "_metrics", "m").await.unwrap();
        let second = resolve_labels(&transport, "_metrics", "m").await.unwrap();
        assert_eq!(first.labels, dims(&["data_name", "host"]));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unreachable_discovery_is_an_error() {
        let transport = FakeTransport::new();
        let err = resolve_labels(&transport, "_metrics", "m").await.unwrap_err();
        assert!(matches!(err, ExporterError::LabelDiscovery { .. }));
    }

    #[tokio::test]
    async fn partially_decoded_discovery_is_an_error() {
        let transport = FakeTransport::new().with_search(
            &["mvexpand dims"],
            json!({"results": [{"dims": "host"}, {"other": "x"}]}),
        );
        let err = resolve_labels(&transport, "_metrics", "m").await.unwrap_err();
        assert!(matches!(err, ExporterError::LabelDiscovery { .. }));
    }
}
