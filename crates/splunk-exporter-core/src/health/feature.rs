//! Feature health tree (`server/health/splunkd/details`).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::health::{display_path, health_to_value};
use crate::observation::{MetricDescriptor, Observation, PollOutcome};

/// One node of the splunkd feature health tree.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureHealth {
    #[serde(default)]
    pub health: String,
    /// When set, the node's health is not meaningful.
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub features: BTreeMap<String, FeatureHealth>,
}

/// Flatten a feature health tree into observations against `descriptor`,
/// whose single label receives the node path.
///
/// Disabled nodes are not measured but their children are. An unknown
/// health state is measured as `0.0` and counted as an error.
pub fn walk_feature_health(root: &FeatureHealth, descriptor: &Arc<MetricDescriptor>) -> PollOutcome {
    let mut out = PollOutcome::default();
    visit(root, "", descriptor, &mut out);
    out
}

fn visit(node: &FeatureHealth, path: &str, descriptor: &Arc<MetricDescriptor>, out: &mut PollOutcome) {
    if !node.disabled {
        let value = health_to_value(&node.health).unwrap_or_else(|e| {
            tracing::error!(path = display_path(path), error = %e, "cannot measure feature health");
            out.report.record_error();
            0.0
        });
        match Observation::new(descriptor.clone(), value, vec![display_path(path).to_string()]) {
            Ok(obs) => out.push(obs),
            Err(e) => {
                tracing::error!(path = display_path(path), error = %e, "dropping feature health observation");
                out.report.record_error();
            }
        }
    }

    for (name, child) in &node.features {
        visit(child, &format!("{path}/{name}"), descriptor, out);
    }
}
